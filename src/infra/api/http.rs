use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// HTTPクライアントの抽象化トレイト
///
/// このトレイトは、実際のHTTP通信とモック実装の両方を
/// 統一的に扱えるようにするためのインターフェースです。
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// 指定されたURLからテキストを取得する
    ///
    /// # Arguments
    /// * `url` - 取得対象のURL
    /// * `timeout_secs` - タイムアウト時間（秒）
    async fn get_text(&self, url: &str, timeout_secs: u64) -> Result<String>;
}

// 共有参照越しでも使えるようにする（テストでのDIに便利）
#[async_trait]
impl<H: HttpClient + ?Sized> HttpClient for std::sync::Arc<H> {
    async fn get_text(&self, url: &str, timeout_secs: u64) -> Result<String> {
        (**self).get_text(url, timeout_secs).await
    }
}

/// `reqwest` を使用した本番用のHTTPクライアント実装
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// 新しいHTTPクライアントを作成
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get_text(&self, url: &str, timeout_secs: u64) -> Result<String> {
        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(timeout_secs))
            .send()
            .await
            .context(format!("HTTPリクエストの送信に失敗: {}", url))?;

        // エラーステータスはボディがJSONでも成功として扱わない
        let response = response
            .error_for_status()
            .context(format!("HTTPエラーステータス: {}", url))?;

        response
            .text()
            .await
            .context("レスポンステキストの取得に失敗")
    }
}

/// テスト用のモックHTTPクライアント
///
/// この実装はテスト時にDIされ、実際のHTTPリクエストを行わずに
/// 定義済みのレスポンスやエラーを返します。リクエストされたURLを
/// 記録するため、カーソルやクエリパラメータの検証にも使えます。
pub struct MockHttpClient {
    /// モック時に返すレスポンス内容
    pub mock_response: String,
    /// モック時に返すステータス（成功/失敗の制御）
    pub should_succeed: bool,
    /// エラー時に返すメッセージ
    pub error_message: Option<String>,
    /// 呼び出し回数
    call_count: AtomicUsize,
    /// リクエストされたURLの記録
    requested_urls: Mutex<Vec<String>>,
}

impl MockHttpClient {
    /// 成功レスポンスを返すモッククライアントを作成
    pub fn new_success(mock_response: &str) -> Self {
        Self {
            mock_response: mock_response.to_string(),
            should_succeed: true,
            error_message: None,
            call_count: AtomicUsize::new(0),
            requested_urls: Mutex::new(Vec::new()),
        }
    }

    /// エラーレスポンスを返すモッククライアントを作成
    pub fn new_error(error_message: &str) -> Self {
        Self {
            mock_response: String::new(),
            should_succeed: false,
            error_message: Some(error_message.to_string()),
            call_count: AtomicUsize::new(0),
            requested_urls: Mutex::new(Vec::new()),
        }
    }

    /// これまでの呼び出し回数を返す
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// 記録されたリクエストURLのコピーを返す
    pub fn requested_urls(&self) -> Vec<String> {
        self.requested_urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get_text(&self, url: &str, _timeout_secs: u64) -> Result<String> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requested_urls.lock().unwrap().push(url.to_string());

        if self.should_succeed {
            Ok(self.mock_response.clone())
        } else {
            let error_msg = self
                .error_message
                .as_deref()
                .unwrap_or("Mock HTTP error");
            Err(anyhow::anyhow!("モックHTTPエラー: {}", error_msg))
        }
    }
}
