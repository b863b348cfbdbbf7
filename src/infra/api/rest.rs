use super::http::HttpClient;
use crate::domain::post::{parse_posts_payload, Post};
use anyhow::{Context, Result};
use reqwest::Url;

// リクエストのタイムアウト（秒）
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// 投稿REST APIへのクライアント
///
/// ベースURLと相対パス・クエリパラメータからリクエストURLを組み立て、
/// レスポンスJSONを投稿リストへ変換する。HTTP通信自体は注入された
/// HttpClientに委譲する。
pub struct RestClient<H: HttpClient> {
    http: H,
    base_url: String,
}

impl<H: HttpClient> RestClient<H> {
    /// ベースURL（例: `https://public-api.example.com/rest/v1.2/read/`）を
    /// 指定してクライアントを作成
    pub fn new(http: H, base_url: &str) -> Self {
        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        Self { http, base_url }
    }

    /// 相対パスとクエリパラメータから完全なリクエストURLを組み立てる
    ///
    /// カーソル（RFC 3339文字列）の`:`や`+`はここでパーセントエンコードされる
    fn build_url(&self, path: &str, query: &[(String, String)]) -> Result<String> {
        let joined = format!("{}{}", self.base_url, path.trim_start_matches('/'));
        let mut url =
            Url::parse(&joined).context(format!("不正なリクエストURL: {}", joined))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url.to_string())
    }

    /// 投稿の1ページを取得する
    pub async fn get_posts(&self, path: &str, query: &[(String, String)]) -> Result<Vec<Post>> {
        let url = self.build_url(path, query)?;
        let body = self
            .http
            .get_text(&url, REQUEST_TIMEOUT_SECS)
            .await
            .context(format!("投稿ページの取得に失敗: {}", url))?;

        parse_posts_payload(&body).context(format!("投稿ページの解析に失敗: {}", url))
    }
}
