use reader_sync::domain::{search_tags, UpdateAction, UpdateRequest};
use reader_sync::infra::api::http::ReqwestHttpClient;
use reader_sync::infra::api::rest::RestClient;
use reader_sync::infra::db::setup_database;
use reader_sync::infra::storage::db::PgStore;
use reader_sync::sync::{ConsoleNotifier, SyncEngine};
use std::env;
use std::sync::Arc;

const DEFAULT_BASE_URL: &str = "https://public-api.example.com/rest/v1.2/read/";

#[tokio::main]
async fn main() {
    // 環境変数を読み込み（.envファイルがあれば使用）
    let _ = dotenvy::dotenv();

    println!("=== 投稿同期を開始 ===");

    let pool = match setup_database().await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("データベースのセットアップに失敗しました: {}", e);
            return;
        }
    };

    let base_url = env::var("READER_API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let store = Arc::new(PgStore::new(pool));
    let rest = RestClient::new(ReqwestHttpClient::new(), &base_url);
    let engine = SyncEngine::new(rest, Arc::clone(&store), store, ConsoleNotifier);

    // 購読タグを読み込んで最新ページを同期する
    let tags = match search_tags(None) {
        Ok(tags) => tags,
        Err(e) => {
            eprintln!("タグ設定の読み込みに失敗しました: {}", e);
            return;
        }
    };
    println!("タグ設定読み込み完了: {}件", tags.len());

    for tag in tags {
        let slug = tag.slug.clone();
        let request = UpdateRequest::from_tag(tag);
        let result = engine
            .perform_task(slug, UpdateAction::RequestNewer, &request, |slug| {
                println!("タグ {} の同期が完了", slug);
            })
            .await;

        if let Some(result) = result {
            println!("結果: {}", result);
        }
    }

    println!("=== 投稿同期を完了 ===");
}
