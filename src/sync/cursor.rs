use crate::domain::store::PostStore;
use crate::domain::update::{SourceKey, UpdateAction};
use crate::types::SyncResult;
use chrono::SecondsFormat;

/// 1回のリクエストで取得する投稿数の上限
pub const MAX_POSTS_TO_REQUEST: usize = 20;

/// ブログ投稿取得の相対パス
pub fn blog_posts_path(blog_id: i64) -> String {
    format!("sites/{}/posts/", blog_id)
}

/// フィード投稿取得の相対パス
pub fn feed_posts_path(feed_id: i64) -> String {
    format!("feed/{}/posts/", feed_id)
}

/// リクエストのクエリパラメータを組み立てる
///
/// 取得件数の上限と降順指定は常に明示する（サーバーのデフォルトに
/// 依存しない）。`before`カーソルはアクションとソース種別で決まる:
/// - タグ + RequestOlder: タグのキャッシュ最古の公開日時
/// - タグ + RequestOlderThanGap: ギャップマーカーが指す投稿の公開日時
/// - ブログ/フィード + RequestOlder: そのソースのキャッシュ最古の公開日時
/// - それ以外: カーソルなし（最新ページを取得）
pub async fn build_query<P: PostStore>(
    key: &SourceKey,
    action: UpdateAction,
    posts: &P,
) -> SyncResult<Vec<(String, String)>> {
    let before = match key {
        SourceKey::Tag(tag) => match action {
            UpdateAction::RequestOlder => posts.oldest_pub_date(key).await?,
            UpdateAction::RequestOlderThanGap => posts.gap_marker_pub_date(tag).await?,
            UpdateAction::RequestNewer | UpdateAction::RequestRefresh => None,
        },
        SourceKey::Blog(_) | SourceKey::Feed(_) => match action {
            UpdateAction::RequestOlder => posts.oldest_pub_date(key).await?,
            UpdateAction::RequestNewer
            | UpdateAction::RequestRefresh
            | UpdateAction::RequestOlderThanGap => None,
        },
    };

    let mut query = vec![
        ("number".to_string(), MAX_POSTS_TO_REQUEST.to_string()),
        ("order".to_string(), "DESC".to_string()),
    ];
    if let Some(before) = before {
        query.push((
            "before".to_string(),
            before.to_rfc3339_opts(SecondsFormat::Secs, false),
        ));
    }
    // サイト情報といいね数のメタデータを毎回要求する
    query.push(("meta".to_string(), "site,likes".to_string()));

    Ok(query)
}
