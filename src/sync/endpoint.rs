use crate::domain::store::TagStore;
use crate::domain::tag::{sanitize_with_dashes, Tag, TagKind};
use crate::types::{SyncError, SyncResult};

// 絶対URL内で相対パスの起点を示すマーカー
const PATH_MARKER: &str = "/read/";

/// タグの投稿取得に使う相対エンドポイントを解決する
///
/// 解決順序:
/// 1. タグ自身が持つエンドポイント
/// 2. タグストアに保存されたエンドポイント
/// 3. カスタムタグであればスラッグからパスを合成
///
/// システムタグ（Default）は保存済みエンドポイント経由でのみ更新できるため、
/// パスの合成は行わずエラーを返す。
pub async fn resolve_relative_endpoint<T: TagStore>(tag: &Tag, tags: &T) -> SyncResult<String> {
    // タグ自身のエンドポイントがあればそれを使う
    if let Some(endpoint) = tag.endpoint.as_deref() {
        if !endpoint.is_empty() {
            return Ok(relative_endpoint(endpoint));
        }
    }

    // ストアに保存されたエンドポイントを確認
    if let Some(endpoint) = tags.endpoint(tag).await? {
        if !endpoint.is_empty() {
            return Ok(relative_endpoint(&endpoint));
        }
    }

    if tag.kind == TagKind::Default {
        return Err(SyncError::endpoint(&tag.slug));
    }

    let slug = sanitize_with_dashes(&tag.slug);
    if slug.is_empty() {
        return Err(SyncError::endpoint(&tag.slug));
    }
    Ok(format!("tags/{}/posts", slug))
}

/// エンドポイントを相対パスへ正規化する
///
/// 保存済みエンドポイントは完全URLで返されることがあるが、バージョン付き
/// プレフィックスはAPIのバージョン変更で変わりうるため、既知のマーカー
/// 以降のパスだけを使う。
///
/// 例: `https://public-api.example.com/rest/v1.2/read/tags/fitness/posts`
/// は `tags/fitness/posts` になる。
fn relative_endpoint(endpoint: &str) -> String {
    if endpoint.starts_with("http") {
        if let Some(pos) = endpoint.find(PATH_MARKER) {
            return endpoint[pos + PATH_MARKER.len()..].to_string();
        }
        // `/v1/` `/v1.2/` などのバージョンセグメント直後から取る
        if let Some(pos) = endpoint.find("/v1") {
            if let Some(slash) = endpoint[pos + 1..].find('/') {
                let after = &endpoint[pos + 1 + slash + 1..];
                return after.strip_prefix("read/").unwrap_or(after).to_string();
            }
        }
    }
    let trimmed = endpoint.trim_start_matches('/');
    trimmed.strip_prefix("read/").unwrap_or(trimmed).to_string()
}
