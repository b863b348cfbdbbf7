use super::tag::Tag;
use std::fmt;

/// 同期リクエストの種別
///
/// すべての分岐はexhaustive matchで処理する。新しいアクションを追加した場合、
/// コンパイルエラーとして各分岐の対応漏れが検出される。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateAction {
    /// キャッシュより新しい投稿を取得
    RequestNewer,
    /// キャッシュ最古の投稿より古い投稿を取得
    RequestOlder,
    /// キャッシュを破棄して最新ページで置き換え
    RequestRefresh,
    /// ギャップマーカーより古い投稿を取得してギャップを埋める
    RequestOlderThanGap,
}

/// 1回の同期の最終結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    /// キャッシュにない新規投稿があった
    HasNew,
    /// 既存投稿に変更があった（新規はなし）
    Changed,
    /// キャッシュと完全に一致
    Unchanged,
    /// 使用可能なバッチが得られなかった
    Failed,
}

impl UpdateResult {
    /// 新規または変更があったか
    pub fn is_new_or_changed(&self) -> bool {
        matches!(self, UpdateResult::HasNew | UpdateResult::Changed)
    }
}

impl fmt::Display for UpdateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UpdateResult::HasNew => "HAS_NEW",
            UpdateResult::Changed => "CHANGED",
            UpdateResult::Unchanged => "UNCHANGED",
            UpdateResult::Failed => "FAILED",
        };
        write!(f, "{}", label)
    }
}

/// 同期対象のソース。タグ・ブログ・フィードのいずれか一つ
#[derive(Debug, Clone, PartialEq)]
pub enum SourceKey {
    Tag(Tag),
    Blog(i64),
    Feed(i64),
}

impl SourceKey {
    /// タグソースの場合のみタグを返す
    pub fn tag(&self) -> Option<&Tag> {
        match self {
            SourceKey::Tag(tag) => Some(tag),
            SourceKey::Blog(_) | SourceKey::Feed(_) => None,
        }
    }

    /// ソースごとの直列化キー。同一キーの照合処理は同時に走らない
    pub fn lock_key(&self) -> String {
        match self {
            SourceKey::Tag(tag) => format!("tag:{}", tag.slug),
            SourceKey::Blog(blog_id) => format!("blog:{}", blog_id),
            SourceKey::Feed(feed_id) => format!("feed:{}", feed_id),
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKey::Tag(tag) => write!(f, "タグ {}", tag.slug),
            SourceKey::Blog(blog_id) => write!(f, "ブログ {}", blog_id),
            SourceKey::Feed(feed_id) => write!(f, "フィード {}", feed_id),
        }
    }
}

/// 同期リクエスト
///
/// タグ・ブログ・フィードのうち最初に指定されているものが採用される
/// （優先順位: タグ > ブログ > フィード）。いずれも未指定の場合、
/// 同期は何も行わない。
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    pub tag: Option<Tag>,
    pub blog_id: Option<i64>,
    pub feed_id: Option<i64>,
}

impl UpdateRequest {
    pub fn from_tag(tag: Tag) -> Self {
        Self {
            tag: Some(tag),
            ..Default::default()
        }
    }

    pub fn from_blog(blog_id: i64) -> Self {
        Self {
            blog_id: Some(blog_id),
            ..Default::default()
        }
    }

    pub fn from_feed(feed_id: i64) -> Self {
        Self {
            feed_id: Some(feed_id),
            ..Default::default()
        }
    }

    /// 優先順位に従ってソースを一つに確定する
    pub fn source_key(&self) -> Option<SourceKey> {
        if let Some(ref tag) = self.tag {
            Some(SourceKey::Tag(tag.clone()))
        } else if let Some(blog_id) = self.blog_id {
            Some(SourceKey::Blog(blog_id))
        } else {
            self.feed_id.map(SourceKey::Feed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_new_or_changed() {
        assert!(UpdateResult::HasNew.is_new_or_changed());
        assert!(UpdateResult::Changed.is_new_or_changed());
        assert!(!UpdateResult::Unchanged.is_new_or_changed());
        assert!(!UpdateResult::Failed.is_new_or_changed());
    }

    #[test]
    fn test_source_key_priority() {
        // タグ > ブログ > フィードの優先順位
        let request = UpdateRequest {
            tag: Some(Tag::custom("rust")),
            blog_id: Some(10),
            feed_id: Some(20),
        };
        assert!(
            matches!(request.source_key(), Some(SourceKey::Tag(_))),
            "タグが最優先されるはず"
        );

        let request = UpdateRequest {
            tag: None,
            blog_id: Some(10),
            feed_id: Some(20),
        };
        assert_eq!(request.source_key(), Some(SourceKey::Blog(10)));

        let request = UpdateRequest::from_feed(20);
        assert_eq!(request.source_key(), Some(SourceKey::Feed(20)));
    }

    #[test]
    fn test_source_key_empty_request() {
        // いずれも未指定の場合はソースが確定しない
        let request = UpdateRequest::default();
        assert_eq!(request.source_key(), None);
    }

    #[test]
    fn test_lock_key_distinct_per_source() {
        let tag_key = SourceKey::Tag(Tag::custom("rust")).lock_key();
        let blog_key = SourceKey::Blog(1).lock_key();
        let feed_key = SourceKey::Feed(1).lock_key();
        assert_ne!(blog_key, feed_key, "同じIDでもソース種別が違えば別キー");
        assert_eq!(tag_key, "tag:rust");
    }
}
