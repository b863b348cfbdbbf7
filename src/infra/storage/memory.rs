use crate::domain::post::{BlogIdPostId, Post};
use crate::domain::store::{PostStore, TagStore};
use crate::domain::tag::Tag;
use crate::domain::update::{SourceKey, UpdateResult};
use crate::types::SyncResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

// キャッシュ上の投稿。タグ経由の投稿はtag_slugを持ち、
// ブログ・フィード経由の投稿はNoneで保存する
#[derive(Debug, Clone)]
struct CachedPost {
    post: Post,
    tag_slug: Option<String>,
}

#[derive(Debug, Default)]
struct TagState {
    endpoint: Option<String>,
    last_updated: Option<DateTime<Utc>>,
    gap_marker: Option<BlogIdPostId>,
}

#[derive(Default)]
struct Inner {
    posts: Vec<CachedPost>,
    tags: HashMap<String, TagState>,
}

/// インメモリのストア実装
///
/// PostStoreとTagStoreの両方を実装する。テスト時にDIされ、
/// データベースなしで照合アルゴリズムを検証できるようにする。
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 投稿をキャッシュに直接投入する（テストの事前状態の構築用）
    pub fn seed_post(&self, tag: Option<&Tag>, post: Post) {
        let mut inner = self.inner.lock().unwrap();
        inner.posts.push(CachedPost {
            post,
            tag_slug: tag.map(|t| t.slug.clone()),
        });
    }

    /// 保存済みエンドポイントを設定する
    pub fn set_endpoint(&self, slug: &str, endpoint: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.tags.entry(slug.to_string()).or_default().endpoint = Some(endpoint.to_string());
    }

    /// タグに紐づくキャッシュ投稿を公開日時の降順で返す
    pub fn posts_for_tag(&self, slug: &str) -> Vec<Post> {
        let inner = self.inner.lock().unwrap();
        let mut posts: Vec<Post> = inner
            .posts
            .iter()
            .filter(|c| c.tag_slug.as_deref() == Some(slug))
            .map(|c| c.post.clone())
            .collect();
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
        posts
    }

    /// タグの現在のギャップマーカーを返す（テストの検証用）
    pub fn gap_marker_of(&self, slug: &str) -> Option<BlogIdPostId> {
        let inner = self.inner.lock().unwrap();
        inner.tags.get(slug).and_then(|t| t.gap_marker)
    }

    /// タグの最終同期時刻を返す（テストの検証用）
    pub fn last_updated_of(&self, slug: &str) -> Option<DateTime<Utc>> {
        let inner = self.inner.lock().unwrap();
        inner.tags.get(slug).and_then(|t| t.last_updated)
    }

    /// キャッシュ投稿の総数を返す
    pub fn total_posts(&self) -> usize {
        self.inner.lock().unwrap().posts.len()
    }
}

// 既知の投稿が「変更された」とみなされる条件
fn differs(cached: &Post, incoming: &Post) -> bool {
    cached.title != incoming.title
        || cached.url != incoming.url
        || cached.pub_date != incoming.pub_date
        || cached.num_likes != incoming.num_likes
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn compare(&self, batch: &[Post]) -> SyncResult<UpdateResult> {
        let inner = self.inner.lock().unwrap();
        let mut has_new = false;
        let mut has_changed = false;

        for post in batch {
            let cached = inner.posts.iter().find(|c| c.post.ids() == post.ids());
            match cached {
                None => has_new = true,
                Some(c) if differs(&c.post, post) => has_changed = true,
                Some(_) => {}
            }
        }

        Ok(if has_new {
            UpdateResult::HasNew
        } else if has_changed {
            UpdateResult::Changed
        } else {
            UpdateResult::Unchanged
        })
    }

    async fn oldest_pub_date(&self, key: &SourceKey) -> SyncResult<Option<DateTime<Utc>>> {
        let inner = self.inner.lock().unwrap();
        let oldest = inner
            .posts
            .iter()
            .filter(|c| match key {
                SourceKey::Tag(tag) => c.tag_slug.as_deref() == Some(tag.slug.as_str()),
                SourceKey::Blog(blog_id) => {
                    c.tag_slug.is_none() && c.post.blog_id == *blog_id
                }
                SourceKey::Feed(feed_id) => {
                    c.tag_slug.is_none() && c.post.feed_id == Some(*feed_id)
                }
            })
            .map(|c| c.post.pub_date)
            .min();
        Ok(oldest)
    }

    async fn gap_marker_pub_date(&self, tag: &Tag) -> SyncResult<Option<DateTime<Utc>>> {
        let inner = self.inner.lock().unwrap();
        let marker = inner.tags.get(&tag.slug).and_then(|t| t.gap_marker);
        let pub_date = marker.and_then(|ids| {
            inner
                .posts
                .iter()
                .find(|c| {
                    c.tag_slug.as_deref() == Some(tag.slug.as_str()) && c.post.ids() == ids
                })
                .map(|c| c.post.pub_date)
        });
        Ok(pub_date)
    }

    async fn count_for_tag(&self, tag: &Tag) -> SyncResult<i64> {
        let inner = self.inner.lock().unwrap();
        let count = inner
            .posts
            .iter()
            .filter(|c| c.tag_slug.as_deref() == Some(tag.slug.as_str()))
            .count();
        Ok(count as i64)
    }

    async fn has_overlap(&self, batch: &[Post], tag: &Tag) -> SyncResult<bool> {
        let inner = self.inner.lock().unwrap();
        let overlap = batch.iter().any(|post| {
            inner.posts.iter().any(|c| {
                c.tag_slug.as_deref() == Some(tag.slug.as_str()) && c.post.ids() == post.ids()
            })
        });
        Ok(overlap)
    }

    async fn upsert(&self, tag: Option<&Tag>, batch: &[Post]) -> SyncResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let scope = tag.map(|t| t.slug.clone());

        for post in batch {
            let existing = inner
                .posts
                .iter()
                .position(|c| c.tag_slug == scope && c.post.ids() == post.ids());
            match existing {
                Some(i) => inner.posts[i].post = post.clone(),
                None => inner.posts.push(CachedPost {
                    post: post.clone(),
                    tag_slug: scope.clone(),
                }),
            }
        }
        Ok(())
    }

    async fn delete_all_for_tag(&self, tag: &Tag) -> SyncResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .posts
            .retain(|c| c.tag_slug.as_deref() != Some(tag.slug.as_str()));
        Ok(())
    }

    async fn delete_older_than_marker(&self, tag: &Tag) -> SyncResult<()> {
        let marker_date = self.gap_marker_pub_date(tag).await?;
        if let Some(marker_date) = marker_date {
            let mut inner = self.inner.lock().unwrap();
            inner.posts.retain(|c| {
                c.tag_slug.as_deref() != Some(tag.slug.as_str())
                    || c.post.pub_date >= marker_date
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn gap_marker(&self, tag: &Tag) -> SyncResult<Option<BlogIdPostId>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.tags.get(&tag.slug).and_then(|t| t.gap_marker))
    }

    async fn set_gap_marker(&self, ids: BlogIdPostId, tag: &Tag) -> SyncResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.tags.entry(tag.slug.clone()).or_default().gap_marker = Some(ids);
        Ok(())
    }

    async fn clear_gap_marker(&self, tag: &Tag) -> SyncResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(state) = inner.tags.get_mut(&tag.slug) {
            state.gap_marker = None;
        }
        Ok(())
    }

    async fn endpoint(&self, tag: &Tag) -> SyncResult<Option<String>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.tags.get(&tag.slug).and_then(|t| t.endpoint.clone()))
    }

    async fn set_last_updated(&self, tag: &Tag) -> SyncResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.tags.entry(tag.slug.clone()).or_default().last_updated = Some(Utc::now());
        Ok(())
    }
}
