use crate::domain::post::{BlogIdPostId, Post};
use crate::domain::store::{PostStore, TagStore};
use crate::domain::tag::Tag;
use crate::domain::update::{SourceKey, UpdateResult};
use crate::types::{SyncError, SyncResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

// ブログ・フィード経由の投稿はタグスコープなしとしてこの値で保存する
const NO_TAG_SCOPE: &str = "";

/// Postgresのストア実装
///
/// PostStoreとTagStoreの両方を実装する。クエリは実行時チェックの
/// `sqlx::query`を使用し、スキーマはmigrations/で管理する。
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn tag_scope(tag: Option<&Tag>) -> &str {
    tag.map(|t| t.slug.as_str()).unwrap_or(NO_TAG_SCOPE)
}

#[async_trait]
impl PostStore for PgStore {
    async fn compare(&self, batch: &[Post]) -> SyncResult<UpdateResult> {
        let mut has_new = false;
        let mut has_changed = false;

        for post in batch {
            let row = sqlx::query(
                "SELECT title, url, pub_date, num_likes FROM posts \
                 WHERE blog_id = $1 AND post_id = $2 LIMIT 1",
            )
            .bind(post.blog_id)
            .bind(post.post_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SyncError::database("投稿の比較クエリ", e))?;

            match row {
                None => has_new = true,
                Some(row) => {
                    let title: String = row.get("title");
                    let url: String = row.get("url");
                    let pub_date: DateTime<Utc> = row.get("pub_date");
                    let num_likes: i64 = row.get("num_likes");
                    if title != post.title
                        || url != post.url
                        || pub_date != post.pub_date
                        || num_likes != post.num_likes
                    {
                        has_changed = true;
                    }
                }
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
        let oldest: Option<DateTime<Utc>> = match key {
            SourceKey::Tag(tag) => {
                sqlx::query_scalar("SELECT MIN(pub_date) FROM posts WHERE tag_slug = $1")
                    .bind(&tag.slug)
                    .fetch_one(&self.pool)
                    .await
            }
            SourceKey::Blog(blog_id) => sqlx::query_scalar(
                "SELECT MIN(pub_date) FROM posts WHERE tag_slug = $1 AND blog_id = $2",
            )
            .bind(NO_TAG_SCOPE)
            .bind(blog_id)
            .fetch_one(&self.pool)
            .await,
            SourceKey::Feed(feed_id) => sqlx::query_scalar(
                "SELECT MIN(pub_date) FROM posts WHERE tag_slug = $1 AND feed_id = $2",
            )
            .bind(NO_TAG_SCOPE)
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await,
        }
        .map_err(|e| SyncError::database("最古公開日時の取得", e))?;

        Ok(oldest)
    }

    async fn gap_marker_pub_date(&self, tag: &Tag) -> SyncResult<Option<DateTime<Utc>>> {
        let pub_date: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT p.pub_date FROM tags t \
             JOIN posts p ON p.blog_id = t.gap_blog_id \
                         AND p.post_id = t.gap_post_id \
                         AND p.tag_slug = t.slug \
             WHERE t.slug = $1",
        )
        .bind(&tag.slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SyncError::database("ギャップマーカー日時の取得", e))?;

        Ok(pub_date)
    }

    async fn count_for_tag(&self, tag: &Tag) -> SyncResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE tag_slug = $1")
            .bind(&tag.slug)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SyncError::database("タグ投稿数の取得", e))?;

        Ok(count)
    }

    async fn has_overlap(&self, batch: &[Post], tag: &Tag) -> SyncResult<bool> {
        if batch.is_empty() {
            return Ok(false);
        }

        let blog_ids: Vec<i64> = batch.iter().map(|p| p.blog_id).collect();
        let post_ids: Vec<i64> = batch.iter().map(|p| p.post_id).collect();

        let overlap: bool = sqlx::query_scalar(
            "SELECT EXISTS( \
                 SELECT 1 FROM posts p \
                 JOIN unnest($2::bigint[], $3::bigint[]) AS b(blog_id, post_id) \
                   ON p.blog_id = b.blog_id AND p.post_id = b.post_id \
                 WHERE p.tag_slug = $1)",
        )
        .bind(&tag.slug)
        .bind(&blog_ids)
        .bind(&post_ids)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SyncError::database("オーバーラップ判定", e))?;

        Ok(overlap)
    }

    async fn upsert(&self, tag: Option<&Tag>, batch: &[Post]) -> SyncResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SyncError::database("トランザクションの開始", e))?;

        let scope = tag_scope(tag);
        for post in batch {
            sqlx::query(
                "INSERT INTO posts (blog_id, post_id, feed_id, tag_slug, title, url, pub_date, num_likes) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 ON CONFLICT (blog_id, post_id, tag_slug) DO UPDATE SET \
                     feed_id = EXCLUDED.feed_id, \
                     title = EXCLUDED.title, \
                     url = EXCLUDED.url, \
                     pub_date = EXCLUDED.pub_date, \
                     num_likes = EXCLUDED.num_likes",
            )
            .bind(post.blog_id)
            .bind(post.post_id)
            .bind(post.feed_id)
            .bind(scope)
            .bind(&post.title)
            .bind(&post.url)
            .bind(post.pub_date)
            .bind(post.num_likes)
            .execute(&mut *tx)
            .await
            .map_err(|e| SyncError::database("投稿のupsert", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| SyncError::database("トランザクションのコミット", e))?;

        Ok(())
    }

    async fn delete_all_for_tag(&self, tag: &Tag) -> SyncResult<()> {
        sqlx::query("DELETE FROM posts WHERE tag_slug = $1")
            .bind(&tag.slug)
            .execute(&self.pool)
            .await
            .map_err(|e| SyncError::database("タグ投稿の全削除", e))?;
        Ok(())
    }

    async fn delete_older_than_marker(&self, tag: &Tag) -> SyncResult<()> {
        // マーカーがない場合はサブクエリがNULLになり、何も削除されない
        sqlx::query(
            "DELETE FROM posts \
             WHERE tag_slug = $1 \
               AND pub_date < ( \
                   SELECT p.pub_date FROM tags t \
                   JOIN posts p ON p.blog_id = t.gap_blog_id \
                               AND p.post_id = t.gap_post_id \
                               AND p.tag_slug = t.slug \
                   WHERE t.slug = $1)",
        )
        .bind(&tag.slug)
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::database("マーカーより古い投稿の削除", e))?;
        Ok(())
    }
}

#[async_trait]
impl TagStore for PgStore {
    async fn gap_marker(&self, tag: &Tag) -> SyncResult<Option<BlogIdPostId>> {
        let row = sqlx::query("SELECT gap_blog_id, gap_post_id FROM tags WHERE slug = $1")
            .bind(&tag.slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SyncError::database("ギャップマーカーの取得", e))?;

        let marker = row.and_then(|row| {
            let blog_id: Option<i64> = row.get("gap_blog_id");
            let post_id: Option<i64> = row.get("gap_post_id");
            match (blog_id, post_id) {
                (Some(blog_id), Some(post_id)) => Some(BlogIdPostId::new(blog_id, post_id)),
                _ => None,
            }
        });

        Ok(marker)
    }

    async fn set_gap_marker(&self, ids: BlogIdPostId, tag: &Tag) -> SyncResult<()> {
        sqlx::query(
            "INSERT INTO tags (slug, gap_blog_id, gap_post_id) VALUES ($1, $2, $3) \
             ON CONFLICT (slug) DO UPDATE SET \
                 gap_blog_id = EXCLUDED.gap_blog_id, \
                 gap_post_id = EXCLUDED.gap_post_id",
        )
        .bind(&tag.slug)
        .bind(ids.blog_id)
        .bind(ids.post_id)
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::database("ギャップマーカーの設定", e))?;
        Ok(())
    }

    async fn clear_gap_marker(&self, tag: &Tag) -> SyncResult<()> {
        sqlx::query("UPDATE tags SET gap_blog_id = NULL, gap_post_id = NULL WHERE slug = $1")
            .bind(&tag.slug)
            .execute(&self.pool)
            .await
            .map_err(|e| SyncError::database("ギャップマーカーのクリア", e))?;
        Ok(())
    }

    async fn endpoint(&self, tag: &Tag) -> SyncResult<Option<String>> {
        let endpoint: Option<Option<String>> =
            sqlx::query_scalar("SELECT endpoint FROM tags WHERE slug = $1")
                .bind(&tag.slug)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| SyncError::database("エンドポイントの取得", e))?;

        Ok(endpoint.flatten())
    }

    async fn set_last_updated(&self, tag: &Tag) -> SyncResult<()> {
        sqlx::query(
            "INSERT INTO tags (slug, last_updated) VALUES ($1, NOW()) \
             ON CONFLICT (slug) DO UPDATE SET last_updated = NOW()",
        )
        .bind(&tag.slug)
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::database("最終同期時刻の記録", e))?;
        Ok(())
    }
}
