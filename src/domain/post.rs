use crate::infra::parser::parse_date;
use crate::types::SyncError;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 投稿の識別子ペア（ブログID + 投稿ID）
///
/// ソース種別に関係なく、投稿はこのペアで一意に識別される。
/// ギャップマーカーもこのペアを指す。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlogIdPostId {
    pub blog_id: i64,
    pub post_id: i64,
}

impl BlogIdPostId {
    pub fn new(blog_id: i64, post_id: i64) -> Self {
        Self { blog_id, post_id }
    }
}

/// リモートから取得した投稿
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub blog_id: i64,
    pub post_id: i64,
    /// フィード経由で取得した場合のフィードID
    pub feed_id: Option<i64>,
    pub title: String,
    pub url: String,
    /// 公開日時。新しい順の全順序付けに使用する
    pub pub_date: DateTime<Utc>,
    pub num_likes: i64,
}

impl Post {
    /// この投稿の識別子ペアを返す
    pub fn ids(&self) -> BlogIdPostId {
        BlogIdPostId::new(self.blog_id, self.post_id)
    }
}

// REST APIレスポンスのJSON構造に対応する型
#[derive(Debug, Deserialize)]
struct PostsPayload {
    #[serde(default)]
    posts: Vec<RawPost>,
}

#[derive(Debug, Deserialize)]
struct RawPost {
    #[serde(rename = "ID")]
    id: Option<i64>,
    #[serde(rename = "site_ID")]
    site_id: Option<i64>,
    #[serde(rename = "feed_ID")]
    feed_id: Option<i64>,
    title: Option<String>,
    #[serde(rename = "URL")]
    url: Option<String>,
    date: Option<String>,
    like_count: Option<i64>,
}

/// REST APIのレスポンスJSONから投稿リストを抽出する
///
/// サーバーは公開日時の降順で投稿を返す。順序は検出アルゴリズムの前提なので
/// ここでは並び替えない。識別子か日付が欠けている要素はスキップする。
pub fn parse_posts_payload(json: &str) -> Result<Vec<Post>> {
    let payload: PostsPayload = serde_json::from_str(json)
        .map_err(|e| SyncError::payload("投稿ペイロードのJSON解析", e))?;

    let posts = payload
        .posts
        .into_iter()
        .filter_map(|raw| {
            let blog_id = raw.site_id?;
            let post_id = raw.id?;
            let pub_date = parse_date(raw.date.as_deref()?).ok()?;

            Some(Post {
                blog_id,
                post_id,
                feed_id: raw.feed_id,
                title: raw.title.unwrap_or_default(),
                url: raw.url.unwrap_or_default(),
                pub_date,
                num_likes: raw.like_count.unwrap_or(0),
            })
        })
        .collect();

    Ok(posts)
}
