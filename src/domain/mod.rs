//! ドメインモデルとストア抽象
//!
//! 投稿・タグ・同期アクションの型定義と、永続化コラボレータのトレイトを管理します。

pub mod post;
pub mod store;
pub mod tag;
pub mod update;

// 便利な再エクスポート
pub use post::{parse_posts_payload, BlogIdPostId, Post};
pub use store::{PostStore, TagStore};
pub use tag::{sanitize_with_dashes, search_tags, Tag, TagKind, TagQuery};
pub use update::{SourceKey, UpdateAction, UpdateRequest, UpdateResult};
