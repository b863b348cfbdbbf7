//! reader-sync
//!
//! リモートのページ分割された投稿ソース（タグ・ブログ・フィード）と
//! ローカルキャッシュを増分同期するエンジン。一度に見えるのはリモートの
//! 1ページだけなので、キャッシュとの間に欠落（ギャップ）があるかを検出し、
//! マーカーとして記録して後から埋める。

pub mod domain;
pub mod infra;
pub mod sync;
pub mod types;
