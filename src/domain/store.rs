use super::post::{BlogIdPostId, Post};
use super::tag::Tag;
use super::update::{SourceKey, UpdateResult};
use crate::types::SyncResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// 投稿キャッシュへの抽象化トレイト
///
/// 照合アルゴリズムはこのトレイト経由でのみキャッシュを読み書きする。
/// 本番ではPostgres実装、テストではインメモリ実装をDIする。
#[async_trait]
pub trait PostStore: Send + Sync {
    /// バッチをキャッシュと比較し、暫定結果を返す
    ///
    /// バッチ内にキャッシュ未登録の投稿があればHasNew、既知だが内容が
    /// 異なる投稿のみであればChanged、それ以外（空バッチ含む）はUnchanged。
    async fn compare(&self, batch: &[Post]) -> SyncResult<UpdateResult>;

    /// ソースのキャッシュ内で最古の公開日時を返す
    async fn oldest_pub_date(&self, key: &SourceKey) -> SyncResult<Option<DateTime<Utc>>>;

    /// タグのギャップマーカーが指す投稿の公開日時を返す
    async fn gap_marker_pub_date(&self, tag: &Tag) -> SyncResult<Option<DateTime<Utc>>>;

    /// タグに紐づくキャッシュ投稿数を返す
    async fn count_for_tag(&self, tag: &Tag) -> SyncResult<i64>;

    /// バッチとタグのキャッシュに共通の投稿が1件以上あるか
    async fn has_overlap(&self, batch: &[Post], tag: &Tag) -> SyncResult<bool>;

    /// バッチをキャッシュへ保存する
    ///
    /// (blog_id, post_id)をキーとするupsert。再取得された投稿は更新され、
    /// 重複レコードは作られない。
    async fn upsert(&self, tag: Option<&Tag>, batch: &[Post]) -> SyncResult<()>;

    /// タグに紐づくキャッシュ投稿をすべて削除する
    async fn delete_all_for_tag(&self, tag: &Tag) -> SyncResult<()>;

    /// ギャップマーカーより古いタグのキャッシュ投稿を削除する
    /// マーカーがない場合は何もしない
    async fn delete_older_than_marker(&self, tag: &Tag) -> SyncResult<()>;
}

/// タグ同期状態への抽象化トレイト
#[async_trait]
pub trait TagStore: Send + Sync {
    /// タグの現在のギャップマーカーを返す
    async fn gap_marker(&self, tag: &Tag) -> SyncResult<Option<BlogIdPostId>>;

    /// タグのギャップマーカーを設定する
    ///
    /// 不変条件: タグが同時に持てるマーカーは最大1つ。呼び出し側は
    /// 既存マーカーを先にクリアしてから設定する。
    async fn set_gap_marker(&self, ids: BlogIdPostId, tag: &Tag) -> SyncResult<()>;

    /// タグのギャップマーカーをクリアする
    async fn clear_gap_marker(&self, tag: &Tag) -> SyncResult<()>;

    /// 保存済みエンドポイントを返す
    async fn endpoint(&self, tag: &Tag) -> SyncResult<Option<String>>;

    /// 最終同期時刻を現在時刻で記録する
    async fn set_last_updated(&self, tag: &Tag) -> SyncResult<()>;
}
