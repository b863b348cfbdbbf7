use super::cursor::{blog_posts_path, build_query, feed_posts_path};
use super::endpoint::resolve_relative_endpoint;
use super::reconcile::reconcile;
use crate::domain::post::Post;
use crate::domain::store::{PostStore, TagStore};
use crate::domain::tag::Tag;
use crate::domain::update::{SourceKey, UpdateAction, UpdateRequest, UpdateResult};
use crate::infra::api::http::HttpClient;
use crate::infra::api::rest::RestClient;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// 同期の開始・終了を外部へ通知するためのトレイト
pub trait SyncNotifier: Send + Sync {
    fn update_started(&self, key: &SourceKey, action: UpdateAction);
    fn update_ended(&self, key: &SourceKey, action: UpdateAction, result: UpdateResult);
}

/// 標準出力へ通知を流す実装
pub struct ConsoleNotifier;

impl SyncNotifier for ConsoleNotifier {
    fn update_started(&self, key: &SourceKey, _action: UpdateAction) {
        println!("--- {} の同期開始 ---", key);
    }

    fn update_ended(&self, key: &SourceKey, _action: UpdateAction, result: UpdateResult) {
        println!("--- {} の同期完了: {} ---", key, result);
    }
}

/// 同期エンジン
///
/// リクエストを1つのソースに確定し、取得 -> 照合のパイプラインを駆動する。
/// HTTPクライアント・ストア・通知先はすべてDIされる。
pub struct SyncEngine<H, P, T, N>
where
    H: HttpClient,
    P: PostStore + 'static,
    T: TagStore + 'static,
    N: SyncNotifier,
{
    rest: RestClient<H>,
    posts: Arc<P>,
    tags: Arc<T>,
    notifier: N,
    // ソースキーごとの照合直列化ロック
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<H, P, T, N> SyncEngine<H, P, T, N>
where
    H: HttpClient,
    P: PostStore + 'static,
    T: TagStore + 'static,
    N: SyncNotifier,
{
    pub fn new(rest: RestClient<H>, posts: Arc<P>, tags: Arc<T>, notifier: N) -> Self {
        Self {
            rest,
            posts,
            tags,
            notifier,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// 1回の同期を実行する
    ///
    /// リクエストからソースを1つに確定し（優先順位: タグ > ブログ > フィード）、
    /// 開始通知 -> 取得 -> 照合 -> 終了通知の順に進める。完了時には
    /// `on_completed`が呼び出し元のコンテキストをそのまま受け取る。
    /// ソースが1つも指定されていない場合は通知もコールバックも行わない。
    pub async fn perform_task<C>(
        &self,
        companion: C,
        action: UpdateAction,
        request: &UpdateRequest,
        on_completed: impl FnOnce(C),
    ) -> Option<UpdateResult> {
        let key = request.source_key()?;

        self.notifier.update_started(&key, action);

        let result = match &key {
            SourceKey::Tag(tag) => self.update_posts_with_tag(tag, action).await,
            SourceKey::Blog(blog_id) => self.update_posts_in_blog(*blog_id, action).await,
            SourceKey::Feed(feed_id) => self.update_posts_in_feed(*feed_id, action).await,
        };

        self.notifier.update_ended(&key, action, result);
        on_completed(companion);

        Some(result)
    }

    async fn update_posts_with_tag(&self, tag: &Tag, action: UpdateAction) -> UpdateResult {
        // エンドポイントが解決できなければリクエストは発行しない
        let path = match resolve_relative_endpoint(tag, &*self.tags).await {
            Ok(path) => path,
            Err(e) => {
                eprintln!("エンドポイント解決エラー: {}", e);
                return UpdateResult::Failed;
            }
        };

        let key = SourceKey::Tag(tag.clone());
        let batch = self.fetch_page(&key, &path, action).await;

        // 新しい投稿を要求した場合は最終同期時刻を記録する
        if batch.is_some()
            && matches!(
                action,
                UpdateAction::RequestNewer | UpdateAction::RequestRefresh
            )
        {
            if let Err(e) = self.tags.set_last_updated(tag).await {
                eprintln!("最終同期時刻の記録に失敗: {}", e);
            }
        }

        self.run_reconcile(key, Some(tag.clone()), action, batch)
            .await
    }

    async fn update_posts_in_blog(&self, blog_id: i64, action: UpdateAction) -> UpdateResult {
        println!("ブログ {} の投稿を更新中", blog_id);
        let key = SourceKey::Blog(blog_id);
        let batch = self.fetch_page(&key, &blog_posts_path(blog_id), action).await;
        self.run_reconcile(key, None, action, batch).await
    }

    async fn update_posts_in_feed(&self, feed_id: i64, action: UpdateAction) -> UpdateResult {
        println!("フィード {} の投稿を更新中", feed_id);
        let key = SourceKey::Feed(feed_id);
        let batch = self.fetch_page(&key, &feed_posts_path(feed_id), action).await;
        self.run_reconcile(key, None, action, batch).await
    }

    /// カーソル付きクエリを組み立てて1ページ取得する
    /// 失敗時はNoneを返し、照合側でFailedに落とす
    async fn fetch_page(
        &self,
        key: &SourceKey,
        path: &str,
        action: UpdateAction,
    ) -> Option<Vec<Post>> {
        let query = match build_query(key, action, &*self.posts).await {
            Ok(query) => query,
            Err(e) => {
                eprintln!("クエリ構築エラー: {}", e);
                return None;
            }
        };

        match self.rest.get_posts(path, &query).await {
            Ok(batch) => Some(batch),
            Err(e) => {
                eprintln!("投稿ページの取得エラー: {}", e);
                None
            }
        }
    }

    /// 照合を独立したタスクとして実行する
    ///
    /// 同一ソースキーの照合はロックで直列化する（ギャップマーカーの不変条件は
    /// 同一タグへの並行書き込みでは保てない）。異なるキーは並行に進む。
    async fn run_reconcile(
        &self,
        key: SourceKey,
        tag: Option<Tag>,
        action: UpdateAction,
        batch: Option<Vec<Post>>,
    ) -> UpdateResult {
        let lock = self.key_lock(&key).await;
        let _guard = lock.lock().await;

        let posts = Arc::clone(&self.posts);
        let tags = Arc::clone(&self.tags);
        let handle = tokio::spawn(async move {
            reconcile(&*posts, &*tags, tag.as_ref(), action, batch).await
        });

        match handle.await {
            Ok(Ok(outcome)) => outcome.result,
            Ok(Err(e)) => {
                eprintln!("照合処理エラー: {}", e);
                UpdateResult::Failed
            }
            Err(e) => {
                eprintln!("照合タスクの実行に失敗: {}", e);
                UpdateResult::Failed
            }
        }
    }

    async fn key_lock(&self, key: &SourceKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        // 誰も保持していないロックはこのタイミングで回収する
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(key.lock_key())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
