//! 同期パイプライン
//!
//! エンドポイント解決 -> カーソル構築 -> 取得 -> 照合（ギャップ検出）の
//! 各段階を管理します。

pub mod cursor;
pub mod endpoint;
pub mod engine;
pub mod reconcile;

// 便利な再エクスポート
pub use cursor::MAX_POSTS_TO_REQUEST;
pub use engine::{ConsoleNotifier, SyncEngine, SyncNotifier};
pub use reconcile::{reconcile, ReconcileOutcome};
