//! 型定義モジュール
//!
//! 同期エンジン全体で使用される共通的な型定義を管理します。
//! - エラー型: ストア・ペイロード・設定エラーの統一表現

pub mod error;

// 便利な再エクスポート
pub use error::{SyncError, SyncResult};
