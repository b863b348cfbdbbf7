use thiserror::Error;

/// 同期エンジン共通のエラー型
/// ストア・ペイロード・エンドポイント解決など基盤的なエラーのみを定義
#[derive(Error, Debug)]
pub enum SyncError {
    /// タグのエンドポイントが解決できない（システムタグで保存済みエンドポイントがない等）
    #[error("エンドポイントを解決できません: {slug}")]
    Endpoint { slug: String },

    /// データベース関連のエラー
    #[error("データベースエラー: {operation} - {source}")]
    Database {
        operation: String,
        #[source]
        source: sqlx::Error,
    },

    /// レスポンスペイロードの解析エラー
    #[error("ペイロード解析エラー: {context} - {source}")]
    Payload {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// 設定関連のエラー
    #[error("設定エラー: {message}")]
    Config { message: String },
}

impl SyncError {
    /// エンドポイント解決エラーを作成
    pub fn endpoint<S: Into<String>>(slug: S) -> Self {
        Self::Endpoint { slug: slug.into() }
    }

    /// データベースエラーを作成
    pub fn database<O: Into<String>>(operation: O, source: sqlx::Error) -> Self {
        Self::Database {
            operation: operation.into(),
            source,
        }
    }

    /// ペイロード解析エラーを作成
    pub fn payload<C: Into<String>>(context: C, source: serde_json::Error) -> Self {
        Self::Payload {
            context: context.into(),
            source,
        }
    }

    /// 設定エラーを作成
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// 同期エラーのResult型エイリアス
pub type SyncResult<T> = std::result::Result<T, SyncError>;
