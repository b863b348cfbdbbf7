use crate::types::{SyncError, SyncResult};
use sqlx::PgPool;
use std::env;

/// データベース接続プールを作成
/// .envファイルからDATABASE_URLを読み込みます
pub async fn create_pool() -> SyncResult<PgPool> {
    let database_url = env::var("DATABASE_URL")
        .map_err(|_| SyncError::config("環境変数が見つかりません: DATABASE_URL"))?;

    PgPool::connect(&database_url)
        .await
        .map_err(|e| SyncError::database("データベース接続", e))
}

/// データベースの初期化（マイグレーション実行）
pub async fn initialize_database(pool: &PgPool) -> SyncResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| SyncError::database("データベースマイグレーション実行", e.into()))
}

/// プールの作成とデータベース初期化を一括で行う便利関数
pub async fn setup_database() -> SyncResult<PgPool> {
    let pool = create_pool().await?;
    initialize_database(&pool).await?;
    Ok(pool)
}
