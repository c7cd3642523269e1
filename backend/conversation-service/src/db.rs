use db_pool::{create_pool, DbConfig, PgPool};

use crate::error::AppError;
use crate::migrations;

pub async fn init_pool(database_url: &str) -> Result<PgPool, AppError> {
    let cfg = DbConfig::from_env("conversation-service", database_url);
    cfg.log_config();
    let pool = create_pool(cfg)
        .await
        .map_err(|e| AppError::StartServer(format!("db: {e}")))?;
    migrations::run_all(&pool).await?;
    Ok(pool)
}
