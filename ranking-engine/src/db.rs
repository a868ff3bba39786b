use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Config;
use crate::error::EngineResult;

pub async fn create_pool(config: &Config) -> EngineResult<PgPool> {
    let url = config.database_url();
    let pool = PgPoolOptions::new()
        .min_connections(config.db.pool_min)
        .max_connections(config.db.pool_max)
        .acquire_timeout(std::time::Duration::from_secs(
            config.db.acquire_timeout_secs,
        ))
        .connect(&url)
        .await?;
    Ok(pool)
}
