//! Ranking engine for game leaderboards.
//!
//! Keeps a strict, tie-broken order over the active score of every player
//! on every leaderboard and answers top-N, rank and neighborhood queries
//! against an in-memory order-statistics index backed by a durable
//! [`store::ScoreStore`].

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod telemetry;

pub use config::{Config, LeaderboardConfig};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use services::RankingEngine;
pub use store::ScoreStore;

use cache::Cache;
use store::{PgScoreStore, RedisScoreStore};

/// Engine over the Postgres score table, creating it if needed.
pub async fn connect_postgres(config: &Config) -> EngineResult<RankingEngine<PgScoreStore>> {
    let pool = db::create_pool(config).await?;
    let store = PgScoreStore::new(pool);
    store.migrate().await?;
    tracing::info!("Ranking engine initialized (Postgres score store)");
    Ok(RankingEngine::new(store, config.leaderboard.clone()))
}

/// Engine over Redis hashes.
pub async fn connect_redis(config: &Config) -> EngineResult<RankingEngine<RedisScoreStore>> {
    let cache = Cache::new(config).await?;
    if !cache.health_check().await {
        return Err(EngineError::Internal("Redis did not answer PING".into()));
    }
    tracing::info!("Ranking engine initialized (Redis score store)");
    Ok(RankingEngine::new(
        RedisScoreStore::new(cache),
        config.leaderboard.clone(),
    ))
}
