//! Durable score storage consumed by the ranking engine.
//!
//! The store is authoritative: rank indexes are rebuilt from `load_all`.

pub mod memory;
pub mod postgres;
pub mod redis_store;

pub use self::memory::MemoryScoreStore;
pub use self::postgres::PgScoreStore;
pub use self::redis_store::RedisScoreStore;

use crate::error::EngineResult;
use crate::models::ScoreEntry;

#[async_trait::async_trait]
pub trait ScoreStore: Send + Sync {
    /// Inserts or replaces the active entry for `(leaderboard_id, player_id)`.
    async fn put(&self, entry: &ScoreEntry) -> EngineResult<()>;

    async fn get(&self, leaderboard_id: &str, player_id: &str)
        -> EngineResult<Option<ScoreEntry>>;

    /// Removes one player's entry. Returns whether it existed.
    async fn remove(&self, leaderboard_id: &str, player_id: &str) -> EngineResult<bool>;

    /// Bulk delete of every entry on the leaderboard.
    async fn delete(&self, leaderboard_id: &str) -> EngineResult<()>;

    async fn load_all(&self, leaderboard_id: &str) -> EngineResult<Vec<ScoreEntry>>;

    async fn count(&self, leaderboard_id: &str) -> EngineResult<usize>;
}

#[async_trait::async_trait]
impl<S: ScoreStore + ?Sized> ScoreStore for std::sync::Arc<S> {
    async fn put(&self, entry: &ScoreEntry) -> EngineResult<()> {
        (**self).put(entry).await
    }

    async fn get(
        &self,
        leaderboard_id: &str,
        player_id: &str,
    ) -> EngineResult<Option<ScoreEntry>> {
        (**self).get(leaderboard_id, player_id).await
    }

    async fn remove(&self, leaderboard_id: &str, player_id: &str) -> EngineResult<bool> {
        (**self).remove(leaderboard_id, player_id).await
    }

    async fn delete(&self, leaderboard_id: &str) -> EngineResult<()> {
        (**self).delete(leaderboard_id).await
    }

    async fn load_all(&self, leaderboard_id: &str) -> EngineResult<Vec<ScoreEntry>> {
        (**self).load_all(leaderboard_id).await
    }

    async fn count(&self, leaderboard_id: &str) -> EngineResult<usize> {
        (**self).count(leaderboard_id).await
    }
}
