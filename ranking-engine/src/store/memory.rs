use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::error::EngineResult;
use crate::models::ScoreEntry;
use crate::store::ScoreStore;

/// Process-local store, used by tests and single-node embeddings.
#[derive(Default)]
pub struct MemoryScoreStore {
    boards: RwLock<HashMap<String, HashMap<String, ScoreEntry>>>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn put(&self, entry: &ScoreEntry) -> EngineResult<()> {
        let mut boards = self.boards.write().await;
        boards
            .entry(entry.leaderboard_id.clone())
            .or_default()
            .insert(entry.player_id.clone(), entry.clone());
        Ok(())
    }

    async fn get(
        &self,
        leaderboard_id: &str,
        player_id: &str,
    ) -> EngineResult<Option<ScoreEntry>> {
        let boards = self.boards.read().await;
        Ok(boards
            .get(leaderboard_id)
            .and_then(|b| b.get(player_id))
            .cloned())
    }

    async fn remove(&self, leaderboard_id: &str, player_id: &str) -> EngineResult<bool> {
        let mut boards = self.boards.write().await;
        Ok(boards
            .get_mut(leaderboard_id)
            .map(|b| b.remove(player_id).is_some())
            .unwrap_or(false))
    }

    async fn delete(&self, leaderboard_id: &str) -> EngineResult<()> {
        let mut boards = self.boards.write().await;
        boards.remove(leaderboard_id);
        Ok(())
    }

    async fn load_all(&self, leaderboard_id: &str) -> EngineResult<Vec<ScoreEntry>> {
        let boards = self.boards.read().await;
        Ok(boards
            .get(leaderboard_id)
            .map(|b| b.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn count(&self, leaderboard_id: &str) -> EngineResult<usize> {
        let boards = self.boards.read().await;
        Ok(boards.get(leaderboard_id).map_or(0, |b| b.len()))
    }
}
