use crate::cache::Cache;
use crate::error::EngineResult;
use crate::models::ScoreEntry;
use crate::store::ScoreStore;

/// One Redis hash per leaderboard: field = player id, value = entry JSON.
#[derive(Clone)]
pub struct RedisScoreStore {
    cache: Cache,
}

pub(crate) fn scores_key(leaderboard_id: &str) -> String {
    format!("scores:{}", leaderboard_id)
}

impl RedisScoreStore {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }
}

#[async_trait::async_trait]
impl ScoreStore for RedisScoreStore {
    async fn put(&self, entry: &ScoreEntry) -> EngineResult<()> {
        let json = serde_json::to_string(entry)?;
        self.cache
            .hset(&scores_key(&entry.leaderboard_id), &entry.player_id, &json)
            .await
    }

    async fn get(
        &self,
        leaderboard_id: &str,
        player_id: &str,
    ) -> EngineResult<Option<ScoreEntry>> {
        match self.cache.hget(&scores_key(leaderboard_id), player_id).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn remove(&self, leaderboard_id: &str, player_id: &str) -> EngineResult<bool> {
        self.cache.hdel(&scores_key(leaderboard_id), player_id).await
    }

    async fn delete(&self, leaderboard_id: &str) -> EngineResult<()> {
        self.cache.del(&scores_key(leaderboard_id)).await
    }

    async fn load_all(&self, leaderboard_id: &str) -> EngineResult<Vec<ScoreEntry>> {
        let raw = self.cache.hgetall(&scores_key(leaderboard_id)).await?;
        let mut entries = Vec::with_capacity(raw.len());
        for (player_id, json) in raw {
            let entry: ScoreEntry = serde_json::from_str(&json)?;
            if entry.player_id != player_id {
                tracing::warn!(
                    leaderboard_id,
                    field = %player_id,
                    stored = %entry.player_id,
                    "Score hash field does not match stored player id, skipping"
                );
                continue;
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    async fn count(&self, leaderboard_id: &str) -> EngineResult<usize> {
        self.cache.hlen(&scores_key(leaderboard_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScoreValue;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_scores_key_layout() {
        assert_eq!(scores_key("daily"), "scores:daily");
    }

    #[test]
    fn test_entry_json_keeps_metadata() {
        let entry = ScoreEntry {
            leaderboard_id: "daily".into(),
            player_id: "p1".into(),
            value: ScoreValue::new(12.75).unwrap(),
            submitted_at: Utc::now(),
            metadata: Some(json!({"level": 4})),
            sequence: 12,
        };
        let json = serde_json::to_string(&entry).unwrap();
        let back: ScoreEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
