use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::{EngineError, EngineResult};
use crate::models::{ScoreEntry, ScoreValue};
use crate::store::ScoreStore;

const CREATE_SCORES: &str = r#"CREATE TABLE IF NOT EXISTS scores (
    leaderboard_id TEXT NOT NULL,
    player_id TEXT NOT NULL,
    value DOUBLE PRECISION NOT NULL,
    submitted_at TIMESTAMPTZ NOT NULL,
    metadata JSONB,
    seq BIGINT NOT NULL DEFAULT 0,
    PRIMARY KEY (leaderboard_id, player_id)
)"#;

const ADD_SEQ_COLUMN: &str =
    "ALTER TABLE scores ADD COLUMN IF NOT EXISTS seq BIGINT NOT NULL DEFAULT 0";

const CREATE_PLAYER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS scores_player_idx ON scores (player_id)";

#[derive(Debug, sqlx::FromRow)]
struct ScoreRow {
    leaderboard_id: String,
    player_id: String,
    value: f64,
    submitted_at: DateTime<Utc>,
    metadata: Option<serde_json::Value>,
    seq: i64,
}

impl TryFrom<ScoreRow> for ScoreEntry {
    type Error = EngineError;

    fn try_from(row: ScoreRow) -> Result<Self, Self::Error> {
        let value = ScoreValue::new(row.value).map_err(|_| {
            EngineError::Internal(format!(
                "Stored score for {}/{} is not finite",
                row.leaderboard_id, row.player_id
            ))
        })?;
        let sequence = u64::try_from(row.seq).map_err(|_| {
            EngineError::Internal(format!(
                "Stored sequence for {}/{} is negative",
                row.leaderboard_id, row.player_id
            ))
        })?;
        Ok(ScoreEntry {
            leaderboard_id: row.leaderboard_id,
            player_id: row.player_id,
            value,
            submitted_at: row.submitted_at,
            metadata: row.metadata,
            sequence,
        })
    }
}

fn row_count(leaderboard_id: &str, count: i64) -> EngineResult<usize> {
    usize::try_from(count).map_err(|_| {
        EngineError::Internal(format!("Score count {count} for {leaderboard_id} is invalid"))
    })
}

#[derive(Clone)]
pub struct PgScoreStore {
    pool: PgPool,
}

impl PgScoreStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotent schema setup.
    pub async fn migrate(&self) -> EngineResult<()> {
        sqlx::query(CREATE_SCORES).execute(&self.pool).await?;
        sqlx::query(ADD_SEQ_COLUMN).execute(&self.pool).await?;
        sqlx::query(CREATE_PLAYER_INDEX).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ScoreStore for PgScoreStore {
    async fn put(&self, entry: &ScoreEntry) -> EngineResult<()> {
        let seq = i64::try_from(entry.sequence).map_err(|_| {
            EngineError::Internal(format!("Sequence {} does not fit BIGINT", entry.sequence))
        })?;
        sqlx::query(
            r#"INSERT INTO scores (leaderboard_id, player_id, value, submitted_at, metadata, seq)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (leaderboard_id, player_id) DO UPDATE SET
                value = EXCLUDED.value,
                submitted_at = EXCLUDED.submitted_at,
                metadata = EXCLUDED.metadata,
                seq = EXCLUDED.seq"#,
        )
        .bind(&entry.leaderboard_id)
        .bind(&entry.player_id)
        .bind(entry.value.get())
        .bind(entry.submitted_at)
        .bind(&entry.metadata)
        .bind(seq)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(
        &self,
        leaderboard_id: &str,
        player_id: &str,
    ) -> EngineResult<Option<ScoreEntry>> {
        let row: Option<ScoreRow> = sqlx::query_as(
            "SELECT leaderboard_id, player_id, value, submitted_at, metadata, seq FROM scores WHERE leaderboard_id = $1 AND player_id = $2",
        )
        .bind(leaderboard_id)
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ScoreEntry::try_from).transpose()
    }

    async fn remove(&self, leaderboard_id: &str, player_id: &str) -> EngineResult<bool> {
        let result = sqlx::query("DELETE FROM scores WHERE leaderboard_id = $1 AND player_id = $2")
            .bind(leaderboard_id)
            .bind(player_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, leaderboard_id: &str) -> EngineResult<()> {
        let result = sqlx::query("DELETE FROM scores WHERE leaderboard_id = $1")
            .bind(leaderboard_id)
            .execute(&self.pool)
            .await?;
        tracing::debug!(
            leaderboard_id,
            rows = result.rows_affected(),
            "Deleted leaderboard scores"
        );
        Ok(())
    }

    async fn load_all(&self, leaderboard_id: &str) -> EngineResult<Vec<ScoreEntry>> {
        let rows: Vec<ScoreRow> = sqlx::query_as(
            "SELECT leaderboard_id, player_id, value, submitted_at, metadata, seq FROM scores WHERE leaderboard_id = $1 ORDER BY submitted_at ASC",
        )
        .bind(leaderboard_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ScoreEntry::try_from).collect()
    }

    async fn count(&self, leaderboard_id: &str) -> EngineResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*)::bigint FROM scores WHERE leaderboard_id = $1")
            .bind(leaderboard_id)
            .fetch_one(&self.pool)
            .await?;
        row_count(leaderboard_id, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(value: f64) -> ScoreRow {
        ScoreRow {
            leaderboard_id: "lb".into(),
            player_id: "p1".into(),
            value,
            submitted_at: Utc::now(),
            metadata: None,
            seq: 4,
        }
    }

    #[test]
    fn test_row_conversion_rejects_corrupt_values() {
        let entry = ScoreEntry::try_from(row(42.0)).unwrap();
        assert_eq!(entry.value, ScoreValue::from(42));
        assert_eq!(entry.sequence, 4);

        let err = ScoreEntry::try_from(row(f64::NAN)).unwrap_err();
        assert!(matches!(err, EngineError::Internal(_)));
    }

    #[test]
    fn test_row_conversion_rejects_negative_sequence() {
        let mut bad = row(1.0);
        bad.seq = -1;
        let err = ScoreEntry::try_from(bad).unwrap_err();
        assert!(matches!(err, EngineError::Internal(_)));
    }

    #[test]
    fn test_row_count_rejects_negative() {
        assert_eq!(row_count("lb", 12).unwrap(), 12);
        assert!(matches!(row_count("lb", -1), Err(EngineError::Internal(_))));
    }
}
