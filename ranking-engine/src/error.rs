use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Player {player_id} has no score on leaderboard {leaderboard_id}")]
    PlayerNotRanked {
        leaderboard_id: String,
        player_id: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable classification handed to the request layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    PlayerNotRanked,
    InvalidInput,
    Conflict,
    Internal,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::PlayerNotRanked { .. } => ErrorKind::PlayerNotRanked,
            EngineError::InvalidInput(_) => ErrorKind::InvalidInput,
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::Database(e) => {
                tracing::error!("Database error: {e}");
                ErrorKind::Internal
            }
            EngineError::Redis(e) => {
                tracing::error!("Redis error: {e}");
                ErrorKind::Internal
            }
            EngineError::Serialization(e) => {
                tracing::error!("Serialization error: {e}");
                ErrorKind::Internal
            }
            EngineError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                ErrorKind::Internal
            }
        }
    }

    pub(crate) fn leaderboard_not_found(leaderboard_id: &str) -> Self {
        EngineError::NotFound(format!("Leaderboard {leaderboard_id} not found"))
    }

    pub(crate) fn not_ranked(leaderboard_id: &str, player_id: &str) -> Self {
        EngineError::PlayerNotRanked {
            leaderboard_id: leaderboard_id.to_string(),
            player_id: player_id.to_string(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
