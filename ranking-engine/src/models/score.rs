use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, EngineResult};
use crate::models::leaderboard::Leaderboard;

/// A finite, totally ordered score value.
///
/// NaN and infinities are rejected at construction so every pair of values
/// compares, and `-0.0` is folded into `0.0` so equal-looking scores tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ScoreValue(OrderedFloat<f64>);

impl ScoreValue {
    pub fn new(value: f64) -> EngineResult<Self> {
        if !value.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "Score must be a finite number, got {value}"
            )));
        }
        let value = if value == 0.0 { 0.0 } else { value };
        Ok(Self(OrderedFloat(value)))
    }

    /// Accepts JSON numbers only; strings, booleans and nulls are rejected.
    pub fn from_json(value: &Value) -> EngineResult<Self> {
        match value {
            Value::Number(n) => {
                let v = n.as_f64().ok_or_else(|| {
                    EngineError::InvalidInput(format!("Score {n} is not representable"))
                })?;
                Self::new(v)
            }
            other => Err(EngineError::InvalidInput(format!(
                "Score must be numeric, got {other}"
            ))),
        }
    }

    pub fn get(self) -> f64 {
        self.0.into_inner()
    }
}

impl TryFrom<f64> for ScoreValue {
    type Error = EngineError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<i32> for ScoreValue {
    fn from(value: i32) -> Self {
        Self(OrderedFloat(f64::from(value)))
    }
}

impl From<ScoreValue> for f64 {
    fn from(value: ScoreValue) -> Self {
        value.get()
    }
}

impl fmt::Display for ScoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// The single active score of a player on a leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    #[serde(rename = "leaderboardId")]
    pub leaderboard_id: String,
    #[serde(rename = "playerId")]
    pub player_id: String,
    pub value: ScoreValue,
    #[serde(rename = "submittedAt")]
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Per-leaderboard insertion sequence, the last tie-break after
    /// `submitted_at`. Persisted so a rebuilt index orders ties the same way.
    #[serde(default)]
    pub sequence: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoreSubmission {
    #[serde(rename = "leaderboardId", alias = "leaderboard_id")]
    pub leaderboard_id: String,
    #[serde(rename = "playerId", alias = "player_id")]
    pub player_id: String,
    #[serde(alias = "score")]
    pub value: ScoreValue,
    #[serde(rename = "submittedAt", default = "Utc::now")]
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl ScoreSubmission {
    pub fn new(
        leaderboard_id: impl Into<String>,
        player_id: impl Into<String>,
        value: ScoreValue,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            leaderboard_id: leaderboard_id.into(),
            player_id: player_id.into(),
            value,
            submitted_at,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Timestamps are cut to microseconds, the precision of the durable stores.
    pub fn into_entry(self, sequence: u64) -> ScoreEntry {
        ScoreEntry {
            leaderboard_id: self.leaderboard_id,
            player_id: self.player_id,
            value: self.value,
            submitted_at: self.submitted_at.trunc_subsecs(6),
            metadata: self.metadata,
            sequence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub rank: usize,
    #[serde(rename = "playerId")]
    pub player_id: String,
    pub value: ScoreValue,
    #[serde(rename = "submittedAt")]
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip)]
    pub sequence: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    #[serde(rename = "leaderboardId")]
    pub leaderboard_id: String,
    #[serde(rename = "playerId")]
    pub player_id: String,
    pub rank: usize,
    /// False when the submission did not replace the active entry.
    pub changed: bool,
    pub active: ScoreEntry,
    #[serde(rename = "previousValue")]
    pub previous: Option<ScoreValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopScores {
    pub leaderboard: Leaderboard,
    #[serde(rename = "totalScores")]
    pub total: usize,
    pub entries: Vec<RankedEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerStanding {
    #[serde(rename = "leaderboardId")]
    pub leaderboard_id: String,
    #[serde(rename = "playerId")]
    pub player_id: String,
    pub rank: usize,
    pub entry: RankedEntry,
    #[serde(rename = "totalPlayers")]
    pub total: usize,
    pub nearby: Vec<RankedEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerScore {
    pub leaderboard: Leaderboard,
    pub rank: usize,
    pub entry: ScoreEntry,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejects_non_finite() {
        assert!(ScoreValue::new(f64::NAN).is_err());
        assert!(ScoreValue::new(f64::INFINITY).is_err());
        assert!(ScoreValue::new(f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn test_negative_zero_ties_with_zero() {
        assert_eq!(ScoreValue::new(-0.0).unwrap(), ScoreValue::new(0.0).unwrap());
    }

    #[test]
    fn test_from_json_only_accepts_numbers() {
        assert_eq!(ScoreValue::from_json(&json!(42)).unwrap(), ScoreValue::from(42));
        assert_eq!(ScoreValue::from_json(&json!(1.5)).unwrap().get(), 1.5);
        for bad in [json!("42"), json!(true), json!(null), json!([1]), json!({"v": 1})] {
            let err = ScoreValue::from_json(&bad).unwrap_err();
            assert!(matches!(err, EngineError::InvalidInput(_)), "{bad}");
        }
    }

    #[test]
    fn test_submission_accepts_snake_case_aliases() {
        let json = r#"{"leaderboard_id":"lb","player_id":"p1","score":120,"metadata":{"level":3}}"#;
        let sub: ScoreSubmission = serde_json::from_str(json).unwrap();
        assert_eq!(sub.value, ScoreValue::from(120));
        assert_eq!(sub.metadata, Some(json!({"level": 3})));

        let bad = r#"{"leaderboardId":"lb","playerId":"p1","value":"lots"}"#;
        assert!(serde_json::from_str::<ScoreSubmission>(bad).is_err());
    }

    #[test]
    fn test_into_entry_truncates_to_microseconds() {
        use chrono::TimeZone;
        let at = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let entry = ScoreSubmission::new("lb", "p1", ScoreValue::from(5), at).into_entry(9);
        assert_eq!(entry.submitted_at.timestamp_subsec_nanos(), 123_456_000);
        assert_eq!(entry.sequence, 9);
    }

    #[test]
    fn test_entry_without_sequence_defaults_to_zero() {
        let json = r#"{"leaderboardId":"lb","playerId":"p1","value":3,"submittedAt":"2024-01-01T00:00:00Z"}"#;
        let entry: ScoreEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.sequence, 0);
    }
}
