use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::score::ScoreValue;

/// Which end of the value range ranks first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Higher values rank first.
    #[default]
    #[serde(alias = "desc")]
    Descending,
    /// Lower values rank first (race times, golf scores).
    #[serde(alias = "asc")]
    Ascending,
}

impl SortDirection {
    /// `Less` means `a` ranks ahead of `b`.
    pub fn compare(self, a: ScoreValue, b: ScoreValue) -> Ordering {
        match self {
            SortDirection::Descending => b.cmp(&a),
            SortDirection::Ascending => a.cmp(&b),
        }
    }

    /// Strict improvement; equal values never improve.
    pub fn improves(self, candidate: ScoreValue, current: ScoreValue) -> bool {
        self.compare(candidate, current) == Ordering::Less
    }
}

impl FromStr for SortDirection {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desc" | "descending" => Ok(SortDirection::Descending),
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            other => Err(EngineError::InvalidInput(format!(
                "sort_order must be \"asc\" or \"desc\", got \"{other}\""
            ))),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Descending => f.write_str("desc"),
            SortDirection::Ascending => f.write_str("asc"),
        }
    }
}

/// Decides whether a submission replaces the player's active entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionPolicy {
    #[default]
    #[serde(alias = "best")]
    BestWins,
    #[serde(alias = "latest")]
    LatestWins,
}

impl FromStr for SubmissionPolicy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best" | "best_wins" => Ok(SubmissionPolicy::BestWins),
            "latest" | "latest_wins" => Ok(SubmissionPolicy::LatestWins),
            other => Err(EngineError::InvalidInput(format!(
                "submission_policy must be \"best_wins\" or \"latest_wins\", got \"{other}\""
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Leaderboard {
    pub id: String,
    #[serde(rename = "appId")]
    pub app_id: String,
    pub name: String,
    #[serde(rename = "sortDirection")]
    pub sort_direction: SortDirection,
    #[serde(rename = "submissionPolicy")]
    pub submission_policy: SubmissionPolicy,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLeaderboard {
    /// Generated (UUID v4) when absent.
    pub id: Option<String>,
    #[serde(rename = "appId")]
    pub app_id: String,
    pub name: String,
    #[serde(default, rename = "sortDirection", alias = "sort_order")]
    pub sort_direction: SortDirection,
    #[serde(default, rename = "submissionPolicy")]
    pub submission_policy: SubmissionPolicy,
}

impl NewLeaderboard {
    pub fn new(app_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            app_id: app_id.into(),
            name: name.into(),
            sort_direction: SortDirection::default(),
            submission_policy: SubmissionPolicy::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn sort_direction(mut self, direction: SortDirection) -> Self {
        self.sort_direction = direction;
        self
    }

    pub fn submission_policy(mut self, policy: SubmissionPolicy) -> Self {
        self.submission_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f64) -> ScoreValue {
        ScoreValue::new(x).unwrap()
    }

    #[test]
    fn test_descending_prefers_higher() {
        let dir = SortDirection::Descending;
        assert_eq!(dir.compare(v(150.0), v(100.0)), Ordering::Less);
        assert!(dir.improves(v(101.0), v(100.0)));
        assert!(!dir.improves(v(100.0), v(100.0)));
        assert!(!dir.improves(v(90.0), v(100.0)));
    }

    #[test]
    fn test_ascending_prefers_lower() {
        let dir = SortDirection::Ascending;
        assert_eq!(dir.compare(v(12.5), v(13.0)), Ordering::Less);
        assert!(dir.improves(v(12.0), v(13.0)));
        assert!(!dir.improves(v(14.0), v(13.0)));
    }

    #[test]
    fn test_parse_short_and_long_forms() {
        assert_eq!("asc".parse::<SortDirection>().unwrap(), SortDirection::Ascending);
        assert_eq!(
            "Descending".parse::<SortDirection>().unwrap(),
            SortDirection::Descending
        );
        assert!("sideways".parse::<SortDirection>().is_err());
        assert_eq!(
            "latest".parse::<SubmissionPolicy>().unwrap(),
            SubmissionPolicy::LatestWins
        );
    }

    #[test]
    fn test_new_leaderboard_accepts_snake_case_aliases() {
        let json = r#"{"appId":"app-1","name":"Daily High Scores","sort_order":"asc"}"#;
        let new: NewLeaderboard = serde_json::from_str(json).unwrap();
        assert_eq!(new.sort_direction, SortDirection::Ascending);
        assert_eq!(new.submission_policy, SubmissionPolicy::BestWins);
        assert!(new.id.is_none());
    }
}
