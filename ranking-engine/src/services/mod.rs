pub mod rank_index;
pub mod ranking;
pub mod registry;

pub use rank_index::RankIndex;
pub use ranking::RankingEngine;
pub use registry::{LeaderboardHandle, LeaderboardRegistry};
