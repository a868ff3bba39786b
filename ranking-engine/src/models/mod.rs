pub mod leaderboard;
pub mod score;

pub use leaderboard::*;
pub use score::*;
