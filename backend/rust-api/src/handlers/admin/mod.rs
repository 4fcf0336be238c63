mod courses;
mod leaderboard;
mod live_sessions;

pub use courses::*;
pub use leaderboard::*;
pub use live_sessions::*;
