use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bson_datetime_as_chrono;

/// Running score of one user, stored in MongoDB "leaderboard" collection keyed by user id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntry {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub batch: String,
    pub points: i64,
    pub tasks_completed: i64,
    #[serde(rename = "lastUpdated", with = "bson_datetime_as_chrono")]
    pub last_updated: DateTime<Utc>,
}

/// Board order: points descending, then earliest `last_updated`, then user id.
pub fn standings_order(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| a.last_updated.cmp(&b.last_updated))
        .then_with(|| a.user_id.cmp(&b.user_id))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntryResponse {
    pub user_id: String,
    pub batch: String,
    pub points: i64,
    pub tasks_completed: i64,
    pub last_updated: DateTime<Utc>,
}

impl From<LeaderboardEntry> for LeaderboardEntryResponse {
    fn from(entry: LeaderboardEntry) -> Self {
        LeaderboardEntryResponse {
            user_id: entry.user_id,
            batch: entry.batch,
            points: entry.points,
            tasks_completed: entry.tasks_completed,
            last_updated: entry.last_updated,
        }
    }
}

/// One graded event worth `points_delta` points
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccumulateRequest {
    pub user_id: String,
    pub batch: String,
    pub points_delta: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankQuery {
    /// Defaults to the authenticated user
    pub user_id: Option<String>,
    pub batch: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RankView {
    pub user_id: String,
    /// 1-based
    pub position: usize,
    pub total: usize,
    pub points: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StandingsQuery {
    pub batch: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StandingEntry {
    pub position: usize,
    pub user_id: String,
    pub batch: String,
    pub points: i64,
    pub tasks_completed: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResetReport {
    pub entries_reset: u64,
}
