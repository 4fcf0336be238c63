use chrono::{DateTime, Utc};

use crate::config::LeaderboardSettings;
use crate::error::{ServiceError, ServiceResult};
use crate::metrics::{
    LEADERBOARD_ACCUMULATIONS_TOTAL, LEADERBOARD_POINTS_AWARDED_TOTAL, LEADERBOARD_RESETS_TOTAL,
};
use crate::models::leaderboard::{
    standings_order, LeaderboardEntry, RankView, ResetReport, StandingEntry,
};
use crate::models::require_id;
use crate::store::{Store, StoreError};

const MAX_STANDINGS_LIMIT: u32 = 100;

pub struct LeaderboardService {
    store: Store,
    settings: LeaderboardSettings,
}

impl LeaderboardService {
    pub fn new(store: Store, settings: LeaderboardSettings) -> Self {
        Self { store, settings }
    }

    /// Adds one scored event to a user's running total. Every call counts, so replaying
    /// the same event counts it twice.
    pub async fn accumulate(
        &self,
        user_id: &str,
        batch: &str,
        points_delta: i64,
    ) -> ServiceResult<LeaderboardEntry> {
        self.accumulate_at(user_id, batch, points_delta, Utc::now())
            .await
    }

    pub(crate) async fn accumulate_at(
        &self,
        user_id: &str,
        batch: &str,
        points_delta: i64,
        at: DateTime<Utc>,
    ) -> ServiceResult<LeaderboardEntry> {
        require_id("user_id", user_id)?;
        require_id("batch", batch)?;
        if points_delta < 0 {
            return Err(ServiceError::InvalidArgument(
                "points_delta must not be negative".to_string(),
            ));
        }

        let entry = match self
            .store
            .leaderboard
            .increment(user_id, batch, points_delta, at)
            .await
        {
            Ok(entry) => entry,
            Err(StoreError::Overflow(detail)) => {
                return Err(ServiceError::InvalidArgument(format!(
                    "points_delta {} is too large: {}",
                    points_delta, detail
                )))
            }
            Err(err) => return Err(err.into()),
        };

        LEADERBOARD_ACCUMULATIONS_TOTAL.inc();
        LEADERBOARD_POINTS_AWARDED_TOTAL.inc_by(points_delta as u64);
        tracing::debug!(
            user_id,
            batch,
            points_delta,
            points = entry.points,
            "Leaderboard entry updated"
        );

        Ok(entry)
    }

    /// 1-based position of a user on the ordered board, scoped to `batch` when given.
    pub async fn rank(&self, user_id: &str, batch: Option<&str>) -> ServiceResult<RankView> {
        require_id("user_id", user_id)?;

        let board = self.ordered_board(batch).await?;
        let total = board.len();

        board
            .into_iter()
            .enumerate()
            .find(|(_, entry)| entry.user_id == user_id)
            .map(|(index, entry)| RankView {
                user_id: entry.user_id,
                position: index + 1,
                total,
                points: entry.points,
            })
            .ok_or_else(|| match batch {
                Some(batch) => {
                    ServiceError::NotFound(format!("leaderboard entry {} in batch {}", user_id, batch))
                }
                None => ServiceError::NotFound(format!("leaderboard entry {}", user_id)),
            })
    }

    /// Top of the ordered board. `limit` is clamped to 1..=100.
    pub async fn standings(
        &self,
        batch: Option<&str>,
        limit: Option<u32>,
    ) -> ServiceResult<Vec<StandingEntry>> {
        let limit = limit
            .unwrap_or(self.settings.default_limit)
            .clamp(1, MAX_STANDINGS_LIMIT) as usize;

        Ok(self
            .ordered_board(batch)
            .await?
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(index, entry)| StandingEntry {
                position: index + 1,
                user_id: entry.user_id,
                batch: entry.batch,
                points: entry.points,
                tasks_completed: entry.tasks_completed,
            })
            .collect())
    }

    /// Zeroes every entry's points and task count; the entries themselves remain.
    pub async fn reset_all(&self) -> ServiceResult<ResetReport> {
        let entries_reset = self.store.leaderboard.reset_all().await?;

        LEADERBOARD_RESETS_TOTAL.inc();
        tracing::warn!(entries_reset, "Leaderboard reset");

        Ok(ResetReport { entries_reset })
    }

    async fn ordered_board(&self, batch: Option<&str>) -> ServiceResult<Vec<LeaderboardEntry>> {
        if let Some(batch) = batch {
            require_id("batch", batch)?;
        }
        let mut entries = self.store.leaderboard.list_entries(batch).await?;
        entries.sort_by(standings_order);
        Ok(entries)
    }
}
