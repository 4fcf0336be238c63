use std::collections::BTreeMap;

use chrono::{DateTime, Days, Utc};
use uuid::Uuid;

use crate::config::RecurrenceSettings;
use crate::error::{ServiceError, ServiceResult};
use crate::metrics::RECURRENCES_TOTAL;
use crate::models::live_session::{LiveSession, LiveSessionResponse, SweepReport};
use crate::models::require_id;
use crate::store::{Store, StoreError};

pub struct RecurrenceService {
    store: Store,
    settings: RecurrenceSettings,
}

impl RecurrenceService {
    pub fn new(store: Store, settings: RecurrenceSettings) -> Self {
        Self { store, settings }
    }

    /// Creates the weekly occurrences `base + 7*i` days for `i in 1..=weeks_ahead` that do
    /// not exist yet. Returns only the sessions created by this call.
    pub async fn materialize_recurrences(
        &self,
        base: &LiveSession,
        weeks_ahead: u32,
    ) -> ServiceResult<Vec<LiveSession>> {
        if weeks_ahead == 0 || weeks_ahead > self.settings.max_weeks_ahead {
            return Err(ServiceError::InvalidArgument(format!(
                "weeks_ahead must be between 1 and {}",
                self.settings.max_weeks_ahead
            )));
        }
        Self::check_base(base)?;

        let mut created = Vec::new();
        for week in 1..=u64::from(weeks_ahead) {
            let Some(candidate) = base.date.checked_add_days(Days::new(7 * week)) else {
                return Err(ServiceError::InvalidArgument(format!(
                    "occurrence {} weeks after {} is out of range",
                    week, base.date
                )));
            };

            if self
                .store
                .live_sessions
                .occurrence_exists(&base.topic, &base.batch, candidate)
                .await?
            {
                RECURRENCES_TOTAL.with_label_values(&["skipped"]).inc();
                continue;
            }

            let occurrence = base.occurrence_on(candidate, Uuid::new_v4().to_string(), Utc::now());
            match self.store.live_sessions.insert_session(&occurrence).await {
                Ok(()) => {
                    RECURRENCES_TOTAL.with_label_values(&["created"]).inc();
                    tracing::info!(
                        session_id = %occurrence.id,
                        topic = %occurrence.topic,
                        batch = %occurrence.batch,
                        date = %occurrence.date,
                        "Materialized weekly occurrence"
                    );
                    created.push(occurrence);
                }
                // Lost a race with a concurrent generator; the occurrence exists now.
                Err(StoreError::DuplicateKey(key)) => {
                    RECURRENCES_TOTAL.with_label_values(&["skipped"]).inc();
                    tracing::debug!(%key, "Occurrence created concurrently, skipping");
                }
                Err(err) => {
                    RECURRENCES_TOTAL.with_label_values(&["failed"]).inc();
                    return Err(err.into());
                }
            }
        }

        Ok(created)
    }

    pub async fn materialize_by_id(
        &self,
        base_session_id: &str,
        weeks_ahead: u32,
    ) -> ServiceResult<Vec<LiveSession>> {
        require_id("session_id", base_session_id)?;

        let base = self
            .store
            .live_sessions
            .find_session(base_session_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("live session {}", base_session_id)))?;

        self.materialize_recurrences(&base, weeks_ahead).await
    }

    /// Keeps every weekly series `horizon_weeks` occurrences ahead of its latest session
    /// dated on or before `now`. A series is one weekday slot of a (topic, batch), so a
    /// topic taught on Mondays and Thursdays advances both days.
    ///
    /// Cancelled sessions still anchor their series. A storage failure aborts the sweep;
    /// occurrences created before it stay, and the next sweep skips them.
    pub async fn advance_due_recurrences(&self, now: DateTime<Utc>) -> ServiceResult<SweepReport> {
        let due = self
            .store
            .live_sessions
            .find_due_recurring(now.date_naive())
            .await?;
        let scanned = due.len();

        let mut latest: BTreeMap<(String, String, u32), LiveSession> = BTreeMap::new();
        for session in due {
            match latest.get(&session.series_key()) {
                Some(current) if current.date >= session.date => {}
                _ => {
                    latest.insert(session.series_key(), session);
                }
            }
        }

        let series = latest.len();
        let mut created = Vec::new();
        for base in latest.values() {
            if let Err(err) = Self::check_base(base) {
                tracing::warn!(session_id = %base.id, error = %err, "Skipping invalid recurring session");
                continue;
            }
            let sessions = self
                .materialize_recurrences(base, self.settings.horizon_weeks)
                .await?;
            created.extend(sessions.into_iter().map(LiveSessionResponse::from));
        }

        tracing::info!(scanned, series, created = created.len(), "Recurrence sweep finished");

        Ok(SweepReport {
            scanned,
            series,
            created,
        })
    }

    fn check_base(base: &LiveSession) -> ServiceResult<()> {
        if !base.recurs_weekly {
            return Err(ServiceError::InvalidArgument(format!(
                "live session {} does not recur weekly",
                base.id
            )));
        }
        require_id("topic", &base.topic)?;
        require_id("batch", &base.batch)
    }
}
