use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::bson_datetime_as_chrono;

/// Live session stored in MongoDB "live_sessions" collection.
///
/// `(topic, batch, date)` identifies an occurrence; no two sessions share it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LiveSession {
    #[serde(rename = "_id")]
    pub id: String,
    pub topic: String,
    pub batch: String,
    pub date: NaiveDate,
    #[serde(with = "time_of_day")]
    pub time: NaiveTime,
    #[serde(default)]
    pub recurs_weekly: bool,
    pub meeting_link: String,
    pub status: SessionStatus,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

impl LiveSession {
    /// Copy of this session moved to `date`, freshly scheduled.
    pub fn occurrence_on(&self, date: NaiveDate, id: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            topic: self.topic.clone(),
            batch: self.batch.clone(),
            date,
            time: self.time,
            recurs_weekly: self.recurs_weekly,
            meeting_link: self.meeting_link.clone(),
            status: SessionStatus::Scheduled,
            created_at: now,
        }
    }

    /// Weekly slot: sessions sharing topic, batch and weekday (0 = Monday).
    pub fn series_key(&self) -> (String, String, u32) {
        (
            self.topic.clone(),
            self.batch.clone(),
            self.date.weekday().num_days_from_monday(),
        )
    }
}

/// `HH:MM` on the wire and in storage; `HH:MM:SS` is accepted on input.
mod time_of_day {
    use chrono::NaiveTime;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<NaiveTime>().map_err(D::Error::custom)
    }
}

/// Storage form of a session date ("YYYY-MM-DD"); sorts chronologically as a string.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Active,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Scheduled, SessionStatus::Active)
                | (SessionStatus::Scheduled, SessionStatus::Completed)
                | (SessionStatus::Scheduled, SessionStatus::Cancelled)
                | (SessionStatus::Active, SessionStatus::Completed)
                | (SessionStatus::Active, SessionStatus::Cancelled)
        )
    }
}

/// Live session response for the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSessionResponse {
    pub id: String,
    pub topic: String,
    pub batch: String,
    pub date: NaiveDate,
    #[serde(with = "time_of_day")]
    pub time: NaiveTime,
    pub recurs_weekly: bool,
    pub meeting_link: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}

impl From<LiveSession> for LiveSessionResponse {
    fn from(session: LiveSession) -> Self {
        LiveSessionResponse {
            id: session.id,
            topic: session.topic,
            batch: session.batch,
            date: session.date,
            time: session.time,
            recurs_weekly: session.recurs_weekly,
            meeting_link: session.meeting_link,
            status: session.status,
            created_at: session.created_at,
        }
    }
}

/// Request to schedule a live session
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateLiveSessionRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Topic must be between 1 and 200 characters"
    ))]
    pub topic: String,

    #[validate(length(
        min = 1,
        max = 100,
        message = "Batch must be between 1 and 100 characters"
    ))]
    pub batch: String,

    pub date: NaiveDate,

    /// Time of day, "HH:MM" or "HH:MM:SS"
    pub time: NaiveTime,

    #[serde(default)]
    pub recurs_weekly: bool,

    #[validate(url(message = "meeting_link must be a valid URL"))]
    pub meeting_link: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusRequest {
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaterializeRequest {
    pub weeks_ahead: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweepQuery {
    /// Reference instant for the sweep; defaults to the current time
    pub now: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListLiveSessionsQuery {
    pub batch: String,
    pub from: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    /// Due recurring sessions found by the scan
    pub scanned: usize,
    /// Distinct (topic, batch, weekday) slots advanced
    pub series: usize,
    pub created: Vec<LiveSessionResponse>,
}
