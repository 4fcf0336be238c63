//! Document-store access for the core entities.
//!
//! Every entity gets its own repository trait so services depend only on the operations
//! they issue. A [`Store`] bundles one implementation of each behind `Arc<dyn _>` and is
//! injected through `AppState`; nothing in the crate caches a process-wide connection.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::config::{StoreBackend, StoreConfig};
use crate::models::{
    course::{Course, Item, Section},
    leaderboard::LeaderboardEntry,
    live_session::{LiveSession, SessionStatus},
    progress::Progress,
};

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// A unique index rejected the write.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// A counter update would leave the `i64` range.
    #[error("counter overflow: {0}")]
    Overflow(String),

    #[error("store is closed")]
    Closed,
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CourseStore: Send + Sync {
    async fn insert_course(&self, course: &Course) -> StoreResult<()>;

    async fn find_course(&self, course_id: &str) -> StoreResult<Option<Course>>;

    async fn list_courses(&self) -> StoreResult<Vec<Course>>;

    /// Appends a section. Returns `false` when the course does not exist.
    async fn push_section(&self, course_id: &str, section: &Section) -> StoreResult<bool>;

    /// Appends an item to one section. Returns `false` when course or section is missing.
    async fn push_item(&self, course_id: &str, section_id: &str, item: &Item)
        -> StoreResult<bool>;

    /// Removes an item wherever it sits. Returns `false` when nothing matched.
    async fn pull_item(&self, course_id: &str, item_id: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn find_progress(&self, user_id: &str, course_id: &str)
        -> StoreResult<Option<Progress>>;

    /// Writes the whole record (set and percentage together), keyed by (user, course).
    async fn save_progress(&self, progress: &Progress) -> StoreResult<()>;
}

#[async_trait]
pub trait LiveSessionStore: Send + Sync {
    async fn find_session(&self, session_id: &str) -> StoreResult<Option<LiveSession>>;

    async fn occurrence_exists(&self, topic: &str, batch: &str, date: NaiveDate)
        -> StoreResult<bool>;

    /// Fails with [`StoreError::DuplicateKey`] when `(topic, batch, date)` is taken.
    async fn insert_session(&self, session: &LiveSession) -> StoreResult<()>;

    /// Recurring sessions dated on or before `date`, oldest first.
    async fn find_due_recurring(&self, date: NaiveDate) -> StoreResult<Vec<LiveSession>>;

    /// Sessions of a batch ordered by date then time.
    async fn list_sessions(&self, batch: &str, from: Option<NaiveDate>)
        -> StoreResult<Vec<LiveSession>>;

    /// Returns `false` when the session does not exist.
    async fn set_status(&self, session_id: &str, status: SessionStatus) -> StoreResult<bool>;
}

#[async_trait]
pub trait LeaderboardStore: Send + Sync {
    /// Adds `points` and one completed task in a single atomic write, creating the entry
    /// on first use.
    async fn increment(
        &self,
        user_id: &str,
        batch: &str,
        points: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<LeaderboardEntry>;

    async fn find_entry(&self, user_id: &str) -> StoreResult<Option<LeaderboardEntry>>;

    /// All entries, optionally restricted to a batch. Order is unspecified.
    async fn list_entries(&self, batch: Option<&str>) -> StoreResult<Vec<LeaderboardEntry>>;

    /// Zeroes points and task counts of every entry; returns how many entries exist.
    async fn reset_all(&self) -> StoreResult<u64>;
}

/// Connection lifecycle of a backend.
#[async_trait]
pub trait StoreLifecycle: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn ping(&self) -> StoreResult<()>;

    async fn close(&self) -> StoreResult<()>;
}

/// Injected handle to the document store.
#[derive(Clone)]
pub struct Store {
    pub courses: Arc<dyn CourseStore>,
    pub progress: Arc<dyn ProgressStore>,
    pub live_sessions: Arc<dyn LiveSessionStore>,
    pub leaderboard: Arc<dyn LeaderboardStore>,
    lifecycle: Arc<dyn StoreLifecycle>,
}

impl Store {
    /// Connects the configured backend.
    pub async fn open(config: &StoreConfig) -> StoreResult<Self> {
        match config.backend {
            StoreBackend::Mongo => {
                let mongo = MongoStore::connect(&config.mongo_uri, &config.mongo_database).await?;
                Ok(Self::from_backend(mongo))
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store; data is lost on restart");
                Ok(Self::from_backend(MemoryStore::new()))
            }
        }
    }

    pub fn from_backend<B>(backend: B) -> Self
    where
        B: CourseStore
            + ProgressStore
            + LiveSessionStore
            + LeaderboardStore
            + StoreLifecycle
            + Clone
            + 'static,
    {
        Self {
            courses: Arc::new(backend.clone()),
            progress: Arc::new(backend.clone()),
            live_sessions: Arc::new(backend.clone()),
            leaderboard: Arc::new(backend.clone()),
            lifecycle: Arc::new(backend),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.lifecycle.backend_name()
    }

    pub async fn ping(&self) -> StoreResult<()> {
        self.lifecycle.ping().await
    }

    /// Releases the backend's connections. Later calls fail with [`StoreError::Closed`]
    /// or a connection error.
    pub async fn close(&self) -> StoreResult<()> {
        tracing::info!("Closing {} store", self.backend_name());
        self.lifecycle.close().await
    }
}
