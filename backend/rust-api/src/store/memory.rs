use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::{
    CourseStore, LeaderboardStore, LiveSessionStore, ProgressStore, StoreError, StoreLifecycle,
    StoreResult,
};
use crate::models::{
    course::{Course, Item, Section},
    leaderboard::LeaderboardEntry,
    live_session::{LiveSession, SessionStatus},
    progress::Progress,
};

type SeriesKey = (String, String, NaiveDate);

#[derive(Default)]
struct SessionTable {
    by_id: HashMap<String, LiveSession>,
    occurrences: HashSet<SeriesKey>,
}

/// In-memory backend for tests and local development.
///
/// Each collection sits behind its own mutex; guards are never held across an `.await`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    courses: Arc<Mutex<HashMap<String, Course>>>,
    progress: Arc<Mutex<HashMap<(String, String), Progress>>>,
    sessions: Arc<Mutex<SessionTable>>,
    leaderboard: Arc<Mutex<HashMap<String, LeaderboardEntry>>>,
    closed: Arc<AtomicBool>,
    write_budget: Arc<Mutex<Option<usize>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets the next `writes` writes succeed and fails every write after them with a
    /// connection error. Used to exercise partial failures.
    pub fn fail_writes_after(&self, writes: usize) {
        if let Ok(mut budget) = self.write_budget.lock() {
            *budget = Some(writes);
        }
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn begin_write(&self) -> StoreResult<()> {
        self.ensure_open()?;
        let mut budget = lock(&self.write_budget)?;
        match budget.as_mut() {
            Some(0) => Err(StoreError::Connection("simulated write failure".to_string())),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> StoreResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| StoreError::Connection(e.to_string()))
}

fn series_key(session: &LiveSession) -> SeriesKey {
    (session.topic.clone(), session.batch.clone(), session.date)
}

#[async_trait]
impl CourseStore for MemoryStore {
    async fn insert_course(&self, course: &Course) -> StoreResult<()> {
        self.begin_write()?;
        let mut courses = lock(&self.courses)?;
        if courses.contains_key(&course.id) {
            return Err(StoreError::DuplicateKey(format!("course {}", course.id)));
        }
        courses.insert(course.id.clone(), course.clone());
        Ok(())
    }

    async fn find_course(&self, course_id: &str) -> StoreResult<Option<Course>> {
        self.ensure_open()?;
        Ok(lock(&self.courses)?.get(course_id).cloned())
    }

    async fn list_courses(&self) -> StoreResult<Vec<Course>> {
        self.ensure_open()?;
        let mut courses: Vec<Course> = lock(&self.courses)?.values().cloned().collect();
        courses.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(courses)
    }

    async fn push_section(&self, course_id: &str, section: &Section) -> StoreResult<bool> {
        self.begin_write()?;
        let mut courses = lock(&self.courses)?;
        match courses.get_mut(course_id) {
            Some(course) => {
                course.sections.push(section.clone());
                course.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn push_item(
        &self,
        course_id: &str,
        section_id: &str,
        item: &Item,
    ) -> StoreResult<bool> {
        self.begin_write()?;
        let mut courses = lock(&self.courses)?;
        let Some(course) = courses.get_mut(course_id) else {
            return Ok(false);
        };
        match course.sections.iter_mut().find(|s| s.id == section_id) {
            Some(section) => {
                section.items.push(item.clone());
                course.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn pull_item(&self, course_id: &str, item_id: &str) -> StoreResult<bool> {
        self.begin_write()?;
        let mut courses = lock(&self.courses)?;
        let Some(course) = courses.get_mut(course_id) else {
            return Ok(false);
        };
        let mut removed = false;
        for section in course.sections.iter_mut() {
            let before = section.items.len();
            section.items.retain(|item| item.id != item_id);
            removed |= section.items.len() != before;
        }
        if removed {
            course.updated_at = Utc::now();
        }
        Ok(removed)
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn find_progress(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> StoreResult<Option<Progress>> {
        self.ensure_open()?;
        let key = (user_id.to_string(), course_id.to_string());
        Ok(lock(&self.progress)?.get(&key).cloned())
    }

    async fn save_progress(&self, progress: &Progress) -> StoreResult<()> {
        self.begin_write()?;
        let key = (progress.user_id.clone(), progress.course_id.clone());
        lock(&self.progress)?.insert(key, progress.clone());
        Ok(())
    }
}

#[async_trait]
impl LiveSessionStore for MemoryStore {
    async fn find_session(&self, session_id: &str) -> StoreResult<Option<LiveSession>> {
        self.ensure_open()?;
        Ok(lock(&self.sessions)?.by_id.get(session_id).cloned())
    }

    async fn occurrence_exists(
        &self,
        topic: &str,
        batch: &str,
        date: NaiveDate,
    ) -> StoreResult<bool> {
        self.ensure_open()?;
        let key = (topic.to_string(), batch.to_string(), date);
        Ok(lock(&self.sessions)?.occurrences.contains(&key))
    }

    async fn insert_session(&self, session: &LiveSession) -> StoreResult<()> {
        self.begin_write()?;
        let mut table = lock(&self.sessions)?;
        let key = series_key(session);
        if table.occurrences.contains(&key) {
            return Err(StoreError::DuplicateKey(format!(
                "live session {} / {} on {}",
                session.topic, session.batch, session.date
            )));
        }
        if table.by_id.contains_key(&session.id) {
            return Err(StoreError::DuplicateKey(format!("live session {}", session.id)));
        }
        table.occurrences.insert(key);
        table.by_id.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn find_due_recurring(&self, date: NaiveDate) -> StoreResult<Vec<LiveSession>> {
        self.ensure_open()?;
        let mut due: Vec<LiveSession> = lock(&self.sessions)?
            .by_id
            .values()
            .filter(|s| s.recurs_weekly && s.date <= date)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(due)
    }

    async fn list_sessions(
        &self,
        batch: &str,
        from: Option<NaiveDate>,
    ) -> StoreResult<Vec<LiveSession>> {
        self.ensure_open()?;
        let mut sessions: Vec<LiveSession> = lock(&self.sessions)?
            .by_id
            .values()
            .filter(|s| s.batch == batch && from.map_or(true, |from| s.date >= from))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.time.cmp(&b.time))
                .then_with(|| a.topic.cmp(&b.topic))
        });
        Ok(sessions)
    }

    async fn set_status(&self, session_id: &str, status: SessionStatus) -> StoreResult<bool> {
        self.begin_write()?;
        match lock(&self.sessions)?.by_id.get_mut(session_id) {
            Some(session) => {
                session.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl LeaderboardStore for MemoryStore {
    async fn increment(
        &self,
        user_id: &str,
        batch: &str,
        points: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<LeaderboardEntry> {
        self.begin_write()?;
        let mut board = lock(&self.leaderboard)?;
        let (current_points, current_tasks) = board
            .get(user_id)
            .map_or((0, 0), |entry| (entry.points, entry.tasks_completed));
        let (Some(new_points), Some(new_tasks)) = (
            current_points.checked_add(points),
            current_tasks.checked_add(1),
        ) else {
            return Err(StoreError::Overflow(format!(
                "leaderboard entry {} cannot add {} points",
                user_id, points
            )));
        };

        let entry = board
            .entry(user_id.to_string())
            .or_insert_with(|| LeaderboardEntry {
                user_id: user_id.to_string(),
                batch: batch.to_string(),
                points: 0,
                tasks_completed: 0,
                last_updated: at,
            });
        entry.points = new_points;
        entry.tasks_completed = new_tasks;
        entry.batch = batch.to_string();
        entry.last_updated = at;
        Ok(entry.clone())
    }

    async fn find_entry(&self, user_id: &str) -> StoreResult<Option<LeaderboardEntry>> {
        self.ensure_open()?;
        Ok(lock(&self.leaderboard)?.get(user_id).cloned())
    }

    async fn list_entries(&self, batch: Option<&str>) -> StoreResult<Vec<LeaderboardEntry>> {
        self.ensure_open()?;
        Ok(lock(&self.leaderboard)?
            .values()
            .filter(|e| batch.map_or(true, |batch| e.batch == batch))
            .cloned()
            .collect())
    }

    async fn reset_all(&self) -> StoreResult<u64> {
        self.begin_write()?;
        let mut board = lock(&self.leaderboard)?;
        for entry in board.values_mut() {
            entry.points = 0;
            entry.tasks_completed = 0;
        }
        Ok(board.len() as u64)
    }
}

#[async_trait]
impl StoreLifecycle for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        self.ensure_open()
    }

    async fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn session(id: &str, date: NaiveDate) -> LiveSession {
        LiveSession {
            id: id.to_string(),
            topic: "Traits".to_string(),
            batch: "b1".to_string(),
            date,
            time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            recurs_weekly: true,
            meeting_link: "https://meet.example.com/x".to_string(),
            status: SessionStatus::Scheduled,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn rejects_second_occurrence_of_same_series_date() {
        let store = MemoryStore::new();
        let date = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();
        store.insert_session(&session("s1", date)).await.unwrap();

        let err = store.insert_session(&session("s2", date)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(_)));
        assert!(store.occurrence_exists("Traits", "b1", date).await.unwrap());
        assert!(store.find_session("s2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn closed_store_rejects_calls() {
        let store = MemoryStore::new();
        store.close().await.unwrap();
        assert!(matches!(store.ping().await, Err(StoreError::Closed)));
        assert!(matches!(
            store.find_course("c1").await,
            Err(StoreError::Closed)
        ));
    }

    #[tokio::test]
    async fn write_budget_fails_later_writes() {
        let store = MemoryStore::new();
        store.fail_writes_after(1);
        let now = Utc::now();
        store.increment("u1", "b1", 5, now).await.unwrap();
        let err = store.increment("u1", "b1", 5, now).await.unwrap_err();
        assert!(matches!(err, StoreError::Connection(_)));
        assert_eq!(store.find_entry("u1").await.unwrap().unwrap().points, 5);
    }

    #[tokio::test]
    async fn reset_keeps_rows() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.increment("u1", "b1", 10, now).await.unwrap();
        store.increment("u2", "b2", 20, now).await.unwrap();

        assert_eq!(store.reset_all().await.unwrap(), 2);
        let entries = store.list_entries(None).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.points == 0 && e.tasks_completed == 0));
    }
}
