use crate::config::Config;
use crate::store::Store;

pub struct AppState {
    pub config: Config,
    pub store: Store,
}

impl AppState {
    pub fn new(config: Config, store: Store) -> Self {
        tracing::info!(backend = store.backend_name(), "Application state ready");
        Self { config, store }
    }
}

pub mod course_service;
pub mod leaderboard_service;
pub mod live_session_service;
pub mod progress_service;
pub mod recurrence_service;
pub mod recurrence_worker;

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;

    use crate::models::course::{Course, Item, Section};
    use crate::store::{MemoryStore, Store};

    pub fn memory_store() -> (MemoryStore, Store) {
        let backend = MemoryStore::new();
        let store = Store::from_backend(backend.clone());
        (backend, store)
    }

    /// Course with one section holding the given item ids.
    pub async fn seed_course(store: &Store, course_id: &str, item_ids: &[&str]) {
        let mut course = Course::new(course_id.to_string(), "Rust 101".to_string(), Utc::now());
        course.sections.push(Section {
            id: "s1".to_string(),
            title: "Basics".to_string(),
            items: item_ids
                .iter()
                .map(|id| Item {
                    id: id.to_string(),
                    title: format!("Video {}", id),
                    media_url: format!("https://cdn.example.com/{}.mp4", id),
                    duration_seconds: 300,
                })
                .collect(),
        });
        store.courses.insert_course(&course).await.unwrap();
    }
}
