use chrono::Utc;

use crate::error::{ServiceError, ServiceResult};
use crate::metrics::PROGRESS_UPDATES_TOTAL;
use crate::models::course::Course;
use crate::models::progress::{completion_percentage, Progress, ProgressView};
use crate::models::require_id;
use crate::store::Store;

pub struct ProgressService {
    store: Store,
}

impl ProgressService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Current completion of a course, always recomputed against its present items.
    pub async fn compute_percentage(&self, user_id: &str, course_id: &str) -> ServiceResult<u8> {
        require_id("user_id", user_id)?;
        require_id("course_id", course_id)?;

        let course = self.load_course(course_id).await?;
        let progress = self.store.progress.find_progress(user_id, course_id).await?;

        Ok(match progress {
            Some(progress) => completion_percentage(&course.item_ids(), &progress.completed_item_ids),
            None => 0,
        })
    }

    /// Marks or un-marks one item and persists the set together with its percentage.
    ///
    /// Repeating the same call leaves the record unchanged apart from `updated_at`.
    pub async fn toggle_completion(
        &self,
        user_id: &str,
        course_id: &str,
        item_id: &str,
        completed: bool,
    ) -> ServiceResult<Progress> {
        require_id("user_id", user_id)?;
        require_id("course_id", course_id)?;
        require_id("item_id", item_id)?;

        let course = self.load_course(course_id).await?;
        let valid_items = course.item_ids();
        let is_course_item = valid_items.contains(item_id);

        if completed && !is_course_item {
            return Err(ServiceError::InvalidArgument(format!(
                "item {} is not part of course {}",
                item_id, course_id
            )));
        }

        let now = Utc::now();
        let mut progress = self
            .store
            .progress
            .find_progress(user_id, course_id)
            .await?
            .unwrap_or_else(|| Progress::new(user_id, course_id, now));

        if completed {
            progress.completed_item_ids.insert(item_id.to_string());
        } else {
            progress.completed_item_ids.remove(item_id);
        }

        if is_course_item {
            progress.last_watched_item_id = Some(item_id.to_string());
        }
        progress.percentage = completion_percentage(&valid_items, &progress.completed_item_ids);
        progress.updated_at = now;

        self.store.progress.save_progress(&progress).await?;

        let action = if completed { "complete" } else { "uncomplete" };
        PROGRESS_UPDATES_TOTAL.with_label_values(&[action]).inc();
        tracing::debug!(
            user_id,
            course_id,
            item_id,
            percentage = progress.percentage,
            "Progress updated"
        );

        Ok(progress)
    }

    pub async fn get_progress(&self, user_id: &str, course_id: &str) -> ServiceResult<ProgressView> {
        require_id("user_id", user_id)?;
        require_id("course_id", course_id)?;

        let course = self.load_course(course_id).await?;
        let Some(progress) = self.store.progress.find_progress(user_id, course_id).await? else {
            return Ok(ProgressView::empty(course_id));
        };

        Ok(ProgressView {
            course_id: course_id.to_string(),
            percentage: completion_percentage(&course.item_ids(), &progress.completed_item_ids),
            completed_item_ids: progress.completed_item_ids.into_iter().collect(),
            last_watched_item_id: progress.last_watched_item_id,
        })
    }

    async fn load_course(&self, course_id: &str) -> ServiceResult<Course> {
        self.store
            .courses
            .find_course(course_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("course {}", course_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{memory_store, seed_course};

    #[tokio::test]
    async fn completion_walks_through_thirds() {
        let (_, store) = memory_store();
        seed_course(&store, "c1", &["i1", "i2", "i3"]).await;
        let service = ProgressService::new(store);

        let p = service.toggle_completion("u1", "c1", "i1", true).await.unwrap();
        assert_eq!(p.percentage, 33);
        let p = service.toggle_completion("u1", "c1", "i2", true).await.unwrap();
        assert_eq!(p.percentage, 67);
        let p = service.toggle_completion("u1", "c1", "i1", false).await.unwrap();
        assert_eq!(p.percentage, 33);
        assert_eq!(p.last_watched_item_id.as_deref(), Some("i1"));

        assert_eq!(service.compute_percentage("u1", "c1").await.unwrap(), 33);
    }

    #[tokio::test]
    async fn toggling_twice_is_idempotent() {
        let (_, store) = memory_store();
        seed_course(&store, "c1", &["i1", "i2"]).await;
        let service = ProgressService::new(store);

        let first = service.toggle_completion("u1", "c1", "i1", true).await.unwrap();
        let second = service.toggle_completion("u1", "c1", "i1", true).await.unwrap();

        assert_eq!(first.completed_item_ids, second.completed_item_ids);
        assert_eq!(second.completed_item_ids.len(), 1);
        assert_eq!(second.percentage, 50);
    }

    #[tokio::test]
    async fn removed_item_drops_out_of_percentage() {
        let (_, store) = memory_store();
        seed_course(&store, "c1", &["i1", "i2", "i3"]).await;
        let service = ProgressService::new(store.clone());

        service.toggle_completion("u1", "c1", "i2", true).await.unwrap();
        assert!(store.courses.pull_item("c1", "i2").await.unwrap());

        assert_eq!(service.compute_percentage("u1", "c1").await.unwrap(), 0);

        service.toggle_completion("u1", "c1", "i1", true).await.unwrap();
        let view = service.get_progress("u1", "c1").await.unwrap();
        assert_eq!(view.percentage, 50);
        // the stale id stays stored but no longer counts
        assert_eq!(view.completed_item_ids, vec!["i1".to_string(), "i2".to_string()]);
    }

    #[tokio::test]
    async fn stale_completion_can_be_cleared() {
        let (_, store) = memory_store();
        seed_course(&store, "c1", &["i1", "i2"]).await;
        let service = ProgressService::new(store.clone());

        service.toggle_completion("u1", "c1", "i2", true).await.unwrap();
        store.courses.pull_item("c1", "i2").await.unwrap();

        let p = service.toggle_completion("u1", "c1", "i2", false).await.unwrap();
        assert!(p.completed_item_ids.is_empty());
        assert_eq!(p.last_watched_item_id.as_deref(), Some("i2"));
    }

    #[tokio::test]
    async fn course_without_items_is_zero() {
        let (_, store) = memory_store();
        seed_course(&store, "empty", &[]).await;
        let service = ProgressService::new(store);

        assert_eq!(service.compute_percentage("u1", "empty").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn absent_record_reads_as_empty() {
        let (_, store) = memory_store();
        seed_course(&store, "c1", &["i1"]).await;
        let service = ProgressService::new(store);

        let view = service.get_progress("u1", "c1").await.unwrap();
        assert_eq!(view, ProgressView::empty("c1"));
    }

    #[tokio::test]
    async fn rejects_bad_input_without_writing() {
        let (_, store) = memory_store();
        seed_course(&store, "c1", &["i1"]).await;
        let service = ProgressService::new(store.clone());

        assert!(matches!(
            service.toggle_completion("u1", "missing", "i1", true).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.toggle_completion("", "c1", "i1", true).await,
            Err(ServiceError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.toggle_completion("u1", "c1", "nope", true).await,
            Err(ServiceError::InvalidArgument(_))
        ));

        assert!(store.progress.find_progress("u1", "c1").await.unwrap().is_none());
    }
}
