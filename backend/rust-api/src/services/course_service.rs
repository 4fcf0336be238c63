use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ServiceError, ServiceResult};
use crate::models::course::{
    AddItemRequest, AddSectionRequest, Course, CourseResponse, CreateCourseRequest, Item, Section,
};
use crate::models::require_id;
use crate::store::Store;

pub struct CourseService {
    store: Store,
}

impl CourseService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn create_course(&self, req: CreateCourseRequest) -> ServiceResult<CourseResponse> {
        req.validate()?;

        let course = Course::new(Uuid::new_v4().to_string(), req.title, Utc::now());
        self.store.courses.insert_course(&course).await?;

        tracing::info!(course_id = %course.id, "Course created");
        Ok(course.into())
    }

    pub async fn get_course(&self, course_id: &str) -> ServiceResult<CourseResponse> {
        require_id("course_id", course_id)?;
        self.load(course_id).await.map(CourseResponse::from)
    }

    pub async fn list_courses(&self) -> ServiceResult<Vec<CourseResponse>> {
        let courses = self.store.courses.list_courses().await?;
        Ok(courses.into_iter().map(CourseResponse::from).collect())
    }

    /// Appends a new empty section to the course.
    pub async fn add_section(
        &self,
        course_id: &str,
        req: AddSectionRequest,
    ) -> ServiceResult<CourseResponse> {
        require_id("course_id", course_id)?;
        req.validate()?;

        let section = Section {
            id: Uuid::new_v4().to_string(),
            title: req.title,
            items: Vec::new(),
        };
        if !self.store.courses.push_section(course_id, &section).await? {
            return Err(ServiceError::NotFound(format!("course {}", course_id)));
        }

        tracing::info!(course_id, section_id = %section.id, "Section added");
        self.get_course(course_id).await
    }

    /// Appends an item to a section; the item id is generated here.
    pub async fn add_item(
        &self,
        course_id: &str,
        section_id: &str,
        req: AddItemRequest,
    ) -> ServiceResult<CourseResponse> {
        require_id("course_id", course_id)?;
        require_id("section_id", section_id)?;
        req.validate()?;

        let item = Item {
            id: Uuid::new_v4().to_string(),
            title: req.title,
            media_url: req.media_url,
            duration_seconds: req.duration_seconds,
        };
        if !self
            .store
            .courses
            .push_item(course_id, section_id, &item)
            .await?
        {
            // Distinguish a missing course from a missing section for the caller.
            let course = self.load(course_id).await?;
            if !course.has_section(section_id) {
                return Err(ServiceError::NotFound(format!("section {}", section_id)));
            }
            return Err(ServiceError::Conflict(format!(
                "section {} changed while adding an item",
                section_id
            )));
        }

        tracing::info!(course_id, section_id, item_id = %item.id, "Item added");
        self.get_course(course_id).await
    }

    /// Removes an item from whichever section holds it. Progress records keep the id;
    /// it simply stops counting towards completion.
    pub async fn remove_item(&self, course_id: &str, item_id: &str) -> ServiceResult<CourseResponse> {
        require_id("course_id", course_id)?;
        require_id("item_id", item_id)?;

        let course = self.load(course_id).await?;
        if !course.item_ids().contains(item_id) {
            return Err(ServiceError::NotFound(format!("item {}", item_id)));
        }
        self.store.courses.pull_item(course_id, item_id).await?;

        tracing::info!(course_id, item_id, "Item removed");
        self.get_course(course_id).await
    }

    async fn load(&self, course_id: &str) -> ServiceResult<Course> {
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
    use crate::services::test_support::memory_store;

    fn item_request(title: &str) -> AddItemRequest {
        AddItemRequest {
            title: title.to_string(),
            media_url: "https://cdn.example.com/v.mp4".to_string(),
            duration_seconds: 120,
        }
    }

    #[tokio::test]
    async fn builds_course_tree() {
        let (_, store) = memory_store();
        let service = CourseService::new(store);

        let course = service
            .create_course(CreateCourseRequest {
                title: "Ownership".to_string(),
            })
            .await
            .unwrap();
        let course = service
            .add_section(
                &course.id,
                AddSectionRequest {
                    title: "Borrowing".to_string(),
                },
            )
            .await
            .unwrap();
        let section_id = course.sections[0].id.clone();

        service
            .add_item(&course.id, &section_id, item_request("Intro"))
            .await
            .unwrap();
        let course = service
            .add_item(&course.id, &section_id, item_request("Lifetimes"))
            .await
            .unwrap();

        let titles: Vec<&str> = course.sections[0]
            .items
            .iter()
            .map(|i| i.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Intro", "Lifetimes"]);
        assert_eq!(service.list_courses().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_parents_are_not_found() {
        let (_, store) = memory_store();
        let service = CourseService::new(store);
        let course = service
            .create_course(CreateCourseRequest {
                title: "Traits".to_string(),
            })
            .await
            .unwrap();

        assert!(matches!(
            service
                .add_section("nope", AddSectionRequest { title: "x".to_string() })
                .await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.add_item(&course.id, "nope", item_request("x")).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.remove_item(&course.id, "nope").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn remove_item_drops_it_from_the_tree() {
        let (_, store) = memory_store();
        let service = CourseService::new(store);
        let course = service
            .create_course(CreateCourseRequest {
                title: "Async".to_string(),
            })
            .await
            .unwrap();
        let course = service
            .add_section(&course.id, AddSectionRequest { title: "Futures".to_string() })
            .await
            .unwrap();
        let course = service
            .add_item(&course.id, &course.sections[0].id, item_request("Poll"))
            .await
            .unwrap();
        let item_id = course.sections[0].items[0].id.clone();

        let course = service.remove_item(&course.id, &item_id).await.unwrap();
        assert!(course.sections[0].items.is_empty());
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected() {
        let (_, store) = memory_store();
        let service = CourseService::new(store);

        assert!(matches!(
            service
                .create_course(CreateCourseRequest { title: String::new() })
                .await,
            Err(ServiceError::InvalidArgument(_))
        ));

        let course = service
            .create_course(CreateCourseRequest {
                title: "Macros".to_string(),
            })
            .await
            .unwrap();
        let course = service
            .add_section(&course.id, AddSectionRequest { title: "decl".to_string() })
            .await
            .unwrap();
        let bad = AddItemRequest {
            media_url: "not a url".to_string(),
            ..item_request("x")
        };
        assert!(matches!(
            service.add_item(&course.id, &course.sections[0].id, bad).await,
            Err(ServiceError::InvalidArgument(_))
        ));
    }
}
