use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::bson_datetime_as_chrono;

/// Course model stored in MongoDB "courses" collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: String,

    pub title: String,

    /// Ordered sections; each owns an ordered list of items
    #[serde(default)]
    pub sections: Vec<Section>,

    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Section {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub items: Vec<Item>,
}

/// Leaf content unit (a video) a student marks complete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub media_url: String,
    pub duration_seconds: u32,
}

impl Course {
    pub fn new(id: String, title: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title,
            sections: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Every item id of the course, flattened across sections.
    pub fn item_ids(&self) -> HashSet<&str> {
        self.sections
            .iter()
            .flat_map(|section| section.items.iter())
            .map(|item| item.id.as_str())
            .collect()
    }

    pub fn item_count(&self) -> usize {
        self.sections.iter().map(|section| section.items.len()).sum()
    }

    pub fn has_section(&self, section_id: &str) -> bool {
        self.sections.iter().any(|section| section.id == section_id)
    }
}

/// Course response for the API (timestamps as RFC 3339)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseResponse {
    pub id: String,
    pub title: String,
    pub sections: Vec<Section>,
    pub item_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Course> for CourseResponse {
    fn from(course: Course) -> Self {
        let item_count = course.item_count();
        CourseResponse {
            id: course.id,
            title: course.title,
            sections: course.sections,
            item_count,
            created_at: course.created_at,
            updated_at: course.updated_at,
        }
    }
}

/// Request to create a course
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateCourseRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title must be between 1 and 200 characters"
    ))]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AddSectionRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title must be between 1 and 200 characters"
    ))]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AddItemRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title must be between 1 and 200 characters"
    ))]
    pub title: String,

    /// Signed URL handed out by the object store upload flow
    #[validate(url(message = "media_url must be a valid URL"))]
    pub media_url: String,

    #[validate(range(max = 86_400, message = "duration_seconds must not exceed one day"))]
    pub duration_seconds: u32,
}
