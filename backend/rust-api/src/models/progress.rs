use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bson_datetime_as_chrono;

/// Per-(user, course) completion record stored in MongoDB "course_progress" collection.
///
/// `percentage` is derived from `completed_item_ids` and the course's current items on
/// every write; readers recompute it instead of trusting the stored value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Progress {
    pub user_id: String,
    pub course_id: String,
    #[serde(default)]
    pub completed_item_ids: BTreeSet<String>,
    #[serde(default)]
    pub last_watched_item_id: Option<String>,
    pub percentage: u8,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

impl Progress {
    pub fn new(user_id: &str, course_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
            completed_item_ids: BTreeSet::new(),
            last_watched_item_id: None,
            percentage: 0,
            updated_at: now,
        }
    }
}

/// `round(100 * |completed ∩ valid| / |valid|)`, or 0 for a course without items.
///
/// Completed ids that are no longer part of the course are ignored.
pub fn completion_percentage(valid_items: &HashSet<&str>, completed: &BTreeSet<String>) -> u8 {
    if valid_items.is_empty() {
        return 0;
    }

    let done = completed
        .iter()
        .filter(|id| valid_items.contains(id.as_str()))
        .count();

    let percentage = (100.0 * done as f64 / valid_items.len() as f64).round();
    percentage.clamp(0.0, 100.0) as u8
}

/// Body of `POST /api/v1/courses/{course_id}/progress`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleProgressRequest {
    pub item_id: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressView {
    pub course_id: String,
    pub percentage: u8,
    pub completed_item_ids: Vec<String>,
    pub last_watched_item_id: Option<String>,
}

impl ProgressView {
    pub fn empty(course_id: &str) -> Self {
        Self {
            course_id: course_id.to_string(),
            percentage: 0,
            completed_item_ids: Vec::new(),
            last_watched_item_id: None,
        }
    }
}

impl From<Progress> for ProgressView {
    fn from(progress: Progress) -> Self {
        Self {
            course_id: progress.course_id,
            percentage: progress.percentage,
            completed_item_ids: progress.completed_item_ids.into_iter().collect(),
            last_watched_item_id: progress.last_watched_item_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn percentage_rounds_to_nearest() {
        let valid: HashSet<&str> = ["a", "b", "c"].into_iter().collect();
        assert_eq!(completion_percentage(&valid, &completed(&["a"])), 33);
        assert_eq!(completion_percentage(&valid, &completed(&["a", "b"])), 67);
        assert_eq!(completion_percentage(&valid, &completed(&["a", "b", "c"])), 100);
    }

    #[test]
    fn percentage_is_zero_without_items_or_completions() {
        let none: HashSet<&str> = HashSet::new();
        assert_eq!(completion_percentage(&none, &completed(&["a"])), 0);

        let valid: HashSet<&str> = ["a", "b"].into_iter().collect();
        assert_eq!(completion_percentage(&valid, &BTreeSet::new()), 0);
    }

    #[test]
    fn stale_completions_do_not_count() {
        let valid: HashSet<&str> = ["a", "c"].into_iter().collect();
        assert_eq!(completion_percentage(&valid, &completed(&["b"])), 0);
        assert_eq!(completion_percentage(&valid, &completed(&["a", "b"])), 50);
        assert_eq!(
            completion_percentage(&valid, &completed(&["a", "b", "c", "zzz"])),
            100
        );
    }
}
