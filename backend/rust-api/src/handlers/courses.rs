use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::{
    error::ServiceError,
    models::course::CourseResponse,
    services::{course_service::CourseService, AppState},
};

/// GET /api/v1/courses
pub async fn list_courses(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CourseResponse>>, ServiceError> {
    let courses = CourseService::new(state.store.clone()).list_courses().await?;
    Ok(Json(courses))
}

/// GET /api/v1/courses/{id}
pub async fn get_course(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
) -> Result<Json<CourseResponse>, ServiceError> {
    let course = CourseService::new(state.store.clone())
        .get_course(&course_id)
        .await?;
    Ok(Json(course))
}
