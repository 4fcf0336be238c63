use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    error::ServiceError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::course::{AddItemRequest, AddSectionRequest, CourseResponse, CreateCourseRequest},
    services::{course_service::CourseService, AppState},
};

/// POST /admin/courses
pub async fn create_course(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateCourseRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let course = CourseService::new(state.store.clone())
        .create_course(req)
        .await?;
    tracing::info!(admin = %claims.sub, course_id = %course.id, "Admin created course");
    Ok((StatusCode::CREATED, Json(course)))
}

/// POST /admin/courses/{id}/sections
pub async fn add_section(
    State(state): State<Arc<AppState>>,
    Path(course_id): Path<String>,
    AppJson(req): AppJson<AddSectionRequest>,
) -> Result<(StatusCode, Json<CourseResponse>), ServiceError> {
    let course = CourseService::new(state.store.clone())
        .add_section(&course_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(course)))
}

/// POST /admin/courses/{id}/sections/{section_id}/items
pub async fn add_item(
    State(state): State<Arc<AppState>>,
    Path((course_id, section_id)): Path<(String, String)>,
    AppJson(req): AppJson<AddItemRequest>,
) -> Result<(StatusCode, Json<CourseResponse>), ServiceError> {
    let course = CourseService::new(state.store.clone())
        .add_item(&course_id, &section_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(course)))
}

/// DELETE /admin/courses/{id}/items/{item_id}
pub async fn remove_item(
    State(state): State<Arc<AppState>>,
    Path((course_id, item_id)): Path<(String, String)>,
) -> Result<Json<CourseResponse>, ServiceError> {
    let course = CourseService::new(state.store.clone())
        .remove_item(&course_id, &item_id)
        .await?;
    Ok(Json(course))
}
