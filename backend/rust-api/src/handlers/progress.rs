use axum::{
    extract::{Extension, Path, State},
    Json,
};
use std::sync::Arc;

use crate::{
    error::ServiceError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::progress::{ProgressView, ToggleProgressRequest},
    services::{progress_service::ProgressService, AppState},
};

/// GET /api/v1/courses/{course_id}/progress
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
) -> Result<Json<ProgressView>, ServiceError> {
    let service = ProgressService::new(state.store.clone());
    let view = service.get_progress(&claims.sub, &course_id).await?;
    Ok(Json(view))
}

/// POST /api/v1/courses/{course_id}/progress - mark or unmark one item
pub async fn toggle_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(course_id): Path<String>,
    AppJson(req): AppJson<ToggleProgressRequest>,
) -> Result<Json<ProgressView>, ServiceError> {
    let service = ProgressService::new(state.store.clone());
    let progress = service
        .toggle_completion(&claims.sub, &course_id, &req.item_id, req.completed)
        .await?;
    Ok(Json(progress.into()))
}
