use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::{
    error::ServiceError,
    extractors::AppJson,
    models::live_session::{
        CreateLiveSessionRequest, LiveSessionResponse, MaterializeRequest, SweepQuery,
        SweepReport, UpdateStatusRequest,
    },
    services::{
        live_session_service::LiveSessionService, recurrence_service::RecurrenceService, AppState,
    },
};

fn recurrence_service(state: &AppState) -> RecurrenceService {
    RecurrenceService::new(state.store.clone(), state.config.recurrence)
}

/// POST /admin/live-sessions
pub async fn create_live_session(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<CreateLiveSessionRequest>,
) -> Result<(StatusCode, Json<LiveSessionResponse>), ServiceError> {
    let session = LiveSessionService::new(state.store.clone())
        .create_session(req)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// PUT /admin/live-sessions/{id}/status
pub async fn update_live_session_status(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    AppJson(req): AppJson<UpdateStatusRequest>,
) -> Result<Json<LiveSessionResponse>, ServiceError> {
    let session = LiveSessionService::new(state.store.clone())
        .update_status(&session_id, req.status)
        .await?;
    Ok(Json(session))
}

/// POST /admin/live-sessions/{id}/recurrences - returns only the newly created sessions
pub async fn materialize_recurrences(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    AppJson(req): AppJson<MaterializeRequest>,
) -> Result<Json<Vec<LiveSessionResponse>>, ServiceError> {
    let created = recurrence_service(&state)
        .materialize_by_id(&session_id, req.weeks_ahead)
        .await?;
    Ok(Json(created.into_iter().map(Into::into).collect()))
}

/// POST /admin/live-sessions/sweep?now=
pub async fn sweep_recurrences(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SweepQuery>,
) -> Result<Json<SweepReport>, ServiceError> {
    let now = query.now.unwrap_or_else(Utc::now);
    let report = recurrence_service(&state)
        .advance_due_recurrences(now)
        .await?;
    Ok(Json(report))
}
