use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::{
    error::ServiceError,
    models::live_session::{ListLiveSessionsQuery, LiveSessionResponse},
    services::{live_session_service::LiveSessionService, AppState},
};

/// GET /api/v1/live-sessions?batch=&from=
pub async fn list_live_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListLiveSessionsQuery>,
) -> Result<Json<Vec<LiveSessionResponse>>, ServiceError> {
    let sessions = LiveSessionService::new(state.store.clone())
        .list_sessions(&query.batch, query.from)
        .await?;
    Ok(Json(sessions))
}
