use axum::{extract::State, Json};
use std::sync::Arc;

use crate::{
    error::ServiceError,
    extractors::AppJson,
    models::leaderboard::{AccumulateRequest, LeaderboardEntryResponse, ResetReport},
    services::{leaderboard_service::LeaderboardService, AppState},
};

/// POST /admin/leaderboard/accumulate
pub async fn accumulate_points(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<AccumulateRequest>,
) -> Result<Json<LeaderboardEntryResponse>, ServiceError> {
    let entry = LeaderboardService::new(state.store.clone(), state.config.leaderboard)
        .accumulate(&req.user_id, &req.batch, req.points_delta)
        .await?;
    Ok(Json(entry.into()))
}

/// POST /admin/leaderboard/reset
pub async fn reset_leaderboard(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResetReport>, ServiceError> {
    let report = LeaderboardService::new(state.store.clone(), state.config.leaderboard)
        .reset_all()
        .await?;
    Ok(Json(report))
}
