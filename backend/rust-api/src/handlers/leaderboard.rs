use axum::{
    extract::{Extension, Query, State},
    Json,
};
use std::sync::Arc;

use crate::{
    error::ServiceError,
    middlewares::auth::JwtClaims,
    models::leaderboard::{RankQuery, RankView, StandingEntry, StandingsQuery},
    services::{leaderboard_service::LeaderboardService, AppState},
};

fn service(state: &AppState) -> LeaderboardService {
    LeaderboardService::new(state.store.clone(), state.config.leaderboard)
}

/// GET /api/v1/leaderboard/rank?user_id=&batch=
///
/// Without `user_id` the caller's own rank is returned.
pub async fn get_rank(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<RankQuery>,
) -> Result<Json<RankView>, ServiceError> {
    let user_id = query.user_id.as_deref().unwrap_or(&claims.sub);
    let view = service(&state)
        .rank(user_id, query.batch.as_deref())
        .await?;
    Ok(Json(view))
}

/// GET /api/v1/leaderboard?batch=&limit=
pub async fn get_standings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StandingsQuery>,
) -> Result<Json<Vec<StandingEntry>>, ServiceError> {
    let standings = service(&state)
        .standings(query.batch.as_deref(), query.limit)
        .await?;
    Ok(Json(standings))
}
