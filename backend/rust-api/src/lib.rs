use axum::{
    http::{header, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod store;
pub mod telemetry;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler).layer(middleware::from_fn_with_state(
                app_state.clone(),
                handlers::metrics_auth_middleware,
            )),
        )
        // Student-facing endpoints (require JWT)
        .nest(
            "/api/v1",
            api_routes()
                .layer(cors)
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        // Administrative endpoints (JWT with admin role)
        .nest(
            "/admin",
            admin_routes().layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .with_state(app_state)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/courses", get(handlers::courses::list_courses))
        .route("/courses/{id}", get(handlers::courses::get_course))
        .route(
            "/courses/{id}/progress",
            get(handlers::progress::get_progress).post(handlers::progress::toggle_progress),
        )
        .route("/leaderboard", get(handlers::leaderboard::get_standings))
        .route("/leaderboard/rank", get(handlers::leaderboard::get_rank))
        .route(
            "/live-sessions",
            get(handlers::live_sessions::list_live_sessions),
        )
}

fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Course catalog
        .route("/courses", post(handlers::admin::create_course))
        .route(
            "/courses/{id}/sections",
            post(handlers::admin::add_section),
        )
        .route(
            "/courses/{id}/sections/{section_id}/items",
            post(handlers::admin::add_item),
        )
        .route(
            "/courses/{id}/items/{item_id}",
            delete(handlers::admin::remove_item),
        )
        // Live sessions and recurrence
        .route(
            "/live-sessions",
            post(handlers::admin::create_live_session),
        )
        .route(
            "/live-sessions/sweep",
            post(handlers::admin::sweep_recurrences),
        )
        .route(
            "/live-sessions/{id}/status",
            put(handlers::admin::update_live_session_status),
        )
        .route(
            "/live-sessions/{id}/recurrences",
            post(handlers::admin::materialize_recurrences),
        )
        // Leaderboard
        .route(
            "/leaderboard/accumulate",
            post(handlers::admin::accumulate_points),
        )
        .route(
            "/leaderboard/reset",
            post(handlers::admin::reset_leaderboard),
        )
        .route_layer(middleware::from_fn(
            middlewares::auth::admin_guard_middleware,
        ))
}
