use anyhow::Context;
use std::sync::Arc;

use learnhub_api::{
    config::Config,
    create_router,
    services::AppState,
    store::Store,
    telemetry::{init_tracing, shutdown_signal},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let telemetry = init_tracing("learnhub-api")?;

    tracing::info!("Starting LearnHub API");

    let config = Config::load().context("Failed to load configuration")?;
    tracing::info!(
        "Configuration loaded for environment: {:?}",
        std::env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string())
    );

    let store = Store::open(&config.store)
        .await
        .context("Failed to open document store")?;
    tracing::info!("{} store connected", store.backend_name());

    let bind_addr = config.bind_addr.clone();
    let app_state = Arc::new(AppState::new(config, store.clone()));
    let app = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Err(e) = store.close().await {
        tracing::warn!(error = %e, "Failed to close store cleanly");
    }
    telemetry.shutdown();

    Ok(())
}
