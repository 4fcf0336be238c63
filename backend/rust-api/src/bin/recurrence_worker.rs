use anyhow::Context;

use learnhub_api::{
    config::Config,
    services::recurrence_worker::RecurrenceWorker,
    store::Store,
    telemetry::{init_tracing, shutdown_signal},
    utils::retry::{retry_with_backoff, RetryConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let telemetry = init_tracing("learnhub-recurrence-worker")?;

    let config = Config::load().context("Failed to load configuration")?;

    let store = retry_with_backoff("open_store", RetryConfig::startup(), || {
        Store::open(&config.store)
    })
    .await
    .context("Failed to open document store")?;

    let worker = RecurrenceWorker::new(store.clone(), config.recurrence);
    worker.run(shutdown_signal()).await?;

    if let Err(e) = store.close().await {
        tracing::warn!(error = %e, "Failed to close store cleanly");
    }
    telemetry.shutdown();

    Ok(())
}
