use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    config::RecurrenceSettings,
    metrics::RECURRENCE_SWEEP_TICKS_TOTAL,
    models::live_session::SweepReport,
    services::recurrence_service::RecurrenceService,
    store::Store,
    utils::retry::{retry_with_backoff, RetryConfig},
};

/// Periodically advances weekly live-session series.
pub struct RecurrenceWorker {
    service: RecurrenceService,
    interval: Duration,
    retry: RetryConfig,
}

impl RecurrenceWorker {
    pub fn new(store: Store, settings: RecurrenceSettings) -> Self {
        Self {
            service: RecurrenceService::new(store, settings),
            interval: Duration::from_secs(settings.worker_interval_secs.max(1)),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Runs sweeps until `shutdown` resolves. A failed tick is logged and retried on the
    /// next interval.
    pub async fn run<S>(&self, shutdown: S) -> Result<()>
    where
        S: std::future::Future<Output = ()>,
    {
        info!(
            "Starting recurrence worker loop (interval {}s)",
            self.interval.as_secs()
        );
        tokio::pin!(shutdown);

        loop {
            match self.run_once().await {
                Ok(report) => info!(
                    created = report.created.len(),
                    series = report.series,
                    "Recurrence worker tick completed"
                ),
                Err(err) => warn!(error = %err, "Recurrence worker tick failed"),
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Recurrence worker stopping");
                    return Ok(());
                }
                _ = sleep(self.interval) => {}
            }
        }
    }

    /// One sweep at the current time, retried with backoff on failure.
    pub async fn run_once(&self) -> Result<SweepReport> {
        let result = retry_with_backoff("recurrence_sweep", self.retry.clone(), || {
            self.service.advance_due_recurrences(Utc::now())
        })
        .await;

        let status = if result.is_ok() { "success" } else { "error" };
        RECURRENCE_SWEEP_TICKS_TOTAL
            .with_label_values(&[status])
            .inc();

        Ok(result?)
    }
}
