use std::fmt::Display;
use std::time::Duration;

/// Backoff schedule for process-edge retries (worker startup, sweep ticks).
/// Services never retry on their own.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
            jitter_max: Some(Duration::from_millis(100)),
        }
    }
}

impl RetryConfig {
    /// Longer schedule for startup, when the store may still be coming up.
    pub fn startup() -> Self {
        Self {
            max_attempts: 7,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            jitter_max: Some(Duration::from_millis(250)),
        }
    }

    fn delay_for(&self, backoff: Duration) -> Duration {
        match self.jitter_max {
            Some(jitter_max) if !jitter_max.is_zero() => {
                let jitter_ms = jitter_max.as_millis() as u64;
                backoff + Duration::from_millis(rand::random::<u64>() % (jitter_ms + 1))
            }
            _ => backoff,
        }
    }
}

/// Runs `f` until it succeeds or `max_attempts` is exhausted, sleeping with exponential
/// backoff between attempts. Returns the last error.
pub async fn retry_with_backoff<F, Fut, T, E>(
    operation: &str,
    config: RetryConfig,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;
    let mut backoff = config.base_backoff;

    loop {
        attempt += 1;
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= config.max_attempts => {
                tracing::error!(%operation, attempt, error = %err, "Giving up after retries");
                return Err(err);
            }
            Err(err) => {
                let wait = config.delay_for(backoff);
                tracing::warn!(
                    %operation,
                    attempt,
                    error = %err,
                    "Attempt failed, retrying in {:?}",
                    wait
                );
                tokio::time::sleep(wait).await;
                backoff = std::cmp::min(backoff * 2, config.max_backoff);
            }
        }
    }
}
