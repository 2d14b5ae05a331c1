use std::future::Future;
use std::time::Duration;

use tracing::warn;

use haulage_core::config::{RetryConfig, WorkflowConfig};
use haulage_core::error::{HaulageError, Result};

/// Timeout and retry policy wrapped around every external call an agent makes.
#[derive(Debug, Clone)]
pub struct CallEnvelope {
    timeout: Duration,
    retry: RetryConfig,
}

impl CallEnvelope {
    pub fn new(timeout: Duration, retry: RetryConfig) -> Self {
        Self { timeout, retry }
    }

    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self::new(
            Duration::from_secs(config.call_timeout_secs),
            config.retry.clone(),
        )
    }

    /// Single attempt, no backoff.
    pub fn no_retry(timeout: Duration) -> Self {
        Self::new(
            timeout,
            RetryConfig {
                max_retries: 0,
                initial_backoff_ms: 0,
                max_backoff_ms: 0,
            },
        )
    }

    /// Run `op` under the timeout, retrying retryable failures with
    /// exponential backoff. Returns the last error once attempts run out.
    pub async fn call<T, F, Fut>(&self, call: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_retries = self.retry.max_retries;
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(self.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(HaulageError::Timeout {
                    call: call.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    let backoff = calculate_backoff(attempt, &self.retry);
                    warn!(
                        call,
                        attempt = attempt + 1,
                        max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Retrying external call"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let ms = config
        .initial_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(config.max_backoff_ms);
    // Add jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}
