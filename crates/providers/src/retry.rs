//! Provider retry: bounded re-attempts with exponential backoff.
//!
//! Wraps a single provider. Transient failures (rate limits, 5xx, network,
//! per-attempt timeout) are retried; anything else returns immediately.
//! Exhausting the budget yields the last error.

use async_trait::async_trait;
use deskpilot_core::error::ProviderError;
use deskpilot_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A provider that re-issues failed requests against the same backend.
pub struct RetryingProvider {
    inner: Arc<dyn deskpilot_core::Provider>,
    max_retries: u32,
    initial_backoff: Duration,
    attempt_timeout: Duration,
}

impl RetryingProvider {
    /// Wrap `inner` with 4 retries, 500ms initial backoff and a 300s
    /// per-attempt timeout.
    pub fn new(inner: Arc<dyn deskpilot_core::Provider>) -> Self {
        Self {
            inner,
            max_retries: 4,
            initial_backoff: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(300),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Delay before retry number `retry` (0-based). A server-provided
    /// `retry-after` wins when it is longer.
    fn backoff(&self, retry: u32, error: &ProviderError) -> Duration {
        let exponential = self.initial_backoff.saturating_mul(2u32.saturating_pow(retry));
        match error {
            ProviderError::RateLimited { retry_after_secs } => {
                exponential.max(Duration::from_secs(*retry_after_secs))
            }
            _ => exponential,
        }
    }
}

#[async_trait]
impl deskpilot_core::Provider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut retry = 0;
        loop {
            let outcome =
                match tokio::time::timeout(self.attempt_timeout, self.inner.complete(request.clone()))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(format!(
                        "Provider '{}' timed out after {}s",
                        self.inner.name(),
                        self.attempt_timeout.as_secs()
                    ))),
                };

            let error = match outcome {
                Ok(response) => {
                    if retry > 0 {
                        debug!(provider = %self.inner.name(), retries = retry, "Retry: request succeeded");
                    }
                    return Ok(response);
                }
                Err(e) => e,
            };

            if !error.is_retryable() || retry >= self.max_retries {
                if retry > 0 {
                    warn!(
                        provider = %self.inner.name(),
                        retries = retry,
                        error = %error,
                        "Retry: giving up"
                    );
                }
                return Err(error);
            }

            let delay = self.backoff(retry, &error);
            warn!(
                provider = %self.inner.name(),
                attempt = retry + 1,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retry: transient failure, backing off"
            );
            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }
}
