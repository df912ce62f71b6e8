//! Retry policy wrapper: exponential backoff around any provider.
//!
//! Transient failures (rate limits, timeouts, transport errors, 5xx) are
//! retried up to `max_attempts` total calls. Everything else is returned
//! immediately.

use async_trait::async_trait;
use cadence_config::RetryConfig;
use cadence_core::error::ProviderError;
use cadence_core::provider::{CompletionRequest, CompletionResponse, Provider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

type RetryPredicate = Arc<dyn Fn(&ProviderError) -> bool + Send + Sync>;

/// When and how long to wait before retrying.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Total calls, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    retry_if: RetryPredicate,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            retry_if: Arc::new(ProviderError::is_retryable),
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Replace the retryable-vs-fatal predicate.
    pub fn retry_if(mut self, predicate: impl Fn(&ProviderError) -> bool + Send + Sync + 'static) -> Self {
        self.retry_if = Arc::new(predicate);
        self
    }

    pub fn should_retry(&self, error: &ProviderError) -> bool {
        (self.retry_if)(error)
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`,
    /// capped at `max_delay`. A rate limit's `retry_after_secs` wins when
    /// it is longer.
    pub fn delay_for(&self, attempt: u32, error: &ProviderError) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        let backoff = self.base_delay.saturating_mul(factor).min(self.max_delay);
        match error {
            ProviderError::RateLimited { retry_after_secs } => {
                backoff.max(Duration::from_secs(*retry_after_secs))
            }
            _ => backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

/// A provider that retries its inner provider according to a [`RetryPolicy`].
pub struct RetryProvider<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: Provider> RetryProvider<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: Provider> Provider for RetryProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn default_model(&self) -> Option<&str> {
        self.inner.default_model()
    }

    async fn create_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.inner.create_completion(request.clone()).await {
                Ok(response) => {
                    if attempt > 0 {
                        info!(provider = %self.inner.name(), attempts = attempt + 1, "Retry succeeded");
                    }
                    return Ok(response);
                }
                Err(e) if attempt + 1 < self.policy.max_attempts && self.policy.should_retry(&e) => {
                    let delay = self.policy.delay_for(attempt, &e);
                    warn!(
                        provider = %self.inner.name(),
                        attempt = attempt + 1,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Provider call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}
