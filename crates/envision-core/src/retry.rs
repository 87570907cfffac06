//! Retry logic with exponential backoff.

use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use crate::http_client::{
    HttpClient, HttpRequest, HttpResponse, TransportError, TransportErrorKind, TransportFuture,
};

/// Backoff strategy for retrying failed requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Uses a fixed delay between retries.
    Fixed {
        /// Delay between retries.
        delay: Duration,
    },
    /// Uses an exponential delay between retries.
    ///
    /// The delay is calculated as `base * (factor ^ attempt)`.
    Exponential {
        /// The initial backoff duration.
        base: Duration,
        /// The multiplicative factor for each subsequent retry.
        factor: f64,
        /// The maximum duration to wait between retries.
        max: Duration,
        /// Whether to apply random jitter (+/- 50%) to the delay.
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(1_000),
            factor: 2.0,
            max: Duration::from_secs(30),
            jitter: false,
        }
    }
}

impl Backoff {
    /// Exponential doubling without jitter.
    pub const fn doubling(base: Duration, max: Duration) -> Self {
        Self::Exponential {
            base,
            factor: 2.0,
            max,
            jitter: false,
        }
    }

    /// Turns jitter on or off. Fixed delays are never jittered.
    pub fn with_jitter(self, enabled: bool) -> Self {
        match self {
            Self::Exponential {
                base, factor, max, ..
            } => Self::Exponential {
                base,
                factor,
                max,
                jitter: enabled,
            },
            fixed @ Self::Fixed { .. } => fixed,
        }
    }

    /// Calculate the delay for a given retry attempt.
    ///
    /// # Arguments
    ///
    /// * `attempt` - The retry attempt number (0-based)
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scale = factor.powi(attempt.min(i32::MAX as u32) as i32);
                let seconds = base.as_secs_f64() * scale;
                let capped_seconds = seconds.min(max.as_secs_f64());

                let mut delay = Duration::from_secs_f64(capped_seconds);

                if jitter {
                    let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
                    let random_offset = fastrand::u64(0..=(jitter_ms * 2));
                    let total_ms =
                        delay.as_millis() as i64 + (random_offset as i64 - jitter_ms as i64);
                    delay = Duration::from_millis(total_ms.max(0) as u64);
                }

                delay
            }
        }
    }
}

/// Configuration for the automatic retry mechanism.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Enables or disables the retry mechanism.
    pub enabled: bool,
    /// The maximum number of retries to attempt.
    /// Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    /// The backoff strategy to use between retries.
    pub backoff: Backoff,
    /// Individual HTTP status codes that should trigger a retry.
    pub retry_on_status: Vec<u16>,
    /// Whether every 5xx status triggers a retry.
    pub retry_on_server_errors: bool,
    /// Whether to retry on request timeouts.
    pub retry_on_timeout: bool,
    /// Whether to retry on connection and other network failures.
    pub retry_on_connect: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 2,
            backoff: Backoff::default(),
            retry_on_status: vec![408, 429],
            retry_on_server_errors: true,
            retry_on_timeout: true,
            retry_on_connect: true,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with exponential backoff.
    pub fn exponential(max_retries: u32, base: Duration, max: Duration) -> Self {
        Self {
            max_retries,
            backoff: Backoff::doubling(base, max),
            ..Self::default()
        }
    }

    /// Create a new retry configuration with fixed backoff.
    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    /// Disable retries.
    pub fn no_retry() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Check if a given HTTP status code should trigger a retry.
    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
            || (self.retry_on_server_errors && (500..600).contains(&status))
    }

    /// Check if a transport failure should trigger a retry.
    pub fn should_retry_error(&self, error: &TransportError) -> bool {
        match error.kind() {
            TransportErrorKind::Timeout { .. } => self.retry_on_timeout,
            TransportErrorKind::Connect | TransportErrorKind::Body | TransportErrorKind::Other => {
                self.retry_on_connect
            }
        }
    }

    /// Delay before retry `attempt`, 1-indexed (the original call is not a retry).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt.saturating_sub(1))
    }

    fn qualifies(&self, outcome: &Result<HttpResponse, TransportError>) -> bool {
        match outcome {
            Ok(response) => !response.is_success() && self.should_retry_status(response.status),
            Err(error) => self.should_retry_error(error),
        }
    }
}

/// Bookkeeping for one logical request while it is being retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Retries performed so far.
    pub attempt: u32,
    /// Delay scheduled before the next retry.
    pub next_delay: Duration,
    /// Total time spent since the original call was issued.
    pub elapsed: Duration,
}

/// Transport decorator that re-issues requests failing with a qualifying error.
///
/// Non-qualifying outcomes, including client-error statuses, are returned after the
/// first attempt. When retries are exhausted the final response or error is returned
/// unchanged.
#[derive(Debug, Clone)]
pub struct RetryingHttpClient<C> {
    inner: C,
    config: RetryConfig,
}

impl<C: HttpClient> RetryingHttpClient<C> {
    pub fn new(inner: C, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: HttpClient> HttpClient for RetryingHttpClient<C> {
    fn execute<'a>(&'a self, request: HttpRequest) -> TransportFuture<'a> {
        Box::pin(async move {
            let started = Instant::now();
            let mut state = RetryState {
                attempt: 0,
                next_delay: Duration::ZERO,
                elapsed: Duration::ZERO,
            };

            loop {
                let outcome = self.inner.execute(request.clone()).await;
                state.elapsed = started.elapsed();

                if !self.config.qualifies(&outcome) {
                    return outcome;
                }

                if !self.config.enabled || state.attempt >= self.config.max_retries {
                    if state.attempt > 0 {
                        warn!(
                            url = %request.url,
                            attempts = state.attempt + 1,
                            elapsed_ms = state.elapsed.as_millis() as u64,
                            reason = %describe_outcome(&outcome),
                            "retries exhausted"
                        );
                    }
                    return outcome;
                }

                state.attempt += 1;
                state.next_delay = self.config.delay_for_attempt(state.attempt);
                warn!(
                    url = %request.url,
                    attempt = state.attempt,
                    max_retries = self.config.max_retries,
                    delay_ms = state.next_delay.as_millis() as u64,
                    reason = %describe_outcome(&outcome),
                    "retrying request"
                );
                tokio::time::sleep(state.next_delay).await;
            }
        })
    }
}

fn describe_outcome(outcome: &Result<HttpResponse, TransportError>) -> String {
    match outcome {
        Ok(response) => format!("status {}", response.status),
        Err(error) => error.message().to_owned(),
    }
}
