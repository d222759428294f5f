//! Retry logic with exponential backoff and jitter.

use std::time::Duration;

use tracing::debug;

use crate::http_client::{HttpClient, HttpError, HttpRequest, HttpResponse};

/// Backoff strategy between retries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Uses a fixed delay between retries.
    Fixed { delay: Duration },
    /// Delay is `base * factor^attempt`, capped at `max`, optionally with +/- 50% jitter.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(250),
            factor: 2.0,
            max: Duration::from_secs(4),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
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
                let capped_seconds = (base.as_secs_f64() * scale).min(max.as_secs_f64());
                let delay = Duration::from_secs_f64(capped_seconds);

                if !jitter {
                    return delay;
                }

                let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
                let random_offset = fastrand::u64(0..=(jitter_ms * 2));
                let total_ms = delay.as_millis() as i64 + (random_offset as i64 - jitter_ms as i64);
                Duration::from_millis(total_ms.max(0) as u64)
            }
        }
    }
}

/// Configuration for automatic HTTP retries.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub enabled: bool,
    /// Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    pub retry_on_status: Vec<u16>,
    pub retry_on_timeout: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 2,
            backoff: Backoff::default(),
            retry_on_status: vec![408, 429, 500, 502, 503, 504],
            retry_on_timeout: true,
        }
    }
}

impl RetryConfig {
    pub fn exponential(max_retries: u32, base: Duration) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Exponential {
                base,
                factor: 2.0,
                max: Duration::from_secs(4),
                jitter: true,
            },
            ..Self::default()
        }
    }

    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }

    pub fn should_retry_error(&self, error: &HttpError) -> bool {
        if error.is_timeout() {
            return self.retry_on_timeout;
        }
        error.retryable()
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

/// Executes `request`, retrying retryable transport errors and statuses.
///
/// The last response (even a non-success one) or the last error is returned
/// once retries are exhausted.
pub async fn execute_with_retry(
    client: &dyn HttpClient,
    request: HttpRequest,
    config: &RetryConfig,
) -> Result<HttpResponse, HttpError> {
    let attempts = if config.enabled {
        config.max_retries + 1
    } else {
        1
    };

    let mut attempt = 0;
    loop {
        let outcome = client.execute(request.clone()).await;
        attempt += 1;

        let retry = match &outcome {
            Ok(response) => config.should_retry_status(response.status),
            Err(error) => config.should_retry_error(error),
        };

        if !retry || attempt >= attempts {
            return outcome;
        }

        let delay = config.delay_for_attempt(attempt - 1);
        debug!(url = %request.url, attempt, ?delay, "retrying request");
        tokio::time::sleep(delay).await;
    }
}
