use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::gateway::SourceError;

/// Runtime circuit state for one upstream provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Thread-safe circuit breaker guarding a provider's network calls.
///
/// While open, calls fail fast with `SourceError::unavailable` so a batch
/// over hundreds of symbols does not wait on a provider that is down.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: &'static str,
    config: CircuitBreakerConfig,
    inner: Mutex<CircuitInner>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            config,
            inner: Mutex::new(CircuitInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    /// Returns an error when the circuit is open and the probe timer has not elapsed.
    pub fn guard(&self) -> Result<(), SourceError> {
        if self.allow_request() {
            Ok(())
        } else {
            Err(SourceError::unavailable(format!(
                "{} circuit breaker is open; skipping upstream call",
                self.name
            )))
        }
    }

    pub fn allow_request(&self) -> bool {
        let mut inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let can_probe = inner
                    .opened_at
                    .is_some_and(|opened_at| opened_at.elapsed() >= self.config.open_timeout);

                if can_probe {
                    inner.state = CircuitState::HalfOpen;
                    inner.opened_at = None;
                }
                can_probe
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self
            .inner
            .lock()
            .expect("circuit breaker lock is not poisoned");
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        let should_open = inner.state == CircuitState::HalfOpen
            || inner.consecutive_failures >= self.config.failure_threshold;
        if should_open && inner.state != CircuitState::Open {
            warn!(
                provider = self.name,
                failures = inner.consecutive_failures,
                "circuit breaker opened"
            );
        }
        if should_open {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner
            .lock()
            .expect("circuit breaker lock is not poisoned")
            .state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner
            .lock()
            .expect("circuit breaker lock is not poisoned")
            .consecutive_failures
    }
}
