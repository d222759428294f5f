use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};

/// Request budget for one upstream provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottlePolicy {
    pub quota_window_secs: u64,
    pub quota_limit: u32,
}

impl Default for ThrottlePolicy {
    /// Yahoo publishes no quota; two requests a second with bursts of
    /// 120 a minute keeps a full scan below its soft blocking threshold.
    fn default() -> Self {
        Self {
            quota_window_secs: 60,
            quota_limit: 120,
        }
    }
}

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared rate limiter in front of the outbound provider channel.
#[derive(Clone)]
pub struct RequestThrottle {
    limiter: Arc<DirectRateLimiter>,
}

impl RequestThrottle {
    pub fn new(quota_window: Duration, quota_limit: u32) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::direct(quota_from_window(
                quota_window,
                quota_limit,
            ))),
        }
    }

    pub fn from_policy(policy: &ThrottlePolicy) -> Self {
        Self::new(
            Duration::from_secs(policy.quota_window_secs),
            policy.quota_limit,
        )
    }

    /// Takes one unit of budget, or returns how long until one is available.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        self.limiter
            .check()
            .map_err(|not_until| not_until.wait_time_from(DefaultClock::default().now()))
    }

    /// Waits until one unit of budget is available and takes it.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}

impl std::fmt::Debug for RequestThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestThrottle").finish_non_exhaustive()
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let burst = NonZeroU32::new(quota_limit.max(1)).unwrap_or(NonZeroU32::MIN);

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(burst.get())).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}
