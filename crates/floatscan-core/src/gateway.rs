//! Market data gateway contract.
//!
//! The analyzer only talks to upstream data through [`MarketDataGateway`],
//! which keeps scoring testable against in-memory fixtures.
//!
//! | Method | Returns | Description |
//! |--------|---------|-------------|
//! | [`quote`](MarketDataGateway::quote) | [`Quote`] | Real-time or delayed price |
//! | [`daily_bars`](MarketDataGateway::daily_bars) | [`BarSeries`] | Daily OHLCV history |
//! | [`fundamentals`](MarketDataGateway::fundamentals) | [`FundamentalProfile`] | Float and market cap |
//! | [`health`](MarketDataGateway::health) | [`HealthStatus`] | Provider health snapshot |

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Bar, BarSeries, FundamentalProfile, HistoryRange, Quote, Symbol, UtcDateTime};

/// Provider health state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Runtime gateway health snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub state: HealthState,
    pub rate_available: bool,
}

impl HealthStatus {
    pub const fn new(state: HealthState, rate_available: bool) -> Self {
        Self {
            state,
            rate_available,
        }
    }

    pub const fn healthy() -> Self {
        Self::new(HealthState::Healthy, true)
    }
}

/// Gateway-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Provider unreachable, timed out or answered with a server error.
    Unavailable,
    /// Provider is throttling us.
    RateLimited,
    /// Provider rejected the request (unknown symbol, bad parameters).
    InvalidRequest,
    /// Payload could not be interpreted.
    Internal,
}

/// Structured error returned by gateways and candidate feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    /// Maps a non-success HTTP status to an error kind.
    pub fn from_status(status: u16, context: &str) -> Self {
        match status {
            429 => Self::rate_limited(format!("{context} rate limited (status 429)")),
            400..=499 => Self::invalid_request(format!("{context} rejected (status {status})")),
            _ => Self::unavailable(format!("{context} failed (status {status})")),
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    /// True when the provider is down or throttling, which is what the batch
    /// orchestrator backs off on.
    pub const fn is_throttle_signal(&self) -> bool {
        matches!(
            self.kind,
            SourceErrorKind::Unavailable | SourceErrorKind::RateLimited
        )
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Upstream market data contract.
///
/// Implementations must be `Send + Sync`; one gateway is shared by every
/// analysis task in a batch.
pub trait MarketDataGateway: Send + Sync {
    /// Latest price for `symbol`.
    fn quote<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, Quote>;

    /// Daily bars covering `range`, oldest first.
    fn daily_bars<'a>(&'a self, symbol: &'a Symbol, range: HistoryRange)
        -> SourceFuture<'a, BarSeries>;

    /// Float and market cap. Missing fields are `None`, not errors.
    fn fundamentals<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, FundamentalProfile>;

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>>;
}

/// Offline gateway answering from canned per-symbol data.
///
/// Unknown symbols fail with `InvalidRequest`. `daily_bars` tracks how many
/// calls are in flight so callers can check concurrency bounds.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    quotes: HashMap<Symbol, Result<f64, SourceError>>,
    bars: HashMap<Symbol, Result<Vec<Bar>, SourceError>>,
    fundamentals: HashMap<Symbol, FundamentalProfile>,
    delays: HashMap<Symbol, Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    bar_calls: AtomicUsize,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quote(mut self, symbol: Symbol, price: f64) -> Self {
        self.quotes.insert(symbol, Ok(price));
        self
    }

    pub fn with_quote_error(mut self, symbol: Symbol, error: SourceError) -> Self {
        self.quotes.insert(symbol, Err(error));
        self
    }

    pub fn with_bars(mut self, symbol: Symbol, bars: Vec<Bar>) -> Self {
        self.bars.insert(symbol, Ok(bars));
        self
    }

    pub fn with_bars_error(mut self, symbol: Symbol, error: SourceError) -> Self {
        self.bars.insert(symbol, Err(error));
        self
    }

    pub fn with_fundamentals(mut self, symbol: Symbol, profile: FundamentalProfile) -> Self {
        self.fundamentals.insert(symbol, profile);
        self
    }

    /// Delays `daily_bars` for `symbol`, to shape completion order.
    pub fn with_delay(mut self, symbol: Symbol, delay: Duration) -> Self {
        self.delays.insert(symbol, delay);
        self
    }

    /// Highest number of concurrent `daily_bars` calls observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn bar_calls(&self) -> usize {
        self.bar_calls.load(Ordering::SeqCst)
    }

    fn unknown(symbol: &Symbol) -> SourceError {
        SourceError::invalid_request(format!("unknown symbol {symbol}"))
    }
}

impl MarketDataGateway for InMemoryGateway {
    fn quote<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, Quote> {
        Box::pin(async move {
            let price = self
                .quotes
                .get(symbol)
                .cloned()
                .unwrap_or_else(|| Err(Self::unknown(symbol)))?;
            Quote::new(symbol.clone(), price, None, UtcDateTime::now())
                .map_err(|e| SourceError::internal(e.to_string()))
        })
    }

    fn daily_bars<'a>(
        &'a self,
        symbol: &'a Symbol,
        range: HistoryRange,
    ) -> SourceFuture<'a, BarSeries> {
        Box::pin(async move {
            self.bar_calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

            let delay = self.delays.get(symbol).copied().unwrap_or(Duration::from_millis(1));
            tokio::time::sleep(delay).await;

            let result = self
                .bars
                .get(symbol)
                .cloned()
                .unwrap_or_else(|| Err(Self::unknown(symbol)))
                .map(|bars| BarSeries::new(symbol.clone(), range, bars));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        })
    }

    fn fundamentals<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, FundamentalProfile> {
        Box::pin(async move { Ok(self.fundamentals.get(symbol).copied().unwrap_or_default()) })
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async { HealthStatus::healthy() })
    }
}
