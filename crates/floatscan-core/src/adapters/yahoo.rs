use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::gateway::{HealthState, HealthStatus, MarketDataGateway, SourceError, SourceFuture};
use crate::http_client::{HttpClient, HttpRequest, ReqwestHttpClient};
use crate::retry::{execute_with_retry, RetryConfig};
use crate::throttling::{RequestThrottle, ThrottlePolicy};
use crate::{Bar, BarSeries, FundamentalProfile, HistoryRange, Quote, Symbol, UtcDateTime};

const YAHOO_REFERER: &str = "https://finance.yahoo.com/";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_ENDPOINTS: [&str; 2] = [
    "https://query1.finance.yahoo.com/v1/test/getcrumb",
    "https://query2.finance.yahoo.com/v1/test/getcrumb",
];
const QUOTE_URL: &str = "https://query1.finance.yahoo.com/v7/finance/quote";
const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const SUMMARY_URL: &str = "https://query1.finance.yahoo.com/v10/finance/quoteSummary";

// ============================================================================
// Crumb authentication
// ============================================================================

#[derive(Debug, Clone)]
struct CachedCrumb {
    value: String,
    fetched_at: Instant,
}

/// Yahoo cookie/crumb handshake.
///
/// The session cookie lives in the HTTP client's cookie jar; only the crumb
/// is kept here and appended to each data URL. The mutex is held across the
/// refresh so concurrent analyses wait for one handshake instead of racing.
#[derive(Debug)]
pub struct YahooAuthManager {
    crumb: Mutex<Option<CachedCrumb>>,
    ttl: Duration,
    timeout_ms: u64,
}

impl Default for YahooAuthManager {
    fn default() -> Self {
        Self {
            crumb: Mutex::new(None),
            ttl: Duration::from_secs(3600),
            timeout_ms: 10_000,
        }
    }
}

impl YahooAuthManager {
    /// Returns the cached crumb, running the handshake when missing or expired.
    pub async fn crumb(&self, http_client: &dyn HttpClient) -> Result<String, SourceError> {
        let mut guard = self.crumb.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.value.clone());
            }
        }

        let value = self.handshake(http_client).await?;
        *guard = Some(CachedCrumb {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        Ok(value)
    }

    pub async fn invalidate(&self) {
        *self.crumb.lock().await = None;
    }

    async fn handshake(&self, http_client: &dyn HttpClient) -> Result<String, SourceError> {
        // fc.yahoo.com answers 404 but sets the session cookie; status is irrelevant.
        let cookie_request = HttpRequest::get(COOKIE_URL)
            .with_header("referer", YAHOO_REFERER)
            .with_timeout_ms(self.timeout_ms);
        http_client.execute(cookie_request).await.map_err(|e| {
            SourceError::unavailable(format!("failed to fetch Yahoo cookie: {}", e.message()))
        })?;

        for endpoint in CRUMB_ENDPOINTS {
            let crumb_request = HttpRequest::get(endpoint)
                .with_header("referer", YAHOO_REFERER)
                .with_timeout_ms(self.timeout_ms);

            let Ok(response) = http_client.execute(crumb_request).await else {
                continue;
            };
            if response.status == 429 {
                return Err(SourceError::rate_limited(
                    "Yahoo rate limited while fetching crumb",
                ));
            }
            if !response.is_success() {
                continue;
            }

            let body = response.body.trim();
            if body.contains("<html") || body.contains("<!DOCTYPE") {
                continue;
            }
            if !body.is_empty() && body.len() < 100 && !body.contains(char::is_whitespace) {
                return Ok(body.to_owned());
            }
        }

        Err(SourceError::unavailable(
            "failed to fetch Yahoo crumb from all endpoints",
        ))
    }
}

// ============================================================================
// Yahoo gateway
// ============================================================================

/// [`MarketDataGateway`] backed by Yahoo Finance's unofficial JSON endpoints.
///
/// Every call goes through the shared throttle, the circuit breaker and
/// [`execute_with_retry`]. A 401 invalidates the crumb and retries once.
#[derive(Clone)]
pub struct YahooGateway {
    http_client: Arc<dyn HttpClient>,
    auth_manager: Arc<YahooAuthManager>,
    circuit_breaker: Arc<CircuitBreaker>,
    throttle: RequestThrottle,
    retry: RetryConfig,
    timeout_ms: u64,
}

impl Default for YahooGateway {
    fn default() -> Self {
        Self::new(Arc::new(ReqwestHttpClient::default()))
    }
}

impl YahooGateway {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            auth_manager: Arc::new(YahooAuthManager::default()),
            circuit_breaker: Arc::new(CircuitBreaker::new(
                "yahoo",
                CircuitBreakerConfig::default(),
            )),
            throttle: RequestThrottle::from_policy(&ThrottlePolicy::default()),
            retry: RetryConfig::default(),
            timeout_ms: 10_000,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_throttle(mut self, throttle: RequestThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// GETs `url` with the crumb appended and returns the success body.
    ///
    /// Crumb failures are not fatal: chart and quoteSummary still answer
    /// without one for most sessions, so the request goes out bare.
    async fn get_json(&self, url: &str, context: &str) -> Result<String, SourceError> {
        self.circuit_breaker.guard()?;
        self.throttle.acquire().await;

        let mut response = self.send(url, context).await?;
        if response.status == 401 {
            debug!(context, "yahoo rejected crumb, refreshing");
            self.auth_manager.invalidate().await;
            response = self.send(url, context).await?;
        }

        if !response.is_success() {
            let error = SourceError::from_status(response.status, context);
            if error.is_throttle_signal() {
                self.circuit_breaker.record_failure();
            }
            return Err(error);
        }

        self.circuit_breaker.record_success();
        Ok(response.body)
    }

    async fn send(
        &self,
        url: &str,
        context: &str,
    ) -> Result<crate::http_client::HttpResponse, SourceError> {
        let endpoint = match self.auth_manager.crumb(self.http_client.as_ref()).await {
            Ok(crumb) => format!("{url}&crumb={}", urlencoding::encode(&crumb)),
            Err(error) => {
                debug!(context, %error, "continuing without yahoo crumb");
                url.to_owned()
            }
        };

        let request = HttpRequest::get(endpoint)
            .with_header("referer", YAHOO_REFERER)
            .with_timeout_ms(self.timeout_ms);

        execute_with_retry(self.http_client.as_ref(), request, &self.retry)
            .await
            .map_err(|e| {
                self.circuit_breaker.record_failure();
                SourceError::unavailable(format!("{context} transport error: {}", e.message()))
            })
    }

    async fn fetch_quote(&self, symbol: &Symbol) -> Result<Quote, SourceError> {
        let url = format!(
            "{QUOTE_URL}?symbols={}&fields=regularMarketPrice,regularMarketVolume",
            urlencoding::encode(symbol.as_str())
        );
        let body = self.get_json(&url, "yahoo quote").await?;
        parse_quote(symbol, &body)
    }

    async fn fetch_daily_bars(
        &self,
        symbol: &Symbol,
        range: HistoryRange,
    ) -> Result<BarSeries, SourceError> {
        let url = format!(
            "{CHART_URL}/{}?range={}&interval=1d",
            urlencoding::encode(symbol.as_str()),
            range.as_str()
        );
        let body = self.get_json(&url, "yahoo chart").await?;
        parse_chart(symbol, range, &body)
    }

    async fn fetch_fundamentals(&self, symbol: &Symbol) -> Result<FundamentalProfile, SourceError> {
        let url = format!(
            "{SUMMARY_URL}/{}?modules=defaultKeyStatistics,price,summaryDetail",
            urlencoding::encode(symbol.as_str())
        );
        let body = self.get_json(&url, "yahoo quoteSummary").await?;
        parse_fundamentals(&body)
    }
}

impl MarketDataGateway for YahooGateway {
    fn quote<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, Quote> {
        Box::pin(self.fetch_quote(symbol))
    }

    fn daily_bars<'a>(
        &'a self,
        symbol: &'a Symbol,
        range: HistoryRange,
    ) -> SourceFuture<'a, BarSeries> {
        Box::pin(self.fetch_daily_bars(symbol, range))
    }

    fn fundamentals<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, FundamentalProfile> {
        Box::pin(self.fetch_fundamentals(symbol))
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async move {
            match self.circuit_breaker.state() {
                CircuitState::Closed => HealthStatus::healthy(),
                CircuitState::HalfOpen => HealthStatus::new(HealthState::Degraded, true),
                CircuitState::Open => HealthStatus::new(HealthState::Unhealthy, false),
            }
        })
    }
}

// ============================================================================
// Payload parsing
// ============================================================================

fn parse_quote(symbol: &Symbol, body: &str) -> Result<Quote, SourceError> {
    let payload: YahooQuoteResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::internal(format!("failed to parse yahoo quote: {e}")))?;

    if let Some(error) = payload.quote_response.error {
        return Err(error.into_source_error("yahoo quote"));
    }

    let data = payload
        .quote_response
        .result
        .into_iter()
        .find(|quote| quote.symbol.eq_ignore_ascii_case(symbol.as_str()))
        .ok_or_else(|| SourceError::invalid_request(format!("no yahoo quote for {symbol}")))?;

    let price = data
        .regular_market_price
        .ok_or_else(|| SourceError::internal(format!("yahoo quote for {symbol} has no price")))?;

    Quote::new(
        symbol.clone(),
        price,
        data.regular_market_volume.map(|volume| volume.max(0.0) as u64),
        UtcDateTime::now(),
    )
    .map_err(|e| SourceError::internal(format!("invalid yahoo quote for {symbol}: {e}")))
}

fn parse_chart(symbol: &Symbol, range: HistoryRange, body: &str) -> Result<BarSeries, SourceError> {
    let payload: YahooChartResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::internal(format!("failed to parse yahoo chart: {e}")))?;

    if let Some(error) = payload.chart.error {
        return Err(error.into_source_error("yahoo chart"));
    }

    let result = payload
        .chart
        .result
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::internal("no chart data in response"))?;

    let timestamps = result.timestamp.unwrap_or_default();
    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Ok(BarSeries::new(symbol.clone(), range, Vec::new()));
    };

    let mut bars = Vec::with_capacity(timestamps.len());
    let mut dropped = 0_usize;
    for (i, &seconds) in timestamps.iter().enumerate() {
        let (Some(high), Some(low), Some(close)) = (
            value_at(&quote.high, i),
            value_at(&quote.low, i),
            value_at(&quote.close, i),
        ) else {
            dropped += 1;
            continue;
        };

        // The live bar can report a close a tick outside its high/low.
        let (high, low) = (high.max(close), low.min(close));
        let volume = value_at(&quote.volume, i).map_or(0, |v| v.max(0.0) as u64);
        let bar = UtcDateTime::from_unix_seconds(seconds).and_then(|ts| {
            Bar::new(ts, value_at(&quote.open, i), high, low, close, volume)
        });
        match bar {
            Ok(bar) => bars.push(bar),
            Err(error) if i + 1 == timestamps.len() => {
                return Err(SourceError::internal(format!(
                    "newest yahoo bar for {symbol} is invalid: {error}"
                )));
            }
            Err(_) => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(%symbol, dropped, "dropped incomplete yahoo bars");
    }

    Ok(BarSeries::new(symbol.clone(), range, bars))
}

fn parse_fundamentals(body: &str) -> Result<FundamentalProfile, SourceError> {
    let payload: YahooQuoteSummaryResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::internal(format!("failed to parse yahoo fundamentals: {e}")))?;

    if let Some(error) = payload.quote_summary.error {
        return Err(error.into_source_error("yahoo quoteSummary"));
    }

    let Some(result) = payload.quote_summary.result.unwrap_or_default().into_iter().next() else {
        return Ok(FundamentalProfile::default());
    };

    let float_shares = result
        .default_key_statistics
        .as_ref()
        .and_then(|stats| stats.float_shares.as_ref())
        .and_then(YahooRawValue::value);

    let market_cap = result
        .price
        .as_ref()
        .and_then(|price| price.market_cap.as_ref())
        .and_then(YahooRawValue::value)
        .or_else(|| {
            result
                .summary_detail
                .as_ref()
                .and_then(|detail| detail.market_cap.as_ref())
                .and_then(YahooRawValue::value)
        });

    FundamentalProfile::new(float_shares, market_cap)
        .map_err(|e| SourceError::internal(format!("invalid yahoo fundamentals: {e}")))
}

fn value_at(values: &[Option<f64>], index: usize) -> Option<f64> {
    values
        .get(index)
        .copied()
        .flatten()
        .filter(|value| value.is_finite())
}

#[derive(Debug, Deserialize)]
struct YahooApiError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

impl YahooApiError {
    fn into_source_error(self, context: &str) -> SourceError {
        let message = format!(
            "{context} API error {}: {}",
            self.code,
            self.description.unwrap_or_default()
        );
        if self.code.eq_ignore_ascii_case("Not Found") {
            SourceError::invalid_request(message)
        } else {
            SourceError::unavailable(message)
        }
    }
}

#[derive(Debug, Deserialize)]
struct YahooQuoteResponse {
    #[serde(rename = "quoteResponse")]
    quote_response: YahooQuoteResponseData,
}

#[derive(Debug, Deserialize)]
struct YahooQuoteResponseData {
    #[serde(default)]
    result: Vec<YahooQuoteData>,
    #[serde(default)]
    error: Option<YahooApiError>,
}

#[derive(Debug, Deserialize)]
struct YahooQuoteData {
    symbol: String,
    #[serde(rename = "regularMarketPrice", default)]
    regular_market_price: Option<f64>,
    #[serde(rename = "regularMarketVolume", default)]
    regular_market_volume: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChartData,
}

#[derive(Debug, Deserialize)]
struct YahooChartData {
    #[serde(default)]
    result: Option<Vec<YahooChartResult>>,
    #[serde(default)]
    error: Option<YahooApiError>,
}

#[derive(Debug, Deserialize)]
struct YahooChartResult {
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: YahooChartIndicators,
}

#[derive(Debug, Deserialize)]
struct YahooChartIndicators {
    #[serde(default)]
    quote: Vec<YahooChartQuote>,
}

#[derive(Debug, Deserialize)]
struct YahooChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct YahooQuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: YahooQuoteSummaryData,
}

#[derive(Debug, Deserialize)]
struct YahooQuoteSummaryData {
    #[serde(default)]
    result: Option<Vec<YahooQuoteSummaryResult>>,
    #[serde(default)]
    error: Option<YahooApiError>,
}

#[derive(Debug, Deserialize)]
struct YahooQuoteSummaryResult {
    #[serde(rename = "defaultKeyStatistics", default)]
    default_key_statistics: Option<YahooKeyStatistics>,
    #[serde(default)]
    price: Option<YahooMarketCapModule>,
    #[serde(rename = "summaryDetail", default)]
    summary_detail: Option<YahooMarketCapModule>,
}

#[derive(Debug, Deserialize)]
struct YahooKeyStatistics {
    #[serde(rename = "floatShares", default)]
    float_shares: Option<YahooRawValue>,
}

#[derive(Debug, Deserialize)]
struct YahooMarketCapModule {
    #[serde(rename = "marketCap", default)]
    market_cap: Option<YahooRawValue>,
}

/// Yahoo wraps numbers as `{"raw": 1.0, "fmt": "1.00"}`; an empty object means unknown.
#[derive(Debug, Deserialize)]
struct YahooRawValue {
    #[serde(default)]
    raw: Option<f64>,
}

impl YahooRawValue {
    fn value(&self) -> Option<f64> {
        self.raw.filter(|value| value.is_finite())
    }
}
