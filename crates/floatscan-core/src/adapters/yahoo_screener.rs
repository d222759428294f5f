use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::gateway::{SourceError, SourceFuture};
use crate::http_client::{HttpClient, HttpRequest, BROWSER_USER_AGENT};
use crate::retry::{execute_with_retry, RetryConfig};
use crate::sourcing::{CandidateSource, ScreenerEndpoint, SourcingConfig, SourcingMode};
use crate::Symbol;

const YAHOO_ORIGIN: &str = "https://finance.yahoo.com";

/// Primary candidate feed: Yahoo's predefined screeners.
///
/// Each endpoint is fetched independently. A failing endpoint is logged and
/// skipped so one bad screener never empties the whole universe.
#[derive(Clone)]
pub struct YahooScreenerSource {
    http_client: Arc<dyn HttpClient>,
    config: SourcingConfig,
    retry: RetryConfig,
    timeout_ms: u64,
}

impl YahooScreenerSource {
    pub fn new(http_client: Arc<dyn HttpClient>, config: SourcingConfig) -> Self {
        Self {
            http_client,
            config,
            retry: RetryConfig::no_retry(),
            timeout_ms: 10_000,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn endpoint_url(&self, endpoint: &ScreenerEndpoint) -> String {
        format!(
            "{}?count={}&scrIds={}",
            self.config.screener_url,
            endpoint.count,
            urlencoding::encode(&endpoint.scr_id)
        )
    }

    async fn fetch_endpoint(
        &self,
        endpoint: &ScreenerEndpoint,
        mode: SourcingMode,
    ) -> Result<Vec<Symbol>, SourceError> {
        let request = HttpRequest::get(self.endpoint_url(endpoint))
            .with_browser_identity(BROWSER_USER_AGENT, YAHOO_ORIGIN)
            .with_timeout_ms(self.timeout_ms);

        let response = execute_with_retry(self.http_client.as_ref(), request, &self.retry)
            .await
            .map_err(|e| {
                SourceError::unavailable(format!(
                    "screener '{}' transport error: {}",
                    endpoint.scr_id,
                    e.message()
                ))
            })?;

        if !response.is_success() {
            return Err(SourceError::from_status(
                response.status,
                &format!("screener '{}'", endpoint.scr_id),
            ));
        }

        let quotes = parse_screener(&response.body)?;
        Ok(quotes
            .into_iter()
            .filter(|(_, price)| self.config.admits_price(mode, *price))
            .map(|(symbol, _)| symbol)
            .collect())
    }

    async fn fetch_all(&self, mode: SourcingMode) -> Result<Vec<Symbol>, SourceError> {
        let mut symbols = BTreeSet::new();

        for endpoint in self
            .config
            .endpoints
            .iter()
            .filter(|endpoint| endpoint.applies_to(mode))
        {
            match self.fetch_endpoint(endpoint, mode).await {
                Ok(found) => {
                    debug!(screener = %endpoint.scr_id, count = found.len(), "screener fetched");
                    symbols.extend(found);
                }
                Err(error) => {
                    warn!(screener = %endpoint.scr_id, %error, "skipping screener endpoint");
                }
            }
        }

        Ok(symbols.into_iter().collect())
    }
}

impl CandidateSource for YahooScreenerSource {
    fn name(&self) -> &'static str {
        "yahoo_screener"
    }

    fn fetch<'a>(&'a self, mode: SourcingMode) -> SourceFuture<'a, Vec<Symbol>> {
        Box::pin(self.fetch_all(mode))
    }
}

/// Extracts `(symbol, price)` pairs from a screener payload, dropping
/// tickers that are not purely alphabetic.
fn parse_screener(body: &str) -> Result<Vec<(Symbol, Option<f64>)>, SourceError> {
    let payload: ScreenerResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::internal(format!("failed to parse screener payload: {e}")))?;

    let quotes = payload
        .finance
        .result
        .unwrap_or_default()
        .into_iter()
        .next()
        .map(|result| result.quotes)
        .unwrap_or_default();

    Ok(quotes
        .into_iter()
        .filter_map(|quote| {
            let raw = quote.symbol?;
            let symbol = Symbol::parse(&raw).ok()?;
            Some((symbol, quote.regular_market_price.and_then(ScreenerPrice::value)))
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct ScreenerResponse {
    finance: ScreenerFinance,
}

#[derive(Debug, Deserialize)]
struct ScreenerFinance {
    #[serde(default)]
    result: Option<Vec<ScreenerResult>>,
}

#[derive(Debug, Deserialize)]
struct ScreenerResult {
    #[serde(default)]
    quotes: Vec<ScreenerQuote>,
}

#[derive(Debug, Deserialize)]
struct ScreenerQuote {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(rename = "regularMarketPrice", default)]
    regular_market_price: Option<ScreenerPrice>,
}

/// The screener reports prices either bare or wrapped as `{"raw": ..}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScreenerPrice {
    Plain(f64),
    Wrapped {
        #[serde(default)]
        raw: Option<f64>,
    },
}

impl ScreenerPrice {
    fn value(self) -> Option<f64> {
        match self {
            Self::Plain(value) => Some(value),
            Self::Wrapped { raw } => raw,
        }
        .filter(|value| value.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpResponse, StaticHttpClient};

    #[test]
    fn parses_plain_and_wrapped_prices_and_drops_odd_tickers() {
        let body = r#"{"finance":{"result":[{"quotes":[
            {"symbol":"ABCD","regularMarketPrice":3.5},
            {"symbol":"BRK.B","regularMarketPrice":400.0},
            {"symbol":"WXYZ","regularMarketPrice":{"raw":25.0,"fmt":"25.00"}},
            {"symbol":"NOPR"}
        ]}],"error":null}}"#;

        let quotes = parse_screener(body).expect("payload should parse");

        let rendered: Vec<(String, Option<f64>)> = quotes
            .into_iter()
            .map(|(symbol, price)| (symbol.to_string(), price))
            .collect();
        assert_eq!(
            rendered,
            vec![
                (String::from("ABCD"), Some(3.5)),
                (String::from("WXYZ"), Some(25.0)),
                (String::from("NOPR"), None),
            ]
        );
    }

    #[tokio::test]
    async fn sends_browser_identity_and_origin() {
        let client = Arc::new(StaticHttpClient::new().route(
            "https://query2.finance.yahoo.com/",
            HttpResponse::ok(r#"{"finance":{"result":[{"quotes":[]}]}}"#),
        ));
        let source = YahooScreenerSource::new(client.clone(), SourcingConfig::default());

        source.fetch(SourcingMode::All).await.expect("fetch");

        let requests = client.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].url.ends_with("count=100&scrIds=day_gainers"));
        assert!(requests[1].url.ends_with("count=50&scrIds=most_actives"));
        assert_eq!(
            requests[0].headers.get("origin").map(String::as_str),
            Some(YAHOO_ORIGIN)
        );
        assert_eq!(requests[0].timeout_ms, 10_000);
    }
}
