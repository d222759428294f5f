//! Behavior-driven tests for end-to-end screener journeys
//!
//! These tests verify WHAT a user accomplishes through the engine facade:
//! scanning a watchlist together with sourced candidates, reusing cached
//! candidates, and loading configuration from disk.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use floatscan_core::gateway::SourceFuture;
use floatscan_core::{
    Bar, BatchError, CancelFlag, CandidateOrigin, CandidateSource, ConfigError, EngineConfig,
    FilterCriteria, HealthState, HttpResponse, InMemoryGateway, Origin, ScanError, ScanRequest,
    ScreenerEngine, SourcingMode, StaticHttpClient, Symbol, UtcDateTime,
};

/// Candidate feed returning a fixed list and counting calls.
struct FixedSource {
    symbols: Vec<Symbol>,
    calls: AtomicUsize,
}

impl FixedSource {
    fn new(values: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            symbols: symbols(values),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CandidateSource for FixedSource {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn fetch<'a>(&'a self, _mode: SourcingMode) -> SourceFuture<'a, Vec<Symbol>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let symbols = self.symbols.clone();
        Box::pin(async move { Ok(symbols) })
    }
}

fn symbol(value: &str) -> Symbol {
    Symbol::parse(value).expect("valid symbol")
}

fn symbols(values: &[&str]) -> Vec<Symbol> {
    values.iter().map(|value| symbol(value)).collect()
}

fn breakout_bars() -> Vec<Bar> {
    let start = UtcDateTime::parse("2023-01-02T00:00:00Z").expect("timestamp");
    let mut bars: Vec<Bar> = (0..199)
        .map(|i| {
            Bar::new(start.plus_days(i), Some(2.0), 2.1, 1.9, 2.0, 500_000).expect("valid bar")
        })
        .collect();
    bars.push(
        Bar::new(start.plus_days(199), Some(4.1), 5.0, 4.0, 4.9, 9_000_000).expect("valid bar"),
    );
    bars
}

fn gateway_with(tickers: &[&str]) -> Arc<InMemoryGateway> {
    let mut gateway = InMemoryGateway::new();
    for ticker in tickers {
        gateway = gateway
            .with_quote(symbol(ticker), 5.0)
            .with_bars(symbol(ticker), breakout_bars());
    }
    Arc::new(gateway)
}

fn engine(
    gateway: Arc<InMemoryGateway>,
    primary: Arc<FixedSource>,
    fallback: Arc<FixedSource>,
) -> ScreenerEngine {
    ScreenerEngine::builder(EngineConfig::default())
        .with_gateway(gateway)
        .with_primary_source(primary)
        .with_fallback_source(fallback)
        .build()
        .expect("default config is valid")
}

// =============================================================================
// Scanning
// =============================================================================

#[tokio::test]
async fn scan_merges_watchlist_and_sourced_candidates() {
    // Given: A watchlist that overlaps the sourced candidates on SHRD
    let gateway = gateway_with(&["MINE", "SHRD", "AUTO"]);
    let engine = engine(
        gateway.clone(),
        FixedSource::new(&["SHRD", "AUTO"]),
        FixedSource::new(&[]),
    );
    let request = ScanRequest::auto(SourcingMode::All)
        .with_watchlist(symbols(&["MINE", "SHRD"]));

    // When: The user runs a full scan
    let report = engine
        .scan(&request, None, &CancelFlag::new())
        .await
        .expect("scan should run");

    // Then: Watchlist symbols come first and stay manual even when sourced
    let tagged: Vec<(String, Option<Origin>)> = report
        .results
        .iter()
        .map(|result| (result.symbol.to_string(), result.origin))
        .collect();
    assert_eq!(
        tagged,
        vec![
            (String::from("MINE"), Some(Origin::Manual)),
            (String::from("SHRD"), Some(Origin::Manual)),
            (String::from("AUTO"), Some(Origin::Auto)),
        ]
    );

    // And: Each symbol was analyzed exactly once
    assert_eq!(gateway.bar_calls(), 3);
    assert_eq!(report.manual.as_ref().map(|batch| batch.total), Some(2));
    assert_eq!(report.auto.as_ref().map(|batch| batch.total), Some(1));
    assert_eq!(report.candidate_source, Some(CandidateOrigin::Primary));
    assert_eq!(report.candidate_count, 2);
    assert!(!report.cancelled());
}

#[tokio::test]
async fn scan_without_auto_sourcing_skips_the_feeds() {
    // Given: Auto sourcing is disabled
    let primary = FixedSource::new(&["AUTO"]);
    let engine = engine(gateway_with(&["MINE", "AUTO"]), primary.clone(), FixedSource::new(&[]));
    let request = ScanRequest::auto(SourcingMode::PennyOnly)
        .with_watchlist(symbols(&["MINE"]))
        .without_auto();

    // When: The scan runs
    let report = engine
        .scan(&request, None, &CancelFlag::new())
        .await
        .expect("scan should run");

    // Then: Only the watchlist is analyzed and no feed was called
    assert_eq!(primary.calls(), 0);
    assert_eq!(report.candidate_source, None);
    assert!(report.auto.is_none());
    assert_eq!(report.results.len(), 1);
}

#[tokio::test]
async fn scan_with_exhausted_sources_reports_no_data() {
    // Given: Both feeds come back empty and there is no watchlist
    let primary = FixedSource::new(&[]);
    let fallback = FixedSource::new(&[]);
    let engine = engine(gateway_with(&[]), primary.clone(), fallback.clone());

    // When: The scan runs
    let outcome = engine
        .scan(&ScanRequest::auto(SourcingMode::All), None, &CancelFlag::new())
        .await;

    // Then: The caller hears "no data", not "nothing to analyze"
    assert_eq!(outcome.expect_err("no candidates"), ScanError::NoCandidates);

    // And: The fallback was tried exactly once
    assert_eq!(primary.calls(), 1);
    assert_eq!(fallback.calls(), 1);
}

#[tokio::test]
async fn scan_with_an_empty_watchlist_and_no_auto_has_nothing_to_analyze() {
    // Given: Auto sourcing is off and the watchlist is empty
    let primary = FixedSource::new(&["AUTO"]);
    let engine = engine(gateway_with(&["AUTO"]), primary.clone(), FixedSource::new(&[]));
    let request = ScanRequest::auto(SourcingMode::All).without_auto();

    // When: The scan runs
    let outcome = engine.scan(&request, None, &CancelFlag::new()).await;

    // Then: The caller hears "nothing to analyze" and no feed was consulted
    assert_eq!(
        outcome.expect_err("empty input"),
        ScanError::Batch(BatchError::EmptyInput)
    );
    assert_eq!(primary.calls(), 0);
}

#[tokio::test]
async fn scan_applies_the_requested_criteria() {
    // Given: A minimum score nobody can reach
    let engine = engine(
        gateway_with(&["AUTO"]),
        FixedSource::new(&["AUTO"]),
        FixedSource::new(&[]),
    );
    let request = ScanRequest::auto(SourcingMode::All).with_criteria(FilterCriteria {
        min_score: 101,
        ..FilterCriteria::default()
    });

    // When: The scan runs
    let report = engine
        .scan(&request, None, &CancelFlag::new())
        .await
        .expect("scan should run");

    // Then: The symbol was analyzed but filtered out, which is not an error
    assert!(report.results.is_empty());
    let auto = report.auto.expect("auto batch ran");
    assert_eq!(auto.analyzed, 1);
    assert_eq!(auto.rejected_by_filter, 1);
}

// =============================================================================
// Candidate caching
// =============================================================================

#[tokio::test]
async fn cached_candidates_are_reused_until_invalidated() {
    // Given: A caller-owned cache
    let primary = FixedSource::new(&["AAAA", "BBBB"]);
    let engine = engine(gateway_with(&[]), primary.clone(), FixedSource::new(&[]));
    let cache = engine.candidate_cache();
    assert_eq!(cache.ttl(), Duration::from_secs(300));

    // When: Candidates are requested twice
    let first = engine.candidates_cached(SourcingMode::All, &cache).await;
    let second = engine.candidates_cached(SourcingMode::All, &cache).await;

    // Then: The feed was hit once and both calls agree
    assert_eq!(primary.calls(), 1);
    assert_eq!(first, second);

    // And: Another mode, or an invalidated entry, goes back to the feed
    engine.candidates_cached(SourcingMode::PennyOnly, &cache).await;
    cache.invalidate(SourcingMode::All).await;
    engine.candidates_cached(SourcingMode::All, &cache).await;
    assert_eq!(primary.calls(), 3);
}

// =============================================================================
// Configuration
// =============================================================================

#[tokio::test]
async fn engine_loads_partial_config_from_disk() {
    // Given: A config file that only tunes concurrency and the penny ceiling
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(
        file,
        r#"{{"batch": {{"concurrency": 2}}, "sourcing": {{"penny_ceiling": 5.0}}}}"#
    )
    .expect("write config");

    // When: The engine is built from it
    let config = EngineConfig::from_json_file(file.path()).expect("config should load");
    let engine = ScreenerEngine::from_config(config).expect("config is valid");

    // Then: Tuned values apply and everything else keeps its default
    assert_eq!(engine.config().batch.concurrency, 2);
    assert_eq!(engine.config().sourcing.penny_ceiling, 5.0);
    assert_eq!(engine.config().scoring.min_history_bars, 50);
    assert_eq!(engine.health().await.state, HealthState::Healthy);
}

#[test]
fn invalid_config_is_rejected_before_any_request() {
    // Given: A config file asking for zero concurrency
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, r#"{{"batch": {{"concurrency": 0}}}}"#).expect("write config");
    let config = EngineConfig::from_json_file(file.path()).expect("file parses");

    // When: The engine is built
    let outcome = ScreenerEngine::from_config(config);

    // Then: Construction fails with a config error
    assert!(matches!(outcome, Err(ConfigError::Invalid(_))));
}

#[test]
fn malformed_config_file_reports_its_path() {
    // Given: A file that is not JSON
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, "concurrency = 4").expect("write config");

    // When: It is loaded
    let error = EngineConfig::from_json_file(file.path()).expect_err("not json");

    // Then: The error names the file
    assert!(matches!(error, ConfigError::Parse { .. }));
    assert!(error
        .to_string()
        .contains(&file.path().display().to_string()));
}

// =============================================================================
// Offline wiring of the production adapters
// =============================================================================

fn chart_body(bars: usize) -> String {
    chart_body_closing_at(bars, 4.9)
}

/// `bars` quiet days at $2, then a breakout day trading 4.0-5.0 that closes at `close`.
fn chart_body_closing_at(bars: usize, close: f64) -> String {
    let timestamps: Vec<i64> = (0..bars as i64).map(|i| 1_700_000_000 + i * 86_400).collect();
    let last = bars - 1;
    let pick = |quiet: f64, today: f64| -> Vec<f64> {
        (0..bars).map(|i| if i == last { today } else { quiet }).collect()
    };
    serde_json::json!({
        "chart": {
            "result": [{
                "timestamp": timestamps,
                "indicators": { "quote": [{
                    "open": pick(2.0, 4.1),
                    "high": pick(2.1, 5.0),
                    "low": pick(1.9, 4.0),
                    "close": pick(2.0, close),
                    "volume": pick(500_000.0, 9_000_000.0),
                }]}
            }],
            "error": null
        }
    })
    .to_string()
}

/// Default engine wired to canned Yahoo responses for a single ticker, ROTA.
fn offline_engine(chart: String) -> (Arc<StaticHttpClient>, ScreenerEngine) {
    let screener = "https://query2.finance.yahoo.com/v1/finance/screener/predefined/saved";
    let http = Arc::new(
        StaticHttpClient::new()
            .route(
                format!("{screener}?count=100&scrIds=day_gainers"),
                HttpResponse::ok(
                    r#"{"finance":{"result":[{"quotes":[{"symbol":"ROTA","regularMarketPrice":5.0}]}]}}"#,
                ),
            )
            .route(
                "https://query1.finance.yahoo.com/v7/finance/quote",
                HttpResponse::ok(
                    r#"{"quoteResponse":{"result":[{"symbol":"ROTA","regularMarketPrice":5.0}],"error":null}}"#,
                ),
            )
            .route(
                "https://query1.finance.yahoo.com/v8/finance/chart/ROTA",
                HttpResponse::ok(chart),
            )
            .route(
                "https://query1.finance.yahoo.com/v10/finance/quoteSummary/ROTA",
                HttpResponse::ok(
                    r#"{"quoteSummary":{"result":[{"defaultKeyStatistics":{"floatShares":{"raw":3000000}}}],"error":null}}"#,
                ),
            ),
    );
    let engine = ScreenerEngine::builder(EngineConfig::default())
        .with_http_client(http.clone())
        .build()
        .expect("default config is valid");
    (http, engine)
}

#[tokio::test]
async fn production_adapters_run_a_scan_over_a_static_transport() {
    // Given: The default engine wired to canned Yahoo responses
    let (http, engine) = offline_engine(chart_body(60));

    // When: A full auto scan runs
    let report = engine
        .scan(&ScanRequest::auto(SourcingMode::All), None, &CancelFlag::new())
        .await
        .expect("scan should run");

    // Then: The sourced ticker is scored from the fetched data
    assert_eq!(report.candidate_source, Some(CandidateOrigin::Primary));
    assert_eq!(report.results.len(), 1);
    let result = &report.results[0];
    assert_eq!(result.symbol, symbol("ROTA"));
    assert_eq!(result.float_millions, 3.0);
    assert_eq!(result.score, 95);
    assert_eq!(result.origin, Some(Origin::Auto));

    // And: The fallback listing pages were never requested
    assert_eq!(http.hits("https://stockanalysis.com"), 0);
}

#[tokio::test]
async fn live_bar_closing_above_its_high_is_still_scored_as_today() {
    // Given: Yahoo reports today's close a tick above today's high
    let (_, engine) = offline_engine(chart_body_closing_at(60, 5.0001));

    // When: The ticker is analyzed
    let result = engine
        .analyze(&symbol("ROTA"))
        .await
        .expect("analysis should succeed");

    // Then: The breakout day is still "today" and scores like the clean fixture
    assert!(result.rvol > 5.0);
    assert_eq!(result.breakdown.float_rotation, 25);
    assert_eq!(result.close_position_pct, 100.0);
    assert_eq!(result.score, 95);
}
