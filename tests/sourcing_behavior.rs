//! Behavior-driven tests for candidate sourcing
//!
//! These tests verify WHAT universe of tickers a scan starts from when the
//! screener feed works, partially fails, or fails completely.

use std::sync::Arc;

use floatscan_core::{
    CandidateOrigin, CandidateSourcer, HtmlListingSource, HttpError, HttpResponse,
    SourcingConfig, SourcingMode, StaticHttpClient, Symbol, YahooScreenerSource,
};

const SCREENER: &str = "https://query2.finance.yahoo.com/v1/finance/screener/predefined/saved";
const GAINERS_PAGE: &str = "https://stockanalysis.com/markets/gainers/";
const ACTIVE_PAGE: &str = "https://stockanalysis.com/markets/active/";
const PENNY_PAGE: &str = "https://stockanalysis.com/list/penny-stocks/";

fn screener_url(scr_id: &str) -> String {
    let count = match scr_id {
        "most_actives" => 50,
        _ => 100,
    };
    format!("{SCREENER}?count={count}&scrIds={scr_id}")
}

fn screener_body(quotes: &[(&str, f64)]) -> String {
    let quotes: Vec<serde_json::Value> = quotes
        .iter()
        .map(|(symbol, price)| {
            serde_json::json!({
                "symbol": symbol,
                "regularMarketPrice": { "raw": price, "fmt": format!("{price:.2}") },
            })
        })
        .collect();
    serde_json::json!({
        "finance": { "result": [ { "quotes": quotes } ], "error": null }
    })
    .to_string()
}

fn listing_page(symbols: &[&str]) -> String {
    let rows: String = symbols
        .iter()
        .enumerate()
        .map(|(i, symbol)| {
            format!(
                "<tr><td>{}</td><td>{symbol}</td><td>{symbol} Holdings</td><td>${}.25</td></tr>",
                i + 1,
                i + 1
            )
        })
        .collect();
    format!(
        "<html><body><table><thead><tr><th>No.</th><th>Symbol</th><th>Company Name</th>\
         <th>Price</th></tr></thead><tbody>{rows}</tbody></table></body></html>"
    )
}

fn sourcer(http: &Arc<StaticHttpClient>) -> CandidateSourcer {
    let config = SourcingConfig::default();
    CandidateSourcer::new(
        Arc::new(YahooScreenerSource::new(http.clone(), config.clone())),
        Arc::new(HtmlListingSource::new(http.clone(), config)),
    )
}

fn symbols(values: &[&str]) -> Vec<Symbol> {
    values
        .iter()
        .map(|value| Symbol::parse(value).expect("valid symbol"))
        .collect()
}

// =============================================================================
// Primary feed
// =============================================================================

#[tokio::test]
async fn screener_symbols_are_merged_sorted_and_deduplicated() {
    // Given: Two screeners that overlap on one ticker and include a warrant
    let http = Arc::new(
        StaticHttpClient::new()
            .route(
                screener_url("day_gainers"),
                HttpResponse::ok(screener_body(&[("MULN", 0.4), ("ABCD", 3.2), ("BRK.B", 400.0)])),
            )
            .route(
                screener_url("most_actives"),
                HttpResponse::ok(screener_body(&[("ABCD", 3.2), ("ZZZ", 12.0)])),
            ),
    );

    // When: The user fetches the general universe
    let set = sourcer(&http).fetch_candidates(SourcingMode::All).await;

    // Then: Each ticker appears once, in sorted order, from the primary feed
    assert_eq!(set.source, CandidateOrigin::Primary);
    assert_eq!(set.symbols(), symbols(&["ABCD", "MULN", "ZZZ"]).as_slice());

    // And: The penny-only screener and the fallback pages were never touched
    assert_eq!(http.hits(&screener_url("small_cap_gainers")), 0);
    assert_eq!(http.hits("https://stockanalysis.com"), 0);
}

#[tokio::test]
async fn one_failing_screener_does_not_empty_the_universe() {
    // Given: day_gainers is down but most_actives answers
    let http = Arc::new(
        StaticHttpClient::new()
            .route(screener_url("day_gainers"), HttpResponse::with_status(503, "unavailable"))
            .route(
                screener_url("most_actives"),
                HttpResponse::ok(screener_body(&[("EFGH", 4.0)])),
            ),
    );

    // When: Candidates are fetched
    let set = sourcer(&http).fetch_candidates(SourcingMode::All).await;

    // Then: The surviving screener still counts as a primary result
    assert_eq!(set.source, CandidateOrigin::Primary);
    assert_eq!(set.symbols(), symbols(&["EFGH"]).as_slice());
    assert_eq!(http.hits("https://stockanalysis.com"), 0);
}

#[tokio::test]
async fn penny_mode_adds_small_caps_and_drops_expensive_tickers() {
    // Given: Screeners returning tickers on both sides of the $20 ceiling
    let http = Arc::new(
        StaticHttpClient::new()
            .route(
                screener_url("day_gainers"),
                HttpResponse::ok(screener_body(&[("CHEAP", 1.5), ("PRICEY", 45.0)])),
            )
            .route(
                screener_url("most_actives"),
                HttpResponse::ok(screener_body(&[("EDGE", 20.0), ("OVER", 20.01)])),
            )
            .route(
                screener_url("small_cap_gainers"),
                HttpResponse::ok(screener_body(&[("TINY", 0.8)])),
            ),
    );

    // When: The user asks for penny stocks only
    let set = sourcer(&http).fetch_candidates(SourcingMode::PennyOnly).await;

    // Then: Only tickers at or under the ceiling survive
    assert_eq!(set.symbols(), symbols(&["CHEAP", "EDGE", "TINY"]).as_slice());
    assert_eq!(http.hits(&screener_url("small_cap_gainers")), 1);
}

// =============================================================================
// Fallback
// =============================================================================

#[tokio::test]
async fn failed_screeners_fall_back_to_listing_pages() {
    // Given: Both primary endpoints fail with HTTP errors
    let http = Arc::new(
        StaticHttpClient::new()
            .route(screener_url("day_gainers"), HttpResponse::with_status(500, "boom"))
            .route_error(screener_url("most_actives"), HttpError::timeout("timed out"))
            // And: The listing pages hold 12 unique symbols between them
            .route(
                GAINERS_PAGE,
                HttpResponse::ok(listing_page(&[
                    "AAAA", "BBBB", "CCCC", "DDDD", "EEEE", "FFFF", "GGGG",
                ])),
            )
            .route(
                ACTIVE_PAGE,
                HttpResponse::ok(listing_page(&[
                    "FFFF", "GGGG", "HHHH", "IIII", "JJJJ", "KKKK", "LLLL",
                ])),
            ),
    );

    // When: The user fetches the general universe
    let set = sourcer(&http).fetch_candidates(SourcingMode::All).await;

    // Then: All 12 symbols come back, labelled as fallback
    assert_eq!(set.source, CandidateOrigin::Fallback);
    assert_eq!(set.len(), 12);
    assert_eq!(
        set.symbols(),
        symbols(&[
            "AAAA", "BBBB", "CCCC", "DDDD", "EEEE", "FFFF", "GGGG", "HHHH", "IIII", "JJJJ",
            "KKKK", "LLLL",
        ])
        .as_slice()
    );

    // And: The fallback was consulted exactly once
    assert_eq!(http.hits(GAINERS_PAGE), 1);
    assert_eq!(http.hits(ACTIVE_PAGE), 1);
}

#[tokio::test]
async fn empty_screener_payloads_also_trigger_the_fallback() {
    // Given: Screeners that answer successfully but with no quotes
    let http = Arc::new(
        StaticHttpClient::new()
            .route(screener_url("day_gainers"), HttpResponse::ok(screener_body(&[])))
            .route(screener_url("most_actives"), HttpResponse::ok(r#"{"finance":{"result":null}}"#))
            .route(
                screener_url("small_cap_gainers"),
                HttpResponse::ok(screener_body(&[])),
            )
            .route(PENNY_PAGE, HttpResponse::ok(listing_page(&["PENY", "CENT"]))),
    );

    // When: Penny candidates are fetched
    let set = sourcer(&http).fetch_candidates(SourcingMode::PennyOnly).await;

    // Then: The penny listing page supplies the universe
    assert_eq!(set.source, CandidateOrigin::Fallback);
    assert_eq!(set.symbols(), symbols(&["CENT", "PENY"]).as_slice());
    assert_eq!(http.hits(GAINERS_PAGE), 0);
}

#[tokio::test]
async fn total_outage_yields_an_empty_fallback_set() {
    // Given: Nothing is reachable
    let http = Arc::new(StaticHttpClient::new());

    // When: Candidates are fetched
    let set = sourcer(&http).fetch_candidates(SourcingMode::All).await;

    // Then: The caller gets an empty set it can report as "no data"
    assert!(set.is_empty());
    assert_eq!(set.source, CandidateOrigin::Fallback);

    // And: Each fallback page was still tried only once
    assert_eq!(http.hits(GAINERS_PAGE), 1);
    assert_eq!(http.hits(ACTIVE_PAGE), 1);
}
