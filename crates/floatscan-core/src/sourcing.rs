//! Candidate sourcing.
//!
//! Builds the universe of tickers to analyze from a primary screener feed,
//! falling back to scraped listing pages when the feed yields nothing.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::gateway::SourceFuture;
use crate::{Symbol, ValidationError};

/// Which candidate universe to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourcingMode {
    All,
    PennyOnly,
}

impl SourcingMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::PennyOnly => "penny_only",
        }
    }
}

impl Display for SourcingMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which source produced a candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateOrigin {
    Primary,
    Fallback,
}

impl CandidateOrigin {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

impl Display for CandidateOrigin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sorted, duplicate-free symbols plus the source that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSet {
    symbols: Vec<Symbol>,
    pub source: CandidateOrigin,
}

impl CandidateSet {
    pub fn new(symbols: impl IntoIterator<Item = Symbol>, source: CandidateOrigin) -> Self {
        let unique: BTreeSet<Symbol> = symbols.into_iter().collect();
        Self {
            symbols: unique.into_iter().collect(),
            source,
        }
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn into_symbols(self) -> Vec<Symbol> {
        self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// An empty set is the "no data available" outcome.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.symbols.binary_search(symbol).is_ok()
    }
}

/// One predefined Yahoo screener and how many rows to request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenerEndpoint {
    pub scr_id: String,
    pub count: u32,
    /// Only requested in [`SourcingMode::PennyOnly`].
    #[serde(default)]
    pub penny_only: bool,
}

impl ScreenerEndpoint {
    pub fn new(scr_id: impl Into<String>, count: u32) -> Self {
        Self {
            scr_id: scr_id.into(),
            count,
            penny_only: false,
        }
    }

    pub fn penny_only(mut self) -> Self {
        self.penny_only = true;
        self
    }

    pub fn applies_to(&self, mode: SourcingMode) -> bool {
        !self.penny_only || mode == SourcingMode::PennyOnly
    }
}

/// Sourcing settings: endpoints, fallback pages and the penny ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcingConfig {
    pub screener_url: String,
    pub endpoints: Vec<ScreenerEndpoint>,
    /// Symbols quoted above this price are dropped in penny mode.
    pub penny_ceiling: f64,
    pub general_pages: Vec<String>,
    pub penny_pages: Vec<String>,
    pub cache_ttl_secs: u64,
}

impl Default for SourcingConfig {
    fn default() -> Self {
        Self {
            screener_url: String::from(
                "https://query2.finance.yahoo.com/v1/finance/screener/predefined/saved",
            ),
            endpoints: vec![
                ScreenerEndpoint::new("day_gainers", 100),
                ScreenerEndpoint::new("most_actives", 50),
                ScreenerEndpoint::new("small_cap_gainers", 100).penny_only(),
            ],
            penny_ceiling: 20.0,
            general_pages: vec![
                String::from("https://stockanalysis.com/markets/gainers/"),
                String::from("https://stockanalysis.com/markets/active/"),
            ],
            penny_pages: vec![String::from("https://stockanalysis.com/list/penny-stocks/")],
            cache_ttl_secs: 300,
        }
    }
}

impl SourcingConfig {
    pub fn pages_for(&self, mode: SourcingMode) -> &[String] {
        match mode {
            SourcingMode::All => &self.general_pages,
            SourcingMode::PennyOnly => &self.penny_pages,
        }
    }

    /// Applies the penny ceiling; unknown prices pass.
    pub fn admits_price(&self, mode: SourcingMode, price: Option<f64>) -> bool {
        match (mode, price) {
            (SourcingMode::PennyOnly, Some(price)) => price <= self.penny_ceiling,
            _ => true,
        }
    }
}

/// A feed of candidate symbols.
///
/// Implementations swallow per-endpoint failures themselves; an `Err` means
/// the whole source was unusable.
pub trait CandidateSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn fetch<'a>(&'a self, mode: SourcingMode) -> SourceFuture<'a, Vec<Symbol>>;
}

/// Primary source with a single fallback.
#[derive(Clone)]
pub struct CandidateSourcer {
    primary: Arc<dyn CandidateSource>,
    fallback: Arc<dyn CandidateSource>,
}

impl CandidateSourcer {
    pub fn new(primary: Arc<dyn CandidateSource>, fallback: Arc<dyn CandidateSource>) -> Self {
        Self { primary, fallback }
    }

    /// Fetches candidates, consulting the fallback at most once and only
    /// when the primary produced no symbols.
    pub async fn fetch_candidates(&self, mode: SourcingMode) -> CandidateSet {
        let primary = collect(self.primary.as_ref(), mode).await;
        if !primary.is_empty() {
            let set = CandidateSet::new(primary, CandidateOrigin::Primary);
            info!(%mode, count = set.len(), source = self.primary.name(), "sourced candidates");
            return set;
        }

        warn!(%mode, source = self.primary.name(), "primary feed returned no symbols, using fallback");
        let fallback = collect(self.fallback.as_ref(), mode).await;
        let set = CandidateSet::new(fallback, CandidateOrigin::Fallback);
        if set.is_empty() {
            warn!(%mode, "no candidates from any source");
        } else {
            info!(%mode, count = set.len(), source = self.fallback.name(), "sourced candidates");
        }
        set
    }
}

async fn collect(source: &dyn CandidateSource, mode: SourcingMode) -> Vec<Symbol> {
    match source.fetch(mode).await {
        Ok(symbols) => symbols,
        Err(error) => {
            warn!(source = source.name(), %error, "candidate source failed");
            Vec::new()
        }
    }
}

/// Outcome of parsing a free-form watchlist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watchlist {
    /// Accepted symbols in first-seen order.
    pub symbols: Vec<Symbol>,
    pub rejected: Vec<(String, ValidationError)>,
}

/// Splits `input` on commas and whitespace into normalized symbols.
pub fn parse_watchlist(input: &str) -> Watchlist {
    let mut seen = BTreeSet::new();
    let mut watchlist = Watchlist::default();

    for token in input
        .split(|ch: char| ch == ',' || ch.is_whitespace())
        .filter(|token| !token.is_empty())
    {
        match Symbol::parse(token) {
            Ok(symbol) => {
                if seen.insert(symbol.clone()) {
                    watchlist.symbols.push(symbol);
                }
            }
            Err(error) => watchlist.rejected.push((token.to_owned(), error)),
        }
    }

    watchlist
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(values: &[&str]) -> Vec<Symbol> {
        values
            .iter()
            .map(|value| Symbol::parse(value).expect("valid symbol"))
            .collect()
    }

    #[test]
    fn candidate_set_sorts_and_dedups() {
        let set = CandidateSet::new(symbols(&["MSFT", "AAPL", "MSFT"]), CandidateOrigin::Primary);
        assert_eq!(set.symbols(), symbols(&["AAPL", "MSFT"]).as_slice());
        assert!(set.contains(&symbols(&["MSFT"])[0]));
    }

    #[test]
    fn watchlist_splits_normalizes_and_reports_rejects() {
        let watchlist = parse_watchlist(" abc, def  ghi,ABC,,brk.b ");

        assert_eq!(watchlist.symbols, symbols(&["ABC", "DEF", "GHI"]));
        assert_eq!(watchlist.rejected.len(), 1);
        assert_eq!(watchlist.rejected[0].0, "brk.b");
    }

    #[test]
    fn penny_ceiling_only_applies_in_penny_mode() {
        let config = SourcingConfig::default();
        assert!(config.admits_price(SourcingMode::All, Some(120.0)));
        assert!(!config.admits_price(SourcingMode::PennyOnly, Some(20.01)));
        assert!(config.admits_price(SourcingMode::PennyOnly, Some(20.0)));
        assert!(config.admits_price(SourcingMode::PennyOnly, None));
    }

    #[test]
    fn small_cap_endpoint_is_penny_only() {
        let config = SourcingConfig::default();
        let all: Vec<_> = config
            .endpoints
            .iter()
            .filter(|endpoint| endpoint.applies_to(SourcingMode::All))
            .map(|endpoint| endpoint.scr_id.as_str())
            .collect();
        assert_eq!(all, ["day_gainers", "most_actives"]);
        assert_eq!(
            config
                .endpoints
                .iter()
                .filter(|endpoint| endpoint.applies_to(SourcingMode::PennyOnly))
                .count(),
            3
        );
    }
}
