//! Screener engine facade.
//!
//! Wires sourcing, analysis and batching from one [`EngineConfig`]. The
//! engine keeps no state between calls; callers own candidate sets, caches
//! and reports.
//!
//! # Example
//!
//! ```rust,ignore
//! use floatscan_core::{CancelFlag, EngineConfig, ScanRequest, ScreenerEngine, SourcingMode};
//!
//! let engine = ScreenerEngine::from_config(EngineConfig::default())?;
//! let request = ScanRequest::auto(SourcingMode::PennyOnly);
//! let report = engine.scan(&request, None, &CancelFlag::new()).await?;
//! for result in &report.results {
//!     println!("{} {}", result.symbol, result.score);
//! }
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

use crate::adapters::{HtmlListingSource, YahooGateway, YahooScreenerSource};
use crate::analyzer::SymbolAnalyzer;
use crate::batch::{BatchOrchestrator, BatchProgress, BatchReport, CancelFlag, FilterCriteria};
use crate::cache::CandidateCache;
use crate::circuit_breaker::CircuitBreaker;
use crate::config::EngineConfig;
use crate::gateway::{HealthStatus, MarketDataGateway};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::scoring::{AnalysisResult, Origin};
use crate::sourcing::{
    CandidateOrigin, CandidateSet, CandidateSource, CandidateSourcer, SourcingMode,
};
use crate::throttling::RequestThrottle;
use crate::{AnalysisError, BatchError, ConfigError, ScanError, Symbol};

/// Inputs of one end-to-end scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub mode: SourcingMode,
    /// Source candidates automatically in addition to the watchlist.
    pub include_auto: bool,
    pub watchlist: Vec<Symbol>,
    pub criteria: FilterCriteria,
}

impl ScanRequest {
    pub fn auto(mode: SourcingMode) -> Self {
        Self {
            mode,
            include_auto: true,
            watchlist: Vec::new(),
            criteria: FilterCriteria::default(),
        }
    }

    pub fn with_watchlist(mut self, watchlist: Vec<Symbol>) -> Self {
        self.watchlist = watchlist;
        self
    }

    pub fn with_criteria(mut self, criteria: FilterCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn without_auto(mut self) -> Self {
        self.include_auto = false;
        self
    }
}

/// Outcome of [`ScreenerEngine::scan`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    /// `None` when auto sourcing was disabled.
    pub candidate_source: Option<CandidateOrigin>,
    pub candidate_count: usize,
    pub manual: Option<BatchReport>,
    pub auto: Option<BatchReport>,
    /// Accepted results, manual first, each batch in input order.
    pub results: Vec<AnalysisResult>,
}

impl ScanReport {
    pub fn cancelled(&self) -> bool {
        [&self.manual, &self.auto]
            .into_iter()
            .flatten()
            .any(|report| report.cancelled)
    }
}

/// Entry point for sourcing, analysis and batch scans.
#[derive(Clone)]
pub struct ScreenerEngine {
    config: EngineConfig,
    gateway: Arc<dyn MarketDataGateway>,
    sourcer: CandidateSourcer,
    analyzer: SymbolAnalyzer,
    orchestrator: BatchOrchestrator,
}

impl ScreenerEngine {
    /// Builds the production engine: Yahoo gateway, Yahoo screeners and the
    /// HTML listing fallback over one shared reqwest client.
    pub fn from_config(config: EngineConfig) -> Result<Self, ConfigError> {
        ScreenerEngineBuilder::new(config).build()
    }

    pub fn builder(config: EngineConfig) -> ScreenerEngineBuilder {
        ScreenerEngineBuilder::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn fetch_candidates(&self, mode: SourcingMode) -> CandidateSet {
        self.sourcer.fetch_candidates(mode).await
    }

    /// An empty cache using the configured candidate TTL.
    pub fn candidate_cache(&self) -> CandidateCache {
        CandidateCache::new(Duration::from_secs(self.config.sourcing.cache_ttl_secs))
    }

    /// Returns the cached set for `mode` while fresh, otherwise refetches and
    /// stores the new set.
    pub async fn candidates_cached(
        &self,
        mode: SourcingMode,
        cache: &CandidateCache,
    ) -> CandidateSet {
        if let Some(set) = cache.fresh(mode).await {
            return set;
        }
        let set = self.fetch_candidates(mode).await;
        cache.store(mode, set.clone()).await;
        set
    }

    pub async fn analyze(&self, symbol: &Symbol) -> Result<AnalysisResult, AnalysisError> {
        self.analyzer.analyze(symbol).await
    }

    pub async fn run_batch(
        &self,
        symbols: &[Symbol],
        origin: Origin,
        criteria: &FilterCriteria,
        progress: Option<&UnboundedSender<BatchProgress>>,
        cancel: &CancelFlag,
    ) -> Result<BatchReport, BatchError> {
        self.orchestrator
            .run(symbols, origin, criteria, progress, cancel)
            .await
    }

    /// Sources candidates, merges them with the watchlist and runs one batch
    /// per origin.
    ///
    /// A symbol on the watchlist is analyzed once, as manual, even when the
    /// screeners also return it. Fails with [`ScanError::NoCandidates`] when
    /// sourcing found nothing and the watchlist is empty, and with
    /// [`BatchError::EmptyInput`] when auto sourcing is off and the watchlist
    /// is empty.
    pub async fn scan(
        &self,
        request: &ScanRequest,
        progress: Option<&UnboundedSender<BatchProgress>>,
        cancel: &CancelFlag,
    ) -> Result<ScanReport, ScanError> {
        let mut seen = BTreeSet::new();
        let manual: Vec<Symbol> = request
            .watchlist
            .iter()
            .filter(|symbol| seen.insert((*symbol).clone()))
            .cloned()
            .collect();

        let candidates = if request.include_auto {
            Some(self.fetch_candidates(request.mode).await)
        } else {
            None
        };
        let auto: Vec<Symbol> = candidates
            .as_ref()
            .map(|set| {
                set.symbols()
                    .iter()
                    .filter(|symbol| !seen.contains(*symbol))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if manual.is_empty() && auto.is_empty() {
            return Err(match candidates {
                Some(_) => ScanError::NoCandidates,
                None => ScanError::Batch(BatchError::EmptyInput),
            });
        }
        info!(
            mode = %request.mode,
            manual = manual.len(),
            auto = auto.len(),
            "starting scan"
        );

        let manual_report = if manual.is_empty() {
            None
        } else {
            Some(
                self.run_batch(&manual, Origin::Manual, &request.criteria, progress, cancel)
                    .await?,
            )
        };
        let auto_report = if auto.is_empty() {
            None
        } else {
            Some(
                self.run_batch(&auto, Origin::Auto, &request.criteria, progress, cancel)
                    .await?,
            )
        };

        let results = [&manual_report, &auto_report]
            .into_iter()
            .flatten()
            .flat_map(|report| report.results.iter().cloned())
            .collect();

        Ok(ScanReport {
            candidate_source: candidates.as_ref().map(|set| set.source),
            candidate_count: candidates.as_ref().map_or(0, CandidateSet::len),
            manual: manual_report,
            auto: auto_report,
            results,
        })
    }

    pub async fn health(&self) -> HealthStatus {
        self.gateway.health().await
    }
}

/// Assembles a [`ScreenerEngine`], defaulting every collaborator that is not
/// injected to its production implementation.
pub struct ScreenerEngineBuilder {
    config: EngineConfig,
    http_client: Option<Arc<dyn HttpClient>>,
    gateway: Option<Arc<dyn MarketDataGateway>>,
    primary: Option<Arc<dyn CandidateSource>>,
    fallback: Option<Arc<dyn CandidateSource>>,
}

impl ScreenerEngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            http_client: None,
            gateway: None,
            primary: None,
            fallback: None,
        }
    }

    /// Transport used by every default collaborator.
    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn MarketDataGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn with_primary_source(mut self, source: Arc<dyn CandidateSource>) -> Self {
        self.primary = Some(source);
        self
    }

    pub fn with_fallback_source(mut self, source: Arc<dyn CandidateSource>) -> Self {
        self.fallback = Some(source);
        self
    }

    pub fn build(self) -> Result<ScreenerEngine, ConfigError> {
        let config = self.config;
        config.validate()?;

        let http = &config.http;
        let http_client: Arc<dyn HttpClient> = self
            .http_client
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new(&http.user_agent)));

        let gateway = self.gateway.unwrap_or_else(|| {
            Arc::new(
                YahooGateway::new(http_client.clone())
                    .with_retry(http.retry())
                    .with_throttle(RequestThrottle::from_policy(&http.throttle))
                    .with_circuit_breaker(Arc::new(CircuitBreaker::new(
                        "yahoo",
                        http.circuit_breaker(),
                    )))
                    .with_timeout_ms(http.timeout_ms),
            )
        });
        let primary = self.primary.unwrap_or_else(|| {
            Arc::new(
                YahooScreenerSource::new(http_client.clone(), config.sourcing.clone())
                    .with_timeout_ms(http.timeout_ms),
            )
        });
        let fallback = self.fallback.unwrap_or_else(|| {
            Arc::new(
                HtmlListingSource::new(http_client.clone(), config.sourcing.clone())
                    .with_timeout_ms(http.timeout_ms),
            )
        });

        let analyzer = SymbolAnalyzer::new(gateway.clone(), config.scoring);
        let orchestrator = BatchOrchestrator::new(analyzer.clone(), config.batch);

        Ok(ScreenerEngine {
            sourcer: CandidateSourcer::new(primary, fallback),
            gateway,
            analyzer,
            orchestrator,
            config,
        })
    }
}
