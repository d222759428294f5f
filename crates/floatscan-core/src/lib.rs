//! # Floatscan Core
//!
//! Supply/demand shock screening for low-float equities.
//!
//! ## Overview
//!
//! This crate provides the building blocks behind the `floatscan` CLI:
//!
//! - **Candidate sourcing** from Yahoo predefined screeners with an HTML
//!   listing fallback
//! - **Market data gateway** over Yahoo quote, chart and quote-summary
//!   endpoints
//! - **Indicators and scoring** that turn daily bars and float data into a
//!   0-100 score with a volatility-based stop
//! - **Batch orchestration** with bounded concurrency, ordered results and
//!   throttle-aware slowdown
//! - **Circuit breaker, retry and throttling** around every upstream call
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Yahoo gateway, Yahoo screener feed, HTML listing fallback |
//! | [`analyzer`] | Per-symbol fetch and evaluate |
//! | [`batch`] | Concurrent batch runs with filtering and progress |
//! | [`cache`] | Caller-owned candidate cache |
//! | [`circuit_breaker`] | Circuit breaker for upstream calls |
//! | [`config`] | Layered engine configuration |
//! | [`domain`] | Symbols, bars, fundamentals |
//! | [`engine`] | Facade wiring everything together |
//! | [`error`] | Core error types |
//! | [`gateway`] | Market data gateway trait and source errors |
//! | [`http_client`] | HTTP client abstraction |
//! | [`indicators`] | SMA, RSI, ATR, relative volume |
//! | [`presentation`] | Export rows and display hints |
//! | [`retry`] | Retry policy and backoff |
//! | [`scoring`] | Scoring rules and analysis results |
//! | [`sourcing`] | Candidate sources, fallback and watchlists |
//! | [`throttling`] | Client-side request quota |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use floatscan_core::{EngineConfig, ScreenerEngine, SourcingMode, Symbol};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = ScreenerEngine::from_config(EngineConfig::default())?;
//!
//!     let candidates = engine.fetch_candidates(SourcingMode::All).await;
//!     println!("{} candidates from {}", candidates.len(), candidates.source);
//!
//!     let result = engine.analyze(&Symbol::parse("ABCD")?).await?;
//!     println!("{} scored {}", result.symbol, result.score);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / User     │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ ScreenerEngine  │────▶│ CandidateSourcer │──▶ screener / HTML fallback
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ BatchOrchestr.  │────▶│ SymbolAnalyzer   │
//! └─────────────────┘     └────────┬─────────┘
//!                                  │
//!                                  ▼
//!                         ┌──────────────────┐     ┌─────────────────┐
//!                         │ YahooGateway     │────▶│ Circuit Breaker │
//!                         └──────────────────┘     └─────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Per-symbol failures surface as [`AnalysisError`] and are skipped by the
//! batch runner; upstream failures carry a [`SourceErrorKind`]:
//!
//! ```rust
//! use floatscan_core::{AnalysisError, SourceErrorKind};
//!
//! fn describe(error: &AnalysisError) -> &'static str {
//!     match error {
//!         AnalysisError::Source(source) if source.kind() == SourceErrorKind::RateLimited => {
//!             "throttled"
//!         }
//!         AnalysisError::InsufficientHistory { .. } => "too new",
//!         _ => "skipped",
//!     }
//! }
//! ```

pub mod adapters;
pub mod analyzer;
pub mod batch;
pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod http_client;
pub mod indicators;
pub mod presentation;
pub mod retry;
pub mod scoring;
pub mod sourcing;
pub mod throttling;

// Adapter implementations
pub use adapters::{HtmlListingSource, YahooGateway, YahooScreenerSource};

pub use analyzer::SymbolAnalyzer;

// Batch orchestration
pub use batch::{
    BatchConfig, BatchOrchestrator, BatchProgress, BatchReport, CancelFlag, FilterCriteria,
};

pub use cache::{CandidateCache, TimedValue};

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

pub use config::{EngineConfig, HttpConfig};

// Domain models
pub use domain::{
    Bar, BarSeries, FundamentalProfile, HistoryRange, MarketSnapshot, Quote, ResolvedFloat,
    Symbol, UtcDateTime,
};

pub use engine::{ScanReport, ScanRequest, ScreenerEngine, ScreenerEngineBuilder};

// Error types
pub use error::{
    AnalysisError, BatchError, ConfigError, CoreError, ScanError, ValidationError,
};

// Gateway trait and types
pub use gateway::{
    HealthState, HealthStatus, InMemoryGateway, MarketDataGateway, SourceError, SourceErrorKind,
};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient, StaticHttpClient,
};

pub use indicators::IndicatorSet;

pub use presentation::{hints, rows_by_score, FloatTier, PresentationHints, ResultRow, ScoreTier};

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Scoring
pub use scoring::{evaluate, AnalysisResult, Origin, ScoreBreakdown, ScoreWeights, ScoringConfig};

// Sourcing
pub use sourcing::{
    parse_watchlist, CandidateOrigin, CandidateSet, CandidateSource, CandidateSourcer,
    ScreenerEndpoint, SourcingConfig, SourcingMode, Watchlist,
};

// Throttling
pub use throttling::{RequestThrottle, ThrottlePolicy};
