//! Batch orchestration.
//!
//! One coordinator owns dispatch, progress and filtering while analyses run
//! on a [`JoinSet`]. Completion order is arbitrary; results come back in
//! input order.
//!
//! When the provider starts failing with `Unavailable`/`RateLimited` several
//! times in a row, concurrency is halved (never below one) and the
//! coordinator pauses before dispatching again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::analyzer::SymbolAnalyzer;
use crate::retry::Backoff;
use crate::scoring::{AnalysisResult, Origin};
use crate::{AnalysisError, BatchError, Symbol};

/// Concurrency and backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub concurrency: usize,
    /// Consecutive throttle failures that trigger a slowdown.
    pub throttle_threshold: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            throttle_threshold: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 8_000,
        }
    }
}

impl BatchConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff::Exponential {
            base: Duration::from_millis(self.backoff_base_ms),
            factor: 2.0,
            max: Duration::from_millis(self.backoff_max_ms.max(self.backoff_base_ms)),
            jitter: true,
        }
    }
}

/// Acceptance filter applied to every analyzed symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    pub min_price: f64,
    pub max_price: f64,
    pub min_score: u8,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            min_price: 0.5,
            max_price: 50.0,
            min_score: 50,
        }
    }
}

impl FilterCriteria {
    pub fn accepts(&self, result: &AnalysisResult) -> bool {
        self.min_price <= result.price
            && result.price <= self.max_price
            && result.score >= self.min_score
    }
}

/// Emitted after each symbol completes; `index` runs 1..=total within one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub index: usize,
    pub total: usize,
    pub symbol: Symbol,
    pub origin: Origin,
}

/// Shared cancellation signal checked before each dispatch.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Accepted results in input order plus run counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub results: Vec<AnalysisResult>,
    pub total: usize,
    /// Symbols that produced a score, accepted or not.
    pub analyzed: usize,
    /// Symbols whose analysis failed.
    pub skipped: usize,
    pub rejected_by_filter: usize,
    pub cancelled: bool,
}

type TaskOutcome = (usize, Symbol, Result<AnalysisResult, SkipReason>);

#[derive(Debug)]
enum SkipReason {
    Analysis(AnalysisError),
    Panicked(String),
}

/// Runs analyses over a symbol list with bounded, adaptive concurrency.
#[derive(Clone)]
pub struct BatchOrchestrator {
    analyzer: SymbolAnalyzer,
    config: BatchConfig,
}

impl BatchOrchestrator {
    pub fn new(analyzer: SymbolAnalyzer, config: BatchConfig) -> Self {
        Self { analyzer, config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Analyzes `symbols`, keeping results that pass `criteria` stamped with `origin`.
    ///
    /// Per-symbol failures are counted, never returned. When `cancel` is set,
    /// no new symbols start and the partial report is returned.
    pub async fn run(
        &self,
        symbols: &[Symbol],
        origin: Origin,
        criteria: &FilterCriteria,
        progress: Option<&UnboundedSender<BatchProgress>>,
        cancel: &CancelFlag,
    ) -> Result<BatchReport, BatchError> {
        if symbols.is_empty() {
            return Err(BatchError::EmptyInput);
        }

        let total = symbols.len();
        let backoff = self.config.backoff();
        let mut limit = self.config.concurrency.max(1);
        let mut join_set: JoinSet<TaskOutcome> = JoinSet::new();
        let mut slots: Vec<Option<AnalysisResult>> = vec![None; total];

        let mut next = 0;
        let mut completed = 0;
        let mut analyzed = 0;
        let mut skipped = 0;
        let mut rejected_by_filter = 0;
        let mut cancelled = false;
        let mut throttle_streak = 0_u32;
        let mut slowdowns = 0_u32;
        let mut pause: Option<Duration> = None;

        loop {
            while join_set.len() < limit && next < total {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break;
                }
                if let Some(delay) = pause.take() {
                    tokio::time::sleep(delay).await;
                    continue;
                }

                self.dispatch(&mut join_set, next, symbols[next].clone());
                next += 1;
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            let (index, symbol, outcome) = match joined {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    // Only reachable if the coordinator's own wrapper task dies.
                    warn!(%join_error, "batch task failed");
                    completed += 1;
                    skipped += 1;
                    continue;
                }
            };

            completed += 1;
            match outcome {
                Ok(result) => {
                    throttle_streak = 0;
                    analyzed += 1;
                    if criteria.accepts(&result) {
                        slots[index] = Some(result.with_origin(origin));
                    } else {
                        rejected_by_filter += 1;
                    }
                }
                Err(SkipReason::Analysis(error)) => {
                    skipped += 1;
                    debug!(%symbol, %error, "skipping symbol");
                    if error.is_throttle_signal() {
                        throttle_streak += 1;
                    } else {
                        throttle_streak = 0;
                    }
                }
                Err(SkipReason::Panicked(message)) => {
                    skipped += 1;
                    throttle_streak = 0;
                    warn!(%symbol, %message, "analysis task panicked");
                }
            }

            if throttle_streak >= self.config.throttle_threshold.max(1) {
                limit = (limit / 2).max(1);
                let delay = backoff.delay(slowdowns);
                slowdowns = slowdowns.saturating_add(1);
                throttle_streak = 0;
                pause = Some(delay);
                warn!(concurrency = limit, ?delay, "provider throttling, slowing down");
            }

            if let Some(sender) = progress {
                // A dropped receiver only means nobody is watching.
                let _ = sender.send(BatchProgress {
                    index: completed,
                    total,
                    symbol,
                    origin,
                });
            }
        }

        if cancelled {
            info!(completed, total, "batch cancelled");
        }

        let results: Vec<AnalysisResult> = slots.into_iter().flatten().collect();
        info!(
            %origin,
            total,
            analyzed,
            skipped,
            accepted = results.len(),
            "batch finished"
        );

        Ok(BatchReport {
            results,
            total,
            analyzed,
            skipped,
            rejected_by_filter,
            cancelled,
        })
    }

    /// Spawns one analysis. The inner task isolates panics so every
    /// completion can still be attributed to its symbol.
    fn dispatch(&self, join_set: &mut JoinSet<TaskOutcome>, index: usize, symbol: Symbol) {
        let analyzer = self.analyzer.clone();
        join_set.spawn(async move {
            let task_symbol = symbol.clone();
            let outcome = tokio::spawn(async move { analyzer.analyze(&task_symbol).await })
                .await
                .map_err(|join_error| SkipReason::Panicked(join_error.to_string()))
                .and_then(|result| result.map_err(SkipReason::Analysis));
            (index, symbol, outcome)
        });
    }
}
