use std::sync::Arc;

use tracing::debug;

use crate::gateway::MarketDataGateway;
use crate::scoring::{evaluate, AnalysisResult, ScoringConfig};
use crate::{AnalysisError, MarketSnapshot, Symbol};

/// Fetches one symbol's market data and scores it.
#[derive(Clone)]
pub struct SymbolAnalyzer {
    gateway: Arc<dyn MarketDataGateway>,
    config: ScoringConfig,
}

impl SymbolAnalyzer {
    pub fn new(gateway: Arc<dyn MarketDataGateway>, config: ScoringConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Analyzes `symbol`.
    ///
    /// The quote price is preferred; when the quote fails or is not positive
    /// the last daily close stands in. Bars and fundamentals failures are
    /// returned as [`AnalysisError::Source`] so throttling stays visible to
    /// the batch orchestrator.
    pub async fn analyze(&self, symbol: &Symbol) -> Result<AnalysisResult, AnalysisError> {
        let quoted = match self.gateway.quote(symbol).await {
            Ok(quote) if quote.price > 0.0 => Some(quote.price),
            Ok(_) => None,
            Err(error) => {
                debug!(%symbol, %error, "quote unavailable, using last close");
                None
            }
        };

        let series = self
            .gateway
            .daily_bars(symbol, self.config.history_range)
            .await?;

        let current_price = quoted
            .or_else(|| series.last().map(|bar| bar.close).filter(|close| *close > 0.0))
            .ok_or(AnalysisError::PriceUnavailable)?;

        let required = self.config.min_history_bars.max(1);
        if series.len() < required {
            return Err(AnalysisError::InsufficientHistory {
                available: series.len(),
                required,
            });
        }

        let fundamentals = self.gateway.fundamentals(symbol).await?;
        let snapshot = MarketSnapshot {
            current_price,
            bars: series.bars,
        };

        evaluate(symbol, &snapshot, &fundamentals, &self.config)
    }
}
