//! Supply/demand shock scoring.
//!
//! [`evaluate`] is pure: the same snapshot, fundamentals and config always
//! produce the same [`AnalysisResult`].

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::indicators::IndicatorSet;
use crate::{AnalysisError, FundamentalProfile, HistoryRange, MarketSnapshot, Symbol};

/// Points awarded by each scoring term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub float_tight: u8,
    pub float_low: u8,
    pub float_rotation: u8,
    pub rvol_extreme: u8,
    pub rvol_high: u8,
    pub trend: u8,
    pub long_trend: u8,
    pub strong_close: u8,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            float_tight: 25,
            float_low: 15,
            float_rotation: 25,
            rvol_extreme: 20,
            rvol_high: 10,
            trend: 10,
            long_trend: 5,
            strong_close: 15,
        }
    }
}

/// Thresholds and weights for analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub history_range: HistoryRange,
    pub min_history_bars: usize,
    /// Bars required before the long moving average is scored.
    pub long_sma_window: usize,
    pub tight_float_shares: f64,
    pub low_float_shares: f64,
    pub extreme_rvol: f64,
    pub high_rvol: f64,
    pub strong_close_position: f64,
    pub atr_stop_multiple: f64,
    pub stop_floor: f64,
    pub weights: ScoreWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            history_range: HistoryRange::SixMonths,
            min_history_bars: 50,
            long_sma_window: 200,
            tight_float_shares: 10_000_000.0,
            low_float_shares: 20_000_000.0,
            extreme_rvol: 5.0,
            high_rvol: 3.0,
            strong_close_position: 0.75,
            atr_stop_multiple: 2.5,
            stop_floor: 0.01,
            weights: ScoreWeights::default(),
        }
    }
}

impl ScoringConfig {
    /// Names the first threshold that is not a finite, non-negative number.
    pub fn invalid_field(&self) -> Option<&'static str> {
        [
            ("tight_float_shares", self.tight_float_shares),
            ("low_float_shares", self.low_float_shares),
            ("extreme_rvol", self.extreme_rvol),
            ("high_rvol", self.high_rvol),
            ("strong_close_position", self.strong_close_position),
            ("atr_stop_multiple", self.atr_stop_multiple),
            ("stop_floor", self.stop_floor),
        ]
        .into_iter()
        .find(|(_, value)| !value.is_finite() || *value < 0.0)
        .map(|(name, _)| name)
    }
}

/// Points earned by each term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub float_size: u8,
    pub float_rotation: u8,
    pub relative_volume: u8,
    pub trend: u8,
    pub long_trend: u8,
    pub strong_close: u8,
}

impl ScoreBreakdown {
    /// Sum of all terms, capped at 100.
    pub fn total(&self) -> u8 {
        let sum = u16::from(self.float_size)
            + u16::from(self.float_rotation)
            + u16::from(self.relative_volume)
            + u16::from(self.trend)
            + u16::from(self.long_trend)
            + u16::from(self.strong_close);
        sum.min(100) as u8
    }
}

/// Whether a symbol came from the user's watchlist or from sourcing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Manual,
    Auto,
}

impl Origin {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Auto => "auto",
        }
    }
}

impl Display for Origin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scored analysis of one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub symbol: Symbol,
    pub price: f64,
    pub score: u8,
    pub breakdown: ScoreBreakdown,
    /// Float in millions of shares; 0.0 when unknown.
    pub float_millions: f64,
    /// Float was derived from market cap rather than reported.
    pub float_estimated: bool,
    pub rvol: f64,
    pub rsi: f64,
    pub close_position_pct: f64,
    pub atr: f64,
    pub stop_loss: f64,
    pub risk_pct: f64,
    /// Set once a batch accepts the result.
    pub origin: Option<Origin>,
}

impl AnalysisResult {
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }
}

/// Scores `snapshot` for `symbol`.
///
/// Fails with [`AnalysisError::PriceUnavailable`] for a non-positive price and
/// [`AnalysisError::InsufficientHistory`] below the minimum bar count.
pub fn evaluate(
    symbol: &Symbol,
    snapshot: &MarketSnapshot,
    fundamentals: &FundamentalProfile,
    config: &ScoringConfig,
) -> Result<AnalysisResult, AnalysisError> {
    let price = snapshot.current_price;
    if !(price.is_finite() && price > 0.0) {
        return Err(AnalysisError::PriceUnavailable);
    }

    let bars = &snapshot.bars;
    if bars.len() < config.min_history_bars.max(1) {
        return Err(AnalysisError::InsufficientHistory {
            available: bars.len(),
            required: config.min_history_bars.max(1),
        });
    }

    let indicators = IndicatorSet::compute(bars, config.long_sma_window);
    let float = fundamentals.resolve_float(price);
    let weights = &config.weights;

    let mut breakdown = ScoreBreakdown::default();
    if let Some(float) = float {
        if float.shares < config.tight_float_shares {
            breakdown.float_size = weights.float_tight;
        } else if float.shares < config.low_float_shares {
            breakdown.float_size = weights.float_low;
        }
        if indicators.current_volume > float.shares {
            breakdown.float_rotation = weights.float_rotation;
        }
    }

    if indicators.rvol > config.extreme_rvol {
        breakdown.relative_volume = weights.rvol_extreme;
    } else if indicators.rvol > config.high_rvol {
        breakdown.relative_volume = weights.rvol_high;
    }

    if price > indicators.sma20 && price > indicators.sma50 {
        breakdown.trend = weights.trend;
    }
    if bars.len() >= config.long_sma_window && price > indicators.sma200 {
        breakdown.long_trend = weights.long_trend;
    }

    if indicators.close_position > config.strong_close_position {
        breakdown.strong_close = weights.strong_close;
    }

    let stop_loss = (price - config.atr_stop_multiple * indicators.atr14).max(config.stop_floor);

    Ok(AnalysisResult {
        symbol: symbol.clone(),
        price,
        score: breakdown.total(),
        breakdown,
        float_millions: float.map_or(0.0, |float| float.shares / 1_000_000.0),
        float_estimated: float.is_some_and(|float| float.estimated),
        rvol: indicators.rvol,
        rsi: indicators.rsi14,
        close_position_pct: indicators.close_position * 100.0,
        atr: indicators.atr14,
        stop_loss,
        risk_pct: (price - stop_loss) / price * 100.0,
        origin: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bar, UtcDateTime};

    fn flat_bars(count: usize, close: f64, volume: u64) -> Vec<Bar> {
        let start = UtcDateTime::parse("2024-01-01T00:00:00Z").expect("timestamp");
        (0..count)
            .map(|day| {
                Bar::new(
                    start.plus_days(day as i64),
                    Some(close),
                    close + 0.1,
                    close - 0.1,
                    close,
                    volume,
                )
                .expect("valid bar")
            })
            .collect()
    }

    fn symbol() -> Symbol {
        Symbol::parse("TEST").expect("valid symbol")
    }

    #[test]
    fn breakdown_total_is_capped() {
        let breakdown = ScoreBreakdown {
            float_size: 100,
            float_rotation: 100,
            ..ScoreBreakdown::default()
        };
        assert_eq!(breakdown.total(), 100);
    }

    #[test]
    fn short_history_is_rejected() {
        let snapshot = MarketSnapshot {
            current_price: 5.0,
            bars: flat_bars(49, 5.0, 1_000),
        };

        let error = evaluate(
            &symbol(),
            &snapshot,
            &FundamentalProfile::default(),
            &ScoringConfig::default(),
        )
        .expect_err("49 bars is too few");

        assert_eq!(
            error,
            AnalysisError::InsufficientHistory {
                available: 49,
                required: 50
            }
        );
    }

    #[test]
    fn long_trend_needs_full_window() {
        let config = ScoringConfig::default();
        let fundamentals = FundamentalProfile::default();

        let short = MarketSnapshot {
            current_price: 6.0,
            bars: flat_bars(199, 5.0, 1_000),
        };
        let long = MarketSnapshot {
            current_price: 6.0,
            bars: flat_bars(200, 5.0, 1_000),
        };

        let short = evaluate(&symbol(), &short, &fundamentals, &config).expect("scores");
        let long = evaluate(&symbol(), &long, &fundamentals, &config).expect("scores");

        assert_eq!(short.breakdown.long_trend, 0);
        assert_eq!(long.breakdown.long_trend, 5);
        assert_eq!(long.score, short.score + 5);
    }

    #[test]
    fn stop_loss_is_floored() {
        let snapshot = MarketSnapshot {
            current_price: 0.2,
            bars: flat_bars(60, 0.2, 1_000),
        };
        let config = ScoringConfig {
            atr_stop_multiple: 10.0,
            ..ScoringConfig::default()
        };

        let result = evaluate(&symbol(), &snapshot, &FundamentalProfile::default(), &config)
            .expect("scores");

        assert_eq!(result.stop_loss, 0.01);
        assert!((result.risk_pct - 95.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_thresholds_are_named() {
        let config = ScoringConfig {
            high_rvol: f64::NAN,
            ..ScoringConfig::default()
        };
        assert_eq!(config.invalid_field(), Some("high_rvol"));
        assert_eq!(ScoringConfig::default().invalid_field(), None);
    }
}
