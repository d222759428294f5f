//! Technical indicators over daily bars.
//!
//! All series are oldest-first and the last bar is "today". Moving averages
//! come from `ta`. RSI and ATR are computed here with Wilder smoothing and an
//! SMA-seeded ATR, which `ta`'s exponential variants do not reproduce.

use serde::{Deserialize, Serialize};
use ta::indicators::SimpleMovingAverage;
use ta::Next;

use crate::Bar;

pub const RSI_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;
pub const VOLUME_WINDOW: usize = 20;

/// Indicator values computed once per analysis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub sma20: f64,
    pub sma50: f64,
    /// Zero when fewer bars than the long window are available.
    pub sma200: f64,
    pub rsi14: f64,
    pub atr14: f64,
    pub current_volume: f64,
    pub average_volume: f64,
    pub rvol: f64,
    /// Where today's close sits in today's range, 0.0 to 1.0.
    pub close_position: f64,
}

impl IndicatorSet {
    /// Computes every indicator; `long_window` is the SMA200 gate.
    pub fn compute(bars: &[Bar], long_window: usize) -> Self {
        let closes: Vec<f64> = bars.iter().map(|bar| bar.close).collect();
        let volumes: Vec<f64> = bars.iter().map(|bar| bar.volume as f64).collect();

        let current_volume = volumes.last().copied().unwrap_or(0.0);
        let average_volume = trailing_mean(&volumes, VOLUME_WINDOW).unwrap_or(0.0);

        Self {
            sma20: sma(&closes, 20).unwrap_or(0.0),
            sma50: sma(&closes, 50).unwrap_or(0.0),
            sma200: sma(&closes, long_window).unwrap_or(0.0),
            rsi14: rsi(&closes, RSI_PERIOD).unwrap_or(0.0),
            atr14: atr(bars, ATR_PERIOD).unwrap_or(0.0),
            current_volume,
            average_volume,
            rvol: relative_volume(current_volume, average_volume),
            close_position: bars.last().map_or(0.0, close_position),
        }
    }
}

/// Simple moving average of the last `window` values, if there are enough.
pub fn sma(values: &[f64], window: usize) -> Option<f64> {
    if values.len() < window {
        return None;
    }
    trailing_mean(values, window)
}

/// Mean of up to the last `window` values.
fn trailing_mean(values: &[f64], window: usize) -> Option<f64> {
    let mut average = SimpleMovingAverage::new(window).ok()?;
    let start = values.len().saturating_sub(window);
    values[start..].iter().map(|&value| average.next(value)).last()
}

pub fn relative_volume(current: f64, average: f64) -> f64 {
    if average > 0.0 {
        current / average
    } else {
        0.0
    }
}

pub fn close_position(bar: &Bar) -> f64 {
    let range = bar.range();
    if range > 0.0 {
        ((bar.close - bar.low) / range).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Wilder RSI of the last value.
///
/// Gains and losses are smoothed recursively with `alpha = 1 / period`,
/// seeded at the first bar with a zero change. Needs `period` closes.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let alpha = 1.0 / period as f64;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for (i, window) in std::iter::once(0.0)
        .chain(closes.windows(2).map(|pair| pair[1] - pair[0]))
        .enumerate()
    {
        let gain = window.max(0.0);
        let loss = (-window).max(0.0);
        if i == 0 {
            avg_gain = gain;
            avg_loss = loss;
        } else {
            avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
            avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
        }
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// True range per bar; the first bar has no previous close and uses its own range.
pub fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| match i.checked_sub(1).and_then(|prev| bars.get(prev)) {
            Some(prev) => bar.high.max(prev.close) - bar.low.min(prev.close),
            None => bar.range(),
        })
        .collect()
}

/// Wilder ATR of the last bar, seeded with the mean of the first `period` true ranges.
pub fn atr(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period {
        return None;
    }

    let ranges = true_ranges(bars);
    let seed = ranges[..period].iter().sum::<f64>() / period as f64;
    Some(
        ranges[period..]
            .iter()
            .fold(seed, |atr, tr| (atr * (period as f64 - 1.0) + tr) / period as f64),
    )
}
