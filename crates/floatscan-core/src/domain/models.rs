use serde::{Deserialize, Serialize};

use crate::{HistoryRange, Symbol, UtcDateTime, ValidationError};

/// Latest traded price for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub price: f64,
    pub volume: Option<u64>,
    pub as_of: UtcDateTime,
}

impl Quote {
    pub fn new(
        symbol: Symbol,
        price: f64,
        volume: Option<u64>,
        as_of: UtcDateTime,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("price", price)?;

        Ok(Self {
            symbol,
            price,
            volume,
            as_of,
        })
    }
}

/// Daily OHLCV bar. The open is optional because some feeds omit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ts: UtcDateTime,
    pub open: Option<f64>,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    pub fn new(
        ts: UtcDateTime,
        open: Option<f64>,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Result<Self, ValidationError> {
        validate_optional_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;

        if high < low {
            return Err(ValidationError::InvalidBarRange);
        }

        if close < low || close > high {
            return Err(ValidationError::InvalidBarBounds);
        }

        Ok(Self {
            ts,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Daily bar history for one symbol, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    pub symbol: Symbol,
    pub range: HistoryRange,
    pub bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(symbol: Symbol, range: HistoryRange, bars: Vec<Bar>) -> Self {
        Self {
            symbol,
            range,
            bars,
        }
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// Float and market cap as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FundamentalProfile {
    pub float_shares: Option<f64>,
    pub market_cap: Option<f64>,
}

/// Float figure used for scoring and where it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedFloat {
    pub shares: f64,
    pub estimated: bool,
}

impl FundamentalProfile {
    pub fn new(float_shares: Option<f64>, market_cap: Option<f64>) -> Result<Self, ValidationError> {
        validate_optional_non_negative("float_shares", float_shares)?;
        validate_optional_non_negative("market_cap", market_cap)?;

        Ok(Self {
            float_shares,
            market_cap,
        })
    }

    /// Reported float, or `market_cap / price` when the provider has none.
    ///
    /// A zero float is treated as unknown either way.
    pub fn resolve_float(&self, price: f64) -> Option<ResolvedFloat> {
        if let Some(shares) = self.float_shares.filter(|shares| *shares > 0.0) {
            return Some(ResolvedFloat {
                shares,
                estimated: false,
            });
        }

        if self.float_shares.is_none() && price > 0.0 {
            let shares = self.market_cap.unwrap_or(0.0) / price;
            if shares > 0.0 && shares.is_finite() {
                return Some(ResolvedFloat {
                    shares,
                    estimated: true,
                });
            }
        }

        None
    }
}

/// Everything the scorer reads for one symbol, fetched once per analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub current_price: f64,
    pub bars: Vec<Bar>,
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_optional_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        validate_non_negative(field, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_close_outside_range() {
        let ts = UtcDateTime::parse("2024-01-01T00:00:00Z").expect("timestamp");
        let err = Bar::new(ts, Some(10.0), 12.0, 9.0, 12.5, 10).expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidBarBounds));
    }

    #[test]
    fn reported_float_wins_over_estimate() {
        let profile = FundamentalProfile::new(Some(8_000_000.0), Some(1e12)).expect("valid");
        let float = profile.resolve_float(5.0).expect("float");
        assert_eq!(float.shares, 8_000_000.0);
        assert!(!float.estimated);
    }

    #[test]
    fn float_is_estimated_from_market_cap() {
        let profile = FundamentalProfile::new(None, Some(50_000_000.0)).expect("valid");
        let float = profile.resolve_float(5.0).expect("float");
        assert_eq!(float.shares, 10_000_000.0);
        assert!(float.estimated);
    }

    #[test]
    fn float_is_unknown_without_inputs() {
        let profile = FundamentalProfile::default();
        assert!(profile.resolve_float(5.0).is_none());
        let zero = FundamentalProfile::new(Some(0.0), Some(50_000_000.0)).expect("valid");
        assert!(zero.resolve_float(5.0).is_none());
        let no_price = FundamentalProfile::new(None, Some(50_000_000.0)).expect("valid");
        assert!(no_price.resolve_float(0.0).is_none());
    }
}
