use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Lookback window for the daily bar history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HistoryRange {
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[default]
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
}

impl HistoryRange {
    pub const ALL: [Self; 4] = [
        Self::ThreeMonths,
        Self::SixMonths,
        Self::OneYear,
        Self::TwoYears,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ThreeMonths => "3mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
            Self::TwoYears => "2y",
        }
    }

    /// Rough trading-day count, used to size synthetic series and buffers.
    pub const fn approx_trading_days(self) -> usize {
        match self {
            Self::ThreeMonths => 63,
            Self::SixMonths => 126,
            Self::OneYear => 252,
            Self::TwoYears => 504,
        }
    }
}

impl Display for HistoryRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryRange {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "3mo" => Ok(Self::ThreeMonths),
            "6mo" => Ok(Self::SixMonths),
            "1y" => Ok(Self::OneYear),
            "2y" => Ok(Self::TwoYears),
            other => Err(ValidationError::InvalidHistoryRange {
                value: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_range() {
        assert_eq!(HistoryRange::from_str("1Y").expect("must parse"), HistoryRange::OneYear);
        assert_eq!(HistoryRange::default(), HistoryRange::SixMonths);
    }

    #[test]
    fn rejects_unknown_range() {
        let err = HistoryRange::from_str("5d").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidHistoryRange { .. }));
    }
}
