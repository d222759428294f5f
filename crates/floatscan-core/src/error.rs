use thiserror::Error;

use crate::gateway::SourceError;

/// Validation and contract errors exposed by `floatscan-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol contains non-alphabetic character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid history range '{value}', expected one of 3mo, 6mo, 1y, 2y")]
    InvalidHistoryRange { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("bar high must be >= low")]
    InvalidBarRange,
    #[error("bar close must be within high/low range")]
    InvalidBarBounds,
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {key}: '{value}'")]
    InvalidEnv { key: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why a symbol could not be analyzed. Every variant means "skip it".
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("no usable price")]
    PriceUnavailable,

    #[error("insufficient history: {available} bars, need {required}")]
    InsufficientHistory { available: usize, required: usize },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    InvalidData(#[from] ValidationError),
}

impl AnalysisError {
    /// True when the upstream provider is down or throttling.
    pub fn is_throttle_signal(&self) -> bool {
        matches!(self, Self::Source(error) if error.is_throttle_signal())
    }
}

/// Batch-level failures. Per-symbol failures are never batch errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("nothing to analyze")]
    EmptyInput,
}

/// Scan-level failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Auto sourcing ran, both feeds came back empty and there was no
    /// watchlist to fall back on.
    #[error("no data available: every candidate source came back empty")]
    NoCandidates,

    #[error(transparent)]
    Batch(#[from] BatchError),
}
