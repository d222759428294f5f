//! # Domain Models
//!
//! Canonical value types shared by sourcing, analysis and batching.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Validated, purely alphabetic ticker |
//! | [`Quote`] | Latest price for a symbol |
//! | [`Bar`] | Daily OHLCV bar |
//! | [`BarSeries`] | Daily history for one symbol |
//! | [`FundamentalProfile`] | Float shares and market cap |
//! | [`MarketSnapshot`] | Price plus bars used by one analysis |
//! | [`HistoryRange`] | Lookback window (3mo, 6mo, 1y, 2y) |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! All constructors validate their invariants and return
//! [`ValidationError`](crate::ValidationError) on bad input.

mod models;
mod range;
mod symbol;
mod timestamp;

pub use models::{Bar, BarSeries, FundamentalProfile, MarketSnapshot, Quote, ResolvedFloat};
pub use range::HistoryRange;
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
