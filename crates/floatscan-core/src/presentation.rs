//! Export rows and display hints for analysis results.
//!
//! Nothing here affects scoring; renderers decide what a hint looks like.

use serde::{Deserialize, Serialize};

use crate::scoring::{AnalysisResult, Origin};

/// Flat export shape, one per accepted result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResultRow {
    pub ticker: String,
    pub origin: Option<Origin>,
    pub score: u8,
    pub price: f64,
    pub float_millions: f64,
    pub rvol: f64,
    pub rsi: f64,
    pub close_position_pct: f64,
    pub risk_pct: f64,
    pub stop_loss: f64,
    pub hints: PresentationHints,
}

impl From<&AnalysisResult> for ResultRow {
    fn from(result: &AnalysisResult) -> Self {
        Self {
            ticker: result.symbol.to_string(),
            origin: result.origin,
            score: result.score,
            price: result.price,
            float_millions: result.float_millions,
            rvol: result.rvol,
            rsi: result.rsi,
            close_position_pct: result.close_position_pct,
            risk_pct: result.risk_pct,
            stop_loss: result.stop_loss,
            hints: hints(result),
        }
    }
}

impl ResultRow {
    pub const HEADERS: [&'static str; 10] = [
        "Ticker",
        "Origin",
        "Score",
        "Price",
        "Float (M)",
        "RVOL",
        "RSI",
        "Close %",
        "Risk %",
        "Stop Loss",
    ];

    /// Cells formatted the way the scanner table shows them.
    pub fn cells(&self) -> [String; 10] {
        [
            self.ticker.clone(),
            self.origin.map_or_else(String::new, |origin| origin.to_string()),
            self.score.to_string(),
            format!("${:.2}", self.price),
            format!("{:.1}M", self.float_millions),
            format!("{:.1}x", self.rvol),
            format!("{:.0}", self.rsi),
            format!("{:.0}%", self.close_position_pct),
            format!("{:.1}%", self.risk_pct),
            format!("${:.2}", self.stop_loss),
        ]
    }
}

/// Rows sorted by score, highest first; ties keep input order.
pub fn rows_by_score(results: &[AnalysisResult]) -> Vec<ResultRow> {
    let mut rows: Vec<ResultRow> = results.iter().map(ResultRow::from).collect();
    rows.sort_by(|a, b| b.score.cmp(&a.score));
    rows
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTier {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatTier {
    VeryLow,
    Low,
}

/// Display hints for one result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationHints {
    pub score_tier: ScoreTier,
    /// `None` for ordinary or unknown floats.
    pub float_tier: Option<FloatTier>,
    pub hot_rvol: bool,
}

pub fn hints(result: &AnalysisResult) -> PresentationHints {
    let score_tier = match result.score {
        80.. => ScoreTier::High,
        60.. => ScoreTier::Medium,
        _ => ScoreTier::Low,
    };

    let float_tier = match result.float_millions {
        f if f <= 0.0 => None,
        f if f < 5.0 => Some(FloatTier::VeryLow),
        f if f < 15.0 => Some(FloatTier::Low),
        _ => None,
    };

    PresentationHints {
        score_tier,
        float_tier,
        hot_rvol: result.rvol > 5.0,
    }
}
