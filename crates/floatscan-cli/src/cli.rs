//! CLI argument definitions for floatscan.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `candidates` | Build the candidate universe and show where it came from |
//! | `analyze` | Score one or more symbols |
//! | `scan` | Source, merge with a watchlist, analyze and filter |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `table` | Output format (table, json) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--config` | none | JSON config file |
//! | `--concurrency` | config | Parallel analyses |
//! | `--timeout-ms` | config | Per-request timeout in ms |
//!
//! # Examples
//!
//! ```bash
//! floatscan candidates --penny
//! floatscan analyze ABCD WXYZ --format json --pretty
//! floatscan scan --watchlist "ABCD, EFGH" --min-score 60
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Low-float supply/demand shock screener.
#[derive(Debug, Parser)]
#[command(
    name = "floatscan",
    author,
    version,
    about = "Low-float supply/demand shock screener",
    long_about = "floatscan sources momentum candidates from public screeners, scores each \
ticker on float size, float rotation, relative volume, trend and close strength, and \
suggests an ATR-based stop.\n\
\n\
Logs go to stderr; set RUST_LOG to adjust verbosity (default floatscan=info)."
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// JSON config file; missing keys keep their defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of symbols analyzed in parallel.
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Per-request timeout budget in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned text table for terminal display.
    Table,
    /// Single JSON document.
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the candidate universe.
    ///
    ///   floatscan candidates
    ///   floatscan candidates --penny
    Candidates(CandidatesArgs),

    /// Analyze and score specific symbols.
    ///
    /// Symbols that cannot be analyzed are reported and skipped.
    ///
    ///   floatscan analyze ABCD
    ///   floatscan analyze ABCD WXYZ --format json
    Analyze(AnalyzeArgs),

    /// Run a full scan: sourcing, watchlist merge, analysis and filtering.
    ///
    ///   floatscan scan --penny
    ///   floatscan scan --no-auto --watchlist "ABCD, WXYZ"
    Scan(ScanArgs),
}

#[derive(Debug, Args)]
pub struct CandidatesArgs {
    /// Restrict sourcing to penny stocks.
    #[arg(long, default_value_t = false)]
    pub penny: bool,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// One or more ticker symbols.
    #[arg(required = true, num_args = 1..)]
    pub symbols: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Restrict auto sourcing to penny stocks.
    #[arg(long, default_value_t = false)]
    pub penny: bool,

    /// Skip auto sourcing and analyze only the watchlist.
    #[arg(long, default_value_t = false)]
    pub no_auto: bool,

    /// Manual symbols separated by commas or whitespace.
    #[arg(long)]
    pub watchlist: Option<String>,

    #[arg(long, default_value_t = 0.5)]
    pub min_price: f64,

    #[arg(long, default_value_t = 50.0)]
    pub max_price: f64,

    #[arg(long, default_value_t = 50)]
    pub min_score: u8,
}
