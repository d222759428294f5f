mod analyze;
mod candidates;
mod scan;

use floatscan_core::{EngineConfig, ScreenerEngine, SourcingMode};
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Renderer-agnostic outcome of one command.
pub struct CommandResult {
    pub data: Value,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub summary: Vec<String>,
    pub warnings: Vec<String>,
    pub no_data: bool,
}

impl CommandResult {
    pub fn new(data: Value, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            data,
            headers,
            rows,
            summary: Vec::new(),
            warnings: Vec::new(),
            no_data: false,
        }
    }

    pub fn with_summary(mut self, line: impl Into<String>) -> Self {
        self.summary.push(line.into());
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    /// Rendered as usual, but the process exits with 3.
    pub fn with_no_data(mut self) -> Self {
        self.no_data = true;
        self
    }
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    let config = load_config(cli)?;
    let engine = ScreenerEngine::from_config(config)?;

    match &cli.command {
        Command::Candidates(args) => candidates::run(args, &engine).await,
        Command::Analyze(args) => analyze::run(args, &engine).await,
        Command::Scan(args) => scan::run(args, &engine).await,
    }
}

/// Defaults, then the config file, then `FLOATSCAN_*` variables, then flags.
fn load_config(cli: &Cli) -> Result<EngineConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    config.apply_env_overrides()?;

    if let Some(concurrency) = cli.concurrency {
        config.batch.concurrency = concurrency;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.http.timeout_ms = timeout_ms;
    }
    Ok(config)
}

fn sourcing_mode(penny: bool) -> SourcingMode {
    if penny {
        SourcingMode::PennyOnly
    } else {
        SourcingMode::All
    }
}
