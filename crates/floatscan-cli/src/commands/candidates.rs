use floatscan_core::ScreenerEngine;
use serde_json::json;

use crate::cli::CandidatesArgs;
use crate::error::CliError;

use super::{sourcing_mode, CommandResult};

pub async fn run(args: &CandidatesArgs, engine: &ScreenerEngine) -> Result<CommandResult, CliError> {
    let mode = sourcing_mode(args.penny);
    let set = engine.fetch_candidates(mode).await;
    if set.is_empty() {
        return Err(CliError::NoData(format!("no {mode} candidates from any source")));
    }

    let rows = set
        .symbols()
        .iter()
        .map(|symbol| vec![symbol.to_string()])
        .collect();
    let data = json!({
        "mode": mode,
        "source": set.source,
        "count": set.len(),
        "symbols": set.symbols(),
    });

    Ok(CommandResult::new(data, vec![String::from("Ticker")], rows)
        .with_summary(format!("mode   : {mode}"))
        .with_summary(format!("source : {}", set.source))
        .with_summary(format!("count  : {}", set.len())))
}
