use floatscan_core::{rows_by_score, Origin, ResultRow, ScreenerEngine, Symbol};
use serde_json::json;
use tracing::debug;

use crate::cli::AnalyzeArgs;
use crate::error::CliError;
use crate::output::result_cells;

use super::CommandResult;

pub async fn run(args: &AnalyzeArgs, engine: &ScreenerEngine) -> Result<CommandResult, CliError> {
    let symbols = args
        .symbols
        .iter()
        .map(|raw| Symbol::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let mut results = Vec::with_capacity(symbols.len());
    let mut warnings = Vec::new();
    for symbol in &symbols {
        match engine.analyze(symbol).await {
            Ok(result) => results.push(result.with_origin(Origin::Manual)),
            Err(error) => {
                debug!(%symbol, %error, "analysis failed");
                warnings.push(format!("{symbol}: {error}"));
            }
        }
    }

    let rows = rows_by_score(&results);
    let data = json!({
        "results": results,
        "skipped": warnings,
    });

    let result = CommandResult::new(
        data,
        ResultRow::HEADERS.map(String::from).to_vec(),
        rows.iter().map(result_cells).collect(),
    )
    .with_warnings(warnings);

    Ok(if results.is_empty() {
        result.with_no_data()
    } else {
        result
    })
}
