use floatscan_core::{
    parse_watchlist, rows_by_score, BatchProgress, CancelFlag, FilterCriteria, ResultRow,
    ScanRequest, ScreenerEngine,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::ScanArgs;
use crate::error::CliError;
use crate::output::result_cells;

use super::{sourcing_mode, CommandResult};

pub async fn run(args: &ScanArgs, engine: &ScreenerEngine) -> Result<CommandResult, CliError> {
    let watchlist = args
        .watchlist
        .as_deref()
        .map(parse_watchlist)
        .unwrap_or_default();
    let warnings: Vec<String> = watchlist
        .rejected
        .iter()
        .map(|(token, error)| format!("watchlist entry '{token}' ignored: {error}"))
        .collect();

    let mut request = ScanRequest::auto(sourcing_mode(args.penny))
        .with_watchlist(watchlist.symbols)
        .with_criteria(FilterCriteria {
            min_price: args.min_price,
            max_price: args.max_price,
            min_score: args.min_score,
        });
    if args.no_auto {
        request = request.without_auto();
    }

    let cancel = CancelFlag::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing in-flight analyses");
                cancel.cancel();
            }
        })
    };

    let (sender, mut receiver) = mpsc::unbounded_channel::<BatchProgress>();
    let reporter = tokio::spawn(async move {
        while let Some(progress) = receiver.recv().await {
            info!(
                origin = %progress.origin,
                "[{}/{}] {}",
                progress.index,
                progress.total,
                progress.symbol
            );
        }
    });

    let outcome = engine.scan(&request, Some(&sender), &cancel).await;
    drop(sender);
    let _ = reporter.await;
    interrupt.abort();
    let report = outcome?;

    let rows = rows_by_score(&report.results);
    let mut result = CommandResult::new(
        serde_json::to_value(&report)?,
        ResultRow::HEADERS.map(String::from).to_vec(),
        rows.iter().map(result_cells).collect(),
    )
    .with_warnings(warnings);

    if let Some(source) = report.candidate_source {
        result = result.with_summary(format!(
            "candidates : {} from {source}",
            report.candidate_count
        ));
    }
    for (label, batch) in [("manual", &report.manual), ("auto", &report.auto)] {
        if let Some(batch) = batch {
            result = result.with_summary(format!(
                "{label:<10} : {} analyzed, {} skipped, {} filtered out, {} accepted",
                batch.analyzed,
                batch.skipped,
                batch.rejected_by_filter,
                batch.results.len()
            ));
        }
    }
    if report.cancelled() {
        result = result.with_summary("scan cancelled; results are partial");
    }

    Ok(result)
}
