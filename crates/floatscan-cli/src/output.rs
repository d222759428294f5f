use floatscan_core::{FloatTier, ResultRow, ScoreTier};
use serde_json::json;

use crate::cli::OutputFormat;
use crate::commands::CommandResult;
use crate::error::CliError;

pub fn render(result: &CommandResult, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let document = json!({
                "data": result.data,
                "warnings": result.warnings,
            });
            let payload = if pretty {
                serde_json::to_string_pretty(&document)?
            } else {
                serde_json::to_string(&document)?
            };
            println!("{payload}");
        }
        OutputFormat::Table => render_table(result),
    }

    Ok(())
}

/// Table cells for one result, with tier markers appended to Score, Float
/// and RVOL.
pub fn result_cells(row: &ResultRow) -> Vec<String> {
    let mut cells = row.cells().to_vec();
    let score_marker = match row.hints.score_tier {
        ScoreTier::High => " **",
        ScoreTier::Medium => " *",
        ScoreTier::Low => "",
    };
    let float_marker = match row.hints.float_tier {
        Some(FloatTier::VeryLow) => " **",
        Some(FloatTier::Low) => " *",
        None => "",
    };
    let rvol_marker = if row.hints.hot_rvol { " !" } else { "" };

    cells[2].push_str(score_marker);
    cells[4].push_str(float_marker);
    cells[5].push_str(rvol_marker);
    cells
}

fn render_table(result: &CommandResult) {
    for line in &result.summary {
        println!("{line}");
    }
    if !result.warnings.is_empty() {
        println!("warnings:");
        for warning in &result.warnings {
            println!("  - {warning}");
        }
    }
    if !result.summary.is_empty() || !result.warnings.is_empty() {
        println!();
    }

    if result.rows.is_empty() {
        println!("(no rows)");
        return;
    }
    for line in table_lines(&result.headers, &result.rows) {
        println!("{line}");
    }
}

fn table_lines(headers: &[String], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(|header| header.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_row = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_owned()
    };

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format_row(headers));
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("  "),
    );
    lines.extend(rows.iter().map(|row| format_row(row)));
    lines
}
