use std::collections::BTreeSet;
use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::gateway::{SourceError, SourceFuture};
use crate::http_client::{HttpClient, HttpRequest, BROWSER_USER_AGENT};
use crate::sourcing::{CandidateSource, SourcingConfig, SourcingMode};
use crate::Symbol;

/// Fallback candidate feed that scrapes the first table of listing pages.
#[derive(Clone)]
pub struct HtmlListingSource {
    http_client: Arc<dyn HttpClient>,
    config: SourcingConfig,
    timeout_ms: u64,
}

impl HtmlListingSource {
    pub fn new(http_client: Arc<dyn HttpClient>, config: SourcingConfig) -> Self {
        Self {
            http_client,
            config,
            timeout_ms: 10_000,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    async fn fetch_page(&self, url: &str, mode: SourcingMode) -> Result<Vec<Symbol>, SourceError> {
        let request = HttpRequest::get(url)
            .with_header("user-agent", BROWSER_USER_AGENT)
            .with_timeout_ms(self.timeout_ms);

        let response = self.http_client.execute(request).await.map_err(|e| {
            SourceError::unavailable(format!("listing page transport error: {}", e.message()))
        })?;
        if !response.is_success() {
            return Err(SourceError::from_status(response.status, "listing page"));
        }

        let rows = parse_listing_table(&response.body)?;
        Ok(rows
            .into_iter()
            .filter(|(_, price)| self.config.admits_price(mode, *price))
            .map(|(symbol, _)| symbol)
            .collect())
    }

    async fn fetch_all(&self, mode: SourcingMode) -> Result<Vec<Symbol>, SourceError> {
        let mut symbols = BTreeSet::new();

        for url in self.config.pages_for(mode) {
            match self.fetch_page(url, mode).await {
                Ok(found) => {
                    debug!(%url, count = found.len(), "listing page scraped");
                    symbols.extend(found);
                }
                Err(error) => warn!(%url, %error, "skipping listing page"),
            }
        }

        Ok(symbols.into_iter().collect())
    }
}

impl CandidateSource for HtmlListingSource {
    fn name(&self) -> &'static str {
        "html_listing"
    }

    fn fetch<'a>(&'a self, mode: SourcingMode) -> SourceFuture<'a, Vec<Symbol>> {
        Box::pin(self.fetch_all(mode))
    }
}

/// Reads `(symbol, price)` rows from the first `<table>` in `html`.
///
/// The symbol column is located by a case-insensitive `Symbol` header; a
/// `Price` column is optional. Non-alphabetic tickers are dropped.
pub fn parse_listing_table(html: &str) -> Result<Vec<(Symbol, Option<f64>)>, SourceError> {
    let document = Html::parse_document(html);
    let table_selector = selector("table")?;
    let row_selector = selector("tr")?;
    let cell_selector = selector("th, td")?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| SourceError::internal("listing page has no table"))?;

    let mut rows = table.select(&row_selector);
    let header: Vec<String> = rows
        .next()
        .map(|row| row.select(&cell_selector).map(cell_text).collect())
        .unwrap_or_default();

    let symbol_column = column_index(&header, "symbol")
        .ok_or_else(|| SourceError::internal("listing table has no Symbol column"))?;
    let price_column = column_index(&header, "price");

    Ok(rows
        .filter_map(|row| {
            let cells: Vec<String> = row.select(&cell_selector).map(cell_text).collect();
            let symbol = Symbol::parse(cells.get(symbol_column)?).ok()?;
            let price = price_column
                .and_then(|index| cells.get(index))
                .and_then(|text| parse_price(text));
            Some((symbol, price))
        })
        .collect())
}

fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::internal(format!("invalid selector '{css}': {e:?}")))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_owned()
}

fn column_index(header: &[String], name: &str) -> Option<usize> {
    header
        .iter()
        .position(|column| column.eq_ignore_ascii_case(name))
}

fn parse_price(text: &str) -> Option<f64> {
    text.trim()
        .trim_start_matches('$')
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|price| price.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <table>
          <thead><tr><th>No.</th><th>symbol</th><th>Company</th><th>Price</th></tr></thead>
          <tbody>
            <tr><td>1</td><td>ABCD</td><td>Alpha</td><td>$1,204.50</td></tr>
            <tr><td>2</td><td>EFG.W</td><td>Warrant</td><td>0.10</td></tr>
            <tr><td>3</td><td>hijk</td><td>Hotel</td><td>-</td></tr>
          </tbody>
        </table>
        <table><tr><th>Symbol</th></tr><tr><td>IGNORED</td></tr></table>
    </body></html>"#;

    #[test]
    fn reads_symbol_and_price_columns_from_first_table() {
        let rows = parse_listing_table(PAGE).expect("table should parse");
        let rendered: Vec<(String, Option<f64>)> = rows
            .into_iter()
            .map(|(symbol, price)| (symbol.to_string(), price))
            .collect();

        assert_eq!(
            rendered,
            vec![
                (String::from("ABCD"), Some(1204.5)),
                (String::from("HIJK"), None),
            ]
        );
    }

    #[test]
    fn missing_symbol_header_is_an_error() {
        let error = parse_listing_table("<table><tr><th>Ticker</th></tr></table>")
            .expect_err("no symbol column");
        assert!(error.message().contains("Symbol column"));
    }
}
