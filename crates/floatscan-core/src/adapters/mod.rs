mod html_listing;
mod yahoo;
mod yahoo_screener;

pub use html_listing::{parse_listing_table, HtmlListingSource};
pub use yahoo::{YahooAuthManager, YahooGateway};
pub use yahoo_screener::YahooScreenerSource;
