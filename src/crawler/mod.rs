pub mod state;
pub mod config;
pub mod policy;
pub mod scrape;
pub mod runner;

#[cfg(test)]
mod tests;

pub use state::{CrawlerState, build_graph_from_state};
pub use config::{CrawlerConfig, CrawlerConfigRef, LINK_REQUEST_TIMEOUT_SEC};
pub use policy::{PolicyGate, RobotsPolicy};
pub use scrape::{HttpLinkFetcher, LinkFetcher, extract_links, scrape_page};
pub use runner::{crawl, crawl_site};
