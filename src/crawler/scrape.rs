use anyhow::{anyhow, Result};
use log2::{debug, info};
use reqwest::{Client, Response};
use scraper::{Html, Selector};
use std::future::Future;
use std::time::Duration;

use super::config::{CrawlerConfig, CrawlerConfigRef};

/// Source of outbound links for a page
pub trait LinkFetcher {
    /// Absolute links found on `url`, in document order with duplicates kept
    fn fetch_links(&self, url: &str) -> impl Future<Output = Result<Vec<String>>>;
}

/// Builds the shared HTTP client carrying the identifying user agent
pub fn build_client(config: &CrawlerConfig) -> Result<Client> {
    Ok(Client::builder().user_agent(config.user_agent.as_str()).build()?)
}

/// GET with the configured timeout, retried `max_retries` times on failure.
/// Non-success statuses count as failures.
pub async fn get_with_retries(client: &Client, url: &str, config: &CrawlerConfig) -> Result<Response> {
    let mut attempt = 0;
    loop {
        let result = client
            .get(url)
            .timeout(Duration::from_secs(config.request_timeout_sec))
            .send()
            .await
            .map_err(anyhow::Error::from)
            .and_then(|response| {
                if response.status().is_success() {
                    Ok(response)
                } else {
                    Err(anyhow!("Failed to fetch {}: {}", url, response.status()))
                }
            });

        match result {
            Ok(response) => return Ok(response),
            Err(e) if attempt < config.max_retries => {
                attempt += 1;
                debug!("Retrying {} ({}/{}): {}", url, attempt, config.max_retries, e);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Collects `href` values that start with a scheme prefix.
/// Relative links are dropped, nothing is resolved or normalized.
pub fn extract_links(html: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]")
        .map_err(|e| anyhow!("Failed to parse <a> selector: {}", e))?;

    Ok(document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter(|href| href.starts_with("http"))
        .map(str::to_string)
        .collect())
}

/// Scrape all absolute links from the given page.
pub async fn scrape_page(url: &str, client: &Client, config: &CrawlerConfig) -> Result<Vec<String>> {
    let html = get_with_retries(client, url, config).await?.text().await?;
    let links = extract_links(&html)?;

    info!("Found {} links on page {}", links.len(), url);

    Ok(links)
}

/// `LinkFetcher` backed by reqwest and scraper
pub struct HttpLinkFetcher {
    client: Client,
    config: CrawlerConfigRef,
}

impl HttpLinkFetcher {
    pub fn new(client: Client, config: CrawlerConfigRef) -> Self {
        Self { client, config }
    }
}

impl LinkFetcher for HttpLinkFetcher {
    async fn fetch_links(&self, url: &str) -> Result<Vec<String>> {
        scrape_page(url, &self.client, &self.config).await
    }
}
