use anyhow::{anyhow, Result};
use log2::{debug, warn};
use reqwest::Client;
use std::collections::HashMap;
use std::future::Future;
use texting_robots::Robot;
use url::Url;

use super::config::CrawlerConfigRef;
use super::scrape::get_with_retries;

/// Agent name evaluated against robots.txt rules
pub const ROBOTS_AGENT: &str = "*";

/// Decides whether a URL may be fetched
pub trait PolicyGate {
    fn allowed(&mut self, url: &str) -> impl Future<Output = bool>;
}

/// Text encodings tried in order when decoding robots.txt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
}

impl TextEncoding {
    pub const ALL: [TextEncoding; 2] = [TextEncoding::Utf8, TextEncoding::Latin1];

    pub fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            TextEncoding::Utf8 => Ok(String::from_utf8(bytes.to_vec())?),
            TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

/// Parses robots.txt under the first encoding that decodes and parses cleanly
pub fn parse_robots(agent: &str, bytes: &[u8]) -> Result<Robot> {
    let mut last_error = anyhow!("no encoding attempted");
    for encoding in TextEncoding::ALL {
        let parsed = encoding
            .decode(bytes)
            .and_then(|text| Robot::new(agent, text.as_bytes()).map_err(|e| anyhow!("{}", e)));
        match parsed {
            Ok(robot) => return Ok(robot),
            Err(e) => {
                debug!("robots.txt not usable as {:?}: {}", encoding, e);
                last_error = e;
            }
        }
    }
    Err(last_error)
}

/// `<origin>/robots.txt` for the given page URL
pub fn robots_url(url: &str) -> Result<String> {
    Ok(Url::parse(url)?.join("/robots.txt")?.to_string())
}

/// Robots exclusion gate that fails closed.
///
/// robots.txt is fetched once per origin and every decision is remembered per URL,
/// so repeated queries during one crawl cost no extra round trips.
pub struct RobotsPolicy {
    client: Client,
    config: CrawlerConfigRef,
    /// `None` marks an origin whose robots.txt could not be fetched or decoded
    robots: HashMap<String, Option<Robot>>,
    decisions: HashMap<String, bool>,
}

impl RobotsPolicy {
    pub fn new(client: Client, config: CrawlerConfigRef) -> Self {
        Self {
            client,
            config,
            robots: HashMap::new(),
            decisions: HashMap::new(),
        }
    }

    async fn fetch_robots(&self, robots_url: &str) -> Result<Robot> {
        let response = get_with_retries(&self.client, robots_url, &self.config).await?;
        let bytes = response.bytes().await?;
        parse_robots(ROBOTS_AGENT, &bytes)
    }

    async fn decide(&mut self, url: &str) -> bool {
        let robots_url = match robots_url(url) {
            Ok(robots_url) => robots_url,
            Err(e) => {
                warn!("Error reading robots.txt for {}: {}", url, e);
                return false;
            }
        };

        if !self.robots.contains_key(&robots_url) {
            let robot = match self.fetch_robots(&robots_url).await {
                Ok(robot) => Some(robot),
                Err(e) => {
                    warn!("Error reading robots.txt for {}: {}", url, e);
                    None
                }
            };
            self.robots.insert(robots_url.clone(), robot);
        }

        match self.robots.get(&robots_url) {
            Some(Some(robot)) => robot.allowed(url),
            _ => false,
        }
    }
}

impl PolicyGate for RobotsPolicy {
    async fn allowed(&mut self, url: &str) -> bool {
        if let Some(decision) = self.decisions.get(url) {
            return *decision;
        }
        let decision = self.decide(url).await;
        debug!("robots.txt {} {}", if decision { "allows" } else { "disallows" }, url);
        self.decisions.insert(url.to_string(), decision);
        decision
    }
}
