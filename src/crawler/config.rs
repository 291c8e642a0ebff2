use std::sync::Arc;
use url::Url;

/// Default timeout for page and robots requests in seconds
pub const LINK_REQUEST_TIMEOUT_SEC: u64 = 2;

/// Identifying `User-Agent` sent with every request
pub const DEFAULT_USER_AGENT: &str = "link-ranker/0.1";

/// Configuration for the crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub starting_url: Url,
    /// Deepest link-hop count that still gets expanded, seed is 0
    pub max_depth: usize,
    /// Edge budget, checked whenever a new edge is created
    pub max_edges: usize,
    pub request_delay_ms: u64,
    /// Extra attempts after a failed request, 0 means a single attempt
    pub max_retries: usize,
    pub request_timeout_sec: u64,
    pub user_agent: String,
}

impl CrawlerConfig {
    pub fn new(starting_url: Url) -> Self {
        Self {
            starting_url,
            max_depth: 3,
            max_edges: 500,
            request_delay_ms: 100,
            max_retries: 0,
            request_timeout_sec: LINK_REQUEST_TIMEOUT_SEC,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_edges(mut self, max_edges: usize) -> Self {
        self.max_edges = max_edges;
        self
    }

    pub fn with_request_delay(mut self, delay_ms: u64) -> Self {
        self.request_delay_ms = delay_ms;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_request_timeout(mut self, timeout_sec: u64) -> Self {
        self.request_timeout_sec = timeout_sec;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

pub type CrawlerConfigRef = Arc<CrawlerConfig>;
