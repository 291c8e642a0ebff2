use std::collections::HashSet;

use crate::link_graph::WeightedGraph;

/// Current state of the crawler.
///
/// Owned by a single crawl run and mutated only by its traversal loop.
#[derive(Debug, Default)]
pub struct CrawlerState {
    /// Number of pages expanded
    pub links_crawled_count: usize,
    /// URLs entered by the traversal, only ever grows
    pub visited_urls: HashSet<String>,
    /// Weighted co-occurrence graph of everything discovered so far
    pub graph: WeightedGraph,
}

impl CrawlerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited_urls.contains(url)
    }

    /// Marks `url` visited, returns false if it already was
    pub fn mark_visited(&mut self, url: &str) -> bool {
        self.visited_urls.insert(url.to_string())
    }
}

/// Hands over the crawled graph for matrix construction
pub fn build_graph_from_state(state: CrawlerState) -> WeightedGraph {
    state.graph
}
