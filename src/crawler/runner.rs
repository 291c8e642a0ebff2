use anyhow::Result;
use log2::*;
use tokio::time::{sleep, Duration};

use crate::link_graph::LinkUpdate;
use super::config::{CrawlerConfig, CrawlerConfigRef};
use super::policy::{PolicyGate, RobotsPolicy};
use super::scrape::{build_client, HttpLinkFetcher, LinkFetcher};
use super::state::CrawlerState;

/// One expanded page on the traversal stack, with the links it still has to process
struct Frame {
    url: String,
    depth: usize,
    links: std::vec::IntoIter<String>,
}

/// Applies the expansion guards to `url` and, if it passes, marks it visited and
/// fetches its links. Fetch failures count as a page without links.
async fn enter<P: PolicyGate, F: LinkFetcher>(
    state: &mut CrawlerState,
    policy: &mut P,
    fetcher: &F,
    config: &CrawlerConfig,
    url: String,
    depth: usize,
) -> Option<Frame> {
    if depth > config.max_depth {
        debug!("Max depth {} reached for {}", config.max_depth, url);
        return None;
    }
    if state.is_visited(&url) {
        return None;
    }
    if !policy.allowed(&url).await {
        debug!("Skipping {}: disallowed by robots.txt", url);
        return None;
    }

    state.mark_visited(&url);
    info!("Crawling {} at depth {}", url, depth);

    // fetching is gated as well, the policy answers this from its cache
    let links = if policy.allowed(&url).await {
        match fetcher.fetch_links(&url).await {
            Ok(links) => links,
            Err(e) => {
                warn!("Failed to scrape {}: {}", url, e);
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };
    state.links_crawled_count += 1;

    if config.request_delay_ms > 0 {
        sleep(Duration::from_millis(config.request_delay_ms)).await;
    }

    Some(Frame { url, depth, links: links.into_iter() })
}

/// Depth-first crawl from `config.starting_url`.
///
/// Every link of an expanded page is recorded in the graph (new edge or weight
/// bump) and then descended into at depth + 1. When creating an edge brings the
/// edge count to `max_edges`, the rest of that page's links are dropped. Pages
/// further up the stack keep going, so the budget is best effort: each of them
/// may still create one edge before it stops as well.
pub async fn crawl<P: PolicyGate, F: LinkFetcher>(
    config: &CrawlerConfig,
    policy: &mut P,
    fetcher: &F,
) -> CrawlerState {
    let mut state = CrawlerState::new();
    let mut stack: Vec<Frame> = Vec::new();

    let seed = config.starting_url.to_string();
    if let Some(frame) = enter(&mut state, policy, fetcher, config, seed, 0).await {
        stack.push(frame);
    }

    while let Some(frame) = stack.last_mut() {
        let current = frame.url.clone();
        let depth = frame.depth;
        let Some(link) = frame.links.next() else {
            stack.pop();
            continue;
        };

        let update = state.graph.add_link(&current, &link);
        if update == LinkUpdate::Created && state.graph.edge_count() >= config.max_edges {
            info!("Edge budget of {} reached while expanding {}", config.max_edges, current);
            frame.links = Vec::new().into_iter();
            continue;
        }

        if let Some(child) = enter(&mut state, policy, fetcher, config, link, depth + 1).await {
            stack.push(child);
        }
    }

    info!(
        "Crawling completed. Expanded {} pages, graph has {} nodes and {} edges",
        state.links_crawled_count,
        state.graph.node_count(),
        state.graph.edge_count()
    );

    state
}

/// Crawls over HTTP with robots.txt enforcement
pub async fn crawl_site(config: CrawlerConfigRef) -> Result<CrawlerState> {
    let client = build_client(&config)?;
    let mut policy = RobotsPolicy::new(client.clone(), config.clone());
    let fetcher = HttpLinkFetcher::new(client, config.clone());

    Ok(crawl(&config, &mut policy, &fetcher).await)
}
