use anyhow::anyhow;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use super::*;
use super::policy::{parse_robots, robots_url, TextEncoding, ROBOTS_AGENT};
use super::scrape::{build_client, get_with_retries};

fn test_config(start_url: &str) -> CrawlerConfig {
    CrawlerConfig::new(Url::parse(start_url).unwrap())
        .with_max_depth(3)
        .with_max_edges(1000)
        .with_request_delay(0)
        .with_request_timeout(2)
}

/// In-memory site: page URL -> outbound links. Missing pages fail to fetch.
#[derive(Default)]
struct FakeSite {
    pages: HashMap<String, Vec<String>>,
    fetches: RefCell<Vec<String>>,
}

impl FakeSite {
    fn page(mut self, url: &str, links: &[&str]) -> Self {
        self.pages.insert(url.to_string(), links.iter().map(|l| l.to_string()).collect());
        self
    }

    fn fetch_count(&self, url: &str) -> usize {
        self.fetches.borrow().iter().filter(|u| u.as_str() == url).count()
    }
}

impl LinkFetcher for FakeSite {
    async fn fetch_links(&self, url: &str) -> anyhow::Result<Vec<String>> {
        self.fetches.borrow_mut().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("Failed to fetch {}: 404 Not Found", url))
    }
}

struct AllowAll;

impl PolicyGate for AllowAll {
    async fn allowed(&mut self, _url: &str) -> bool {
        true
    }
}

struct Deny(HashSet<String>);

impl PolicyGate for Deny {
    async fn allowed(&mut self, url: &str) -> bool {
        !self.0.contains(url)
    }
}

// tests for `extract_links` start here

#[test]
fn test_extract_keeps_only_absolute_links() -> Result<(), Box<dyn std::error::Error>> {
    let html = r#"
        <html><body>
            <a href="https://example.com/a">A</a>
            <a href="/relative">Relative</a>
            <a href="../up">Up</a>
            <a href="mailto:someone@example.com">Mail</a>
            <a href="http://example.com/b">B</a>
            <a>No href</a>
        </body></html>
    "#;
    let links = extract_links(html)?;
    assert_eq!(links, vec!["https://example.com/a", "http://example.com/b"]);
    Ok(())
}

/// Duplicates are what drives edge weights, they must survive extraction
#[test]
fn test_extract_keeps_duplicates_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let html = r#"
        <a href="https://b.test/">B</a>
        <a href="https://a.test/">A</a>
        <a href="https://b.test/">B again</a>
    "#;
    let links = extract_links(html)?;
    assert_eq!(links, vec!["https://b.test/", "https://a.test/", "https://b.test/"]);
    Ok(())
}

// tests for `scrape_page` start here

#[tokio::test]
async fn test_scrape_empty_page() -> Result<(), Box<dyn std::error::Error>> {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let client = build_client(&config)?;
    let url = format!("{}/empty", mock_server.uri());
    let result = scrape_page(&url, &client, &config).await?;
    assert!(result.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_scrape_page_with_links() -> Result<(), Box<dyn std::error::Error>> {
    let mock_server = MockServer::start().await;
    let absolute = format!("{}/link1", mock_server.uri());
    Mock::given(method("GET"))
        .and(path("/with-links"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(r#"
        <html>
            <body>
                <a href="{}">Link 1</a>
                <a href="https://example.com/link2">Link 2</a>
                <a href="../link3">Link 3</a>
            </body>
        </html>
    "#, absolute)))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let client = build_client(&config)?;
    let url = format!("{}/with-links", mock_server.uri());
    let result = scrape_page(&url, &client, &config).await?;

    assert_eq!(result, vec![absolute, "https://example.com/link2".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_scrape_page_404() -> Result<(), Box<dyn std::error::Error>> {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/not-found"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri());
    let client = build_client(&config)?;
    let url = format!("{}/not-found", mock_server.uri());
    assert!(scrape_page(&url, &client, &config).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_scrape_page_timeout() -> Result<(), Box<dyn std::error::Error>> {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/timeout"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(LINK_REQUEST_TIMEOUT_SEC + 1)))
        .mount(&mock_server)
        .await;

    let config = test_config(&mock_server.uri()).with_request_timeout(1);
    let client = build_client(&config)?;
    let url = format!("{}/timeout", mock_server.uri());
    assert!(scrape_page(&url, &client, &config).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_retry_after_server_error() -> Result<(), Box<dyn std::error::Error>> {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let url = format!("{}/flaky", mock_server.uri());

    let no_retries = test_config(&mock_server.uri());
    let client = build_client(&no_retries)?;
    assert!(get_with_retries(&client, &url, &no_retries).await.is_err());

    Mock::given(method("GET"))
        .and(path("/flaky2"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let one_retry = test_config(&mock_server.uri()).with_max_retries(1);
    let url = format!("{}/flaky2", mock_server.uri());
    let response = get_with_retries(&client, &url, &one_retry).await?;
    assert_eq!(response.text().await?, "ok");
    Ok(())
}
// end of test section for `scrape_page`

// tests for robots policy start here

#[test]
fn test_robots_url_uses_origin() -> Result<(), Box<dyn std::error::Error>> {
    assert_eq!(robots_url("https://example.com/a/b?q=1#frag")?, "https://example.com/robots.txt");
    assert_eq!(robots_url("http://127.0.0.1:8080/page")?, "http://127.0.0.1:8080/robots.txt");
    assert!(robots_url("not a url").is_err());
    Ok(())
}

#[test]
fn test_latin1_fallback() -> Result<(), Box<dyn std::error::Error>> {
    let body: &[u8] = b"User-agent: *\nDisallow: /priv\xe9\n";
    assert!(TextEncoding::Utf8.decode(body).is_err());
    assert_eq!(TextEncoding::Latin1.decode(body)?, "User-agent: *\nDisallow: /priv\u{e9}\n");

    let robot = parse_robots(ROBOTS_AGENT, body)?;
    assert!(robot.allowed("https://example.com/public"));
    Ok(())
}

async fn robots_server(body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;
    server
}

fn robots_policy(config: CrawlerConfig) -> RobotsPolicy {
    let client = build_client(&config).unwrap();
    RobotsPolicy::new(client, Arc::new(config))
}

#[tokio::test]
async fn test_robots_disallow_all() {
    let server = robots_server("User-agent: *\nDisallow: /\n").await;
    let mut policy = robots_policy(test_config(&server.uri()));
    assert!(!policy.allowed(&format!("{}/anything", server.uri())).await);
}

#[tokio::test]
async fn test_robots_allows_unlisted_paths() {
    let server = robots_server("User-agent: *\nDisallow: /private\n").await;
    let mut policy = robots_policy(test_config(&server.uri()));
    assert!(policy.allowed(&format!("{}/public", server.uri())).await);
    assert!(!policy.allowed(&format!("{}/private/page", server.uri())).await);
}

/// Missing robots.txt fails closed
#[tokio::test]
async fn test_robots_missing_fails_closed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut policy = robots_policy(test_config(&server.uri()));
    assert!(!policy.allowed(&format!("{}/page", server.uri())).await);
}

#[tokio::test]
async fn test_robots_fetched_once_per_origin() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /\n"))
        .expect(1)
        .mount(&server)
        .await;

    let mut policy = robots_policy(test_config(&server.uri()));
    let page = format!("{}/a", server.uri());
    assert!(policy.allowed(&page).await);
    assert!(policy.allowed(&page).await);
    assert!(policy.allowed(&format!("{}/b", server.uri())).await);
}
// end of robots policy tests

// test suite for `crawl` start here

/// A page linking to itself once and to another page twice
#[tokio::test]
async fn test_self_link_and_repeated_link_weights() {
    let seed = "https://site.test/";
    let site = FakeSite::default()
        .page(seed, &[seed, "https://site.test/other", "https://site.test/other"])
        .page("https://site.test/other", &[]);

    let state = crawl(&test_config(seed), &mut AllowAll, &site).await;

    assert_eq!(state.graph.weight(seed, seed), Some(1));
    assert_eq!(state.graph.weight(seed, "https://site.test/other"), Some(2));
    assert_eq!(state.graph.edge_count(), 2);
}

/// Cycles are fine, every distinct URL is expanded exactly once
#[tokio::test]
async fn test_each_url_expanded_once() {
    let a = "https://site.test/";
    let b = "https://site.test/b";
    let c = "https://site.test/c";
    let site = FakeSite::default()
        .page(a, &[b, c, b])
        .page(b, &[a, c])
        .page(c, &[a, b, c]);

    let state = crawl(&test_config(a), &mut AllowAll, &site).await;

    for url in [a, b, c] {
        assert_eq!(site.fetch_count(url), 1, "{} expanded more than once", url);
    }
    assert_eq!(state.links_crawled_count, 3);
    assert_eq!(state.visited_urls.len(), 3);
    // a-b seen from a twice and from b once
    assert_eq!(state.graph.weight(a, b), Some(3));
}

#[tokio::test]
async fn test_depth_first_order() {
    let seed = "https://site.test/";
    let site = FakeSite::default()
        .page(seed, &["https://site.test/a", "https://site.test/b"])
        .page("https://site.test/a", &["https://site.test/c"])
        .page("https://site.test/b", &[])
        .page("https://site.test/c", &[]);

    crawl(&test_config(seed), &mut AllowAll, &site).await;

    assert_eq!(
        *site.fetches.borrow(),
        vec![seed, "https://site.test/a", "https://site.test/c", "https://site.test/b"]
    );
}

/// Depth 0 expands only the seed, its links still become edges
#[tokio::test]
async fn test_max_depth_respected() {
    let seed = "https://site.test/";
    let site = FakeSite::default()
        .page(seed, &["https://site.test/child1"])
        .page("https://site.test/child1", &["https://site.test/child2"]);

    let state = crawl(&test_config(seed).with_max_depth(0), &mut AllowAll, &site).await;

    assert!(state.is_visited(seed));
    assert!(!state.is_visited("https://site.test/child1"));
    assert_eq!(site.fetch_count("https://site.test/child1"), 0);
    assert_eq!(state.graph.weight(seed, "https://site.test/child1"), Some(1));
    assert!(!state.graph.contains("https://site.test/child2"));
}

#[tokio::test]
async fn test_disallowed_seed_gives_empty_graph() {
    let seed = "https://site.test/";
    let site = FakeSite::default().page(seed, &["https://site.test/a"]);
    let mut policy = Deny(HashSet::from([seed.to_string()]));

    let state = crawl(&test_config(seed), &mut policy, &site).await;

    assert!(state.graph.is_empty());
    assert_eq!(state.graph.edge_count(), 0);
    assert!(state.visited_urls.is_empty());
    assert_eq!(site.fetch_count(seed), 0);
}

/// Disallowed links are recorded as edges but never expanded
#[tokio::test]
async fn test_disallowed_link_not_expanded() {
    let seed = "https://site.test/";
    let blocked = "https://site.test/private";
    let site = FakeSite::default()
        .page(seed, &[blocked, "https://site.test/open"])
        .page(blocked, &["https://site.test/secret"])
        .page("https://site.test/open", &[]);
    let mut policy = Deny(HashSet::from([blocked.to_string()]));

    let state = crawl(&test_config(seed), &mut policy, &site).await;

    assert_eq!(site.fetch_count(blocked), 0);
    assert!(!state.is_visited(blocked));
    assert_eq!(state.graph.weight(seed, blocked), Some(1));
    assert!(state.is_visited("https://site.test/open"));
}

/// A dead link is treated as a page without links, the crawl moves on
#[tokio::test]
async fn test_fetch_failure_is_absorbed() {
    let seed = "https://site.test/";
    let site = FakeSite::default()
        .page(seed, &["https://site.test/dead", "https://site.test/alive"])
        .page("https://site.test/alive", &["https://site.test/leaf"])
        .page("https://site.test/leaf", &[]);

    let state = crawl(&test_config(seed), &mut AllowAll, &site).await;

    assert!(state.is_visited("https://site.test/dead"));
    assert!(state.is_visited("https://site.test/leaf"));
    assert_eq!(state.graph.edge_count(), 3);
}

fn tree_site(fanout: usize, depth: usize) -> (String, FakeSite) {
    let seed = "https://site.test/".to_string();
    let mut site = FakeSite::default();
    let mut level = vec![seed.clone()];
    for _ in 0..=depth {
        let mut next = Vec::new();
        for page in &level {
            let children: Vec<String> = (0..fanout).map(|i| format!("{}{}/", page, i)).collect();
            site.pages.insert(page.clone(), children.clone());
            next.extend(children);
        }
        level = next;
    }
    (seed, site)
}

#[tokio::test]
async fn test_edge_budget_is_best_effort() {
    let (seed, site) = tree_site(3, 3);
    let config = test_config(&seed).with_max_depth(3).with_max_edges(10);

    let state = crawl(&config, &mut AllowAll, &site).await;

    let edges = state.graph.edge_count();
    assert!(edges >= 10);
    // every page still on the stack may add one edge after the budget is hit
    assert!(edges <= 10 + config.max_depth, "{} edges", edges);
    assert!(state.visited_urls.len() < site.pages.len());
}

#[tokio::test]
async fn test_budget_stops_current_page() {
    let seed = "https://site.test/";
    let site = FakeSite::default().page(
        seed,
        &["https://site.test/a", "https://site.test/b", "https://site.test/c"],
    );

    let state = crawl(&test_config(seed).with_max_edges(2), &mut AllowAll, &site).await;

    assert_eq!(state.graph.edge_count(), 2);
    assert!(state.is_visited("https://site.test/a"));
    // the link that hit the budget is not descended into
    assert!(!state.is_visited("https://site.test/b"));
    assert!(!state.graph.contains("https://site.test/c"));
}

#[tokio::test]
async fn test_graph_invariants() {
    let (seed, site) = tree_site(2, 2);
    let state = crawl(&test_config(&seed).with_max_depth(2), &mut AllowAll, &site).await;

    assert!(state.graph.edge_count() > 0);
    for (a, b, weight) in state.graph.edges() {
        assert!(weight >= 1);
        assert!(state.is_visited(a) || state.is_visited(b));
    }
}

/// End to end over HTTP with robots.txt in place
#[tokio::test]
async fn test_crawl_site_over_http() -> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::start().await;
    let root = format!("{}/start", server.uri());
    let a = format!("{}/a", server.uri());
    let b = format!("{}/b", server.uri());

    Mock::given(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /b\n"))
        .mount(&server).await;
    Mock::given(path("/start"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(r#"
            <a href="{a}">A</a>
            <a href="{b}">B</a>
            <a href="/relative">Dropped</a>
        "#)))
        .mount(&server).await;
    Mock::given(path("/a"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(r#"<a href="{root}">Home</a>"#)))
        .mount(&server).await;

    let config = Arc::new(test_config(&root));
    let state = crawl_site(config).await?;

    assert!(state.is_visited(&root));
    assert!(state.is_visited(&a));
    assert!(!state.is_visited(&b));
    assert_eq!(state.graph.weight(&root, &a), Some(2));
    assert_eq!(state.graph.weight(&root, &b), Some(1));
    assert_eq!(state.graph.edge_count(), 2);

    let graph = build_graph_from_state(state);
    assert_eq!(graph.node_count(), 3);
    Ok(())
}
