use log2::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::chain::{normalize_file, to_adjacency_matrix, SelfLoopPolicy};
use crate::crawler::{build_graph_from_state, crawl_site, CrawlerConfig};
use crate::error::Result;
use crate::link_graph::WeightedGraph;
use crate::rank::{rank, RankedEntry};
use crate::solver::{Solver, StationarySolver};

pub const ADJACENCY_FILE: &str = "adjacency.txt";

/// Everything one run needs, from seed URL to solver
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub crawler: CrawlerConfig,
    pub solver: Solver,
    /// Where the adjacency, transition, results and errors files are written
    pub work_dir: PathBuf,
    pub self_loops: SelfLoopPolicy,
}

/// Outcome of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    pub pages_crawled: usize,
    pub node_count: usize,
    pub edge_count: usize,
    pub converged: bool,
    /// Every node, most probable first
    pub ranking: Vec<RankedEntry>,
}

/// Matrix build, normalization, solve and ranking for an already crawled graph.
///
/// The adjacency matrix goes through its file on disk before normalization, the
/// ordering from the build is the one used to label the solver output. An empty
/// graph ranks nothing and never reaches the solver.
pub async fn rank_graph<S: StationarySolver>(
    graph: &WeightedGraph,
    solver: &S,
    work_dir: &Path,
    self_loops: SelfLoopPolicy,
) -> Result<PipelineReport> {
    let mut report = PipelineReport {
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        converged: true,
        ..Default::default()
    };
    if graph.is_empty() {
        info!("Graph is empty, nothing to rank");
        return Ok(report);
    }

    let (adjacency, ordering) = to_adjacency_matrix(graph);
    let adjacency_path = work_dir.join(ADJACENCY_FILE);
    adjacency.write_to(&adjacency_path)?;
    info!("Adjacency matrix saved to {:?}", adjacency_path);

    let transition = normalize_file(&adjacency_path, self_loops)?;
    let output = solver.solve(&transition).await?;
    if !output.converged {
        warn!("Stationary distribution did not converge, ranking the last iterate");
    }

    report.converged = output.converged;
    report.ranking = rank(&output.probabilities, &ordering)?;
    Ok(report)
}

/// Crawls from the configured seed and ranks the resulting graph
pub async fn run_pipeline(config: &PipelineConfig) -> anyhow::Result<PipelineReport> {
    std::fs::create_dir_all(&config.work_dir)?;

    let state = crawl_site(Arc::new(config.crawler.clone())).await?;
    let pages_crawled = state.links_crawled_count;
    let graph = build_graph_from_state(state);

    let mut report = rank_graph(&graph, &config.solver, &config.work_dir, config.self_loops).await?;
    report.pages_crawled = pages_crawled;
    Ok(report)
}
