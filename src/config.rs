use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::chain::SelfLoopPolicy;
use crate::crawler::config::{CrawlerConfig, DEFAULT_USER_AGENT};
use crate::pipeline::PipelineConfig;
use crate::solver::{ExternalSolver, PowerIterationSolver, Solver};

/// Log levels as defined in log2 crate
#[derive(Debug, Serialize, Deserialize, Clone, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}
/// All program arguments. `CrawlerConfig` and `PipelineConfig` are derived from it.
#[derive(Parser, Debug, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Seed URL, prompted for when missing
    #[arg(short, long)]
    pub start_url: Option<String>,
    /// Maximum link hops from the seed that still get expanded
    #[arg(long, default_value = "3")]
    pub max_depth: usize,
    /// Edge budget for the crawl
    #[arg(long, default_value = "500")]
    pub max_edges: usize,
    /// Delay between requests in milliseconds
    #[arg(short, long, default_value = "100")]
    pub request_delay: u64,
    /// Per-request timeout in seconds
    #[arg(long, default_value = "2")]
    pub request_timeout: u64,
    /// Retries after a failed request
    #[arg(long, default_value = "0")]
    pub max_retries: usize,
    /// User-Agent header sent with every request
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,
    /// External solver executable, the built-in power iteration is used when missing
    #[arg(long)]
    pub solver: Option<PathBuf>,
    /// Seconds the external solver may run
    #[arg(long, default_value = "60")]
    pub solver_timeout: u64,
    /// Directory for the matrix, results and errors files
    #[arg(short, long, default_value = ".")]
    pub work_dir: PathBuf,
    /// Number of ranked pages to print
    #[arg(long, default_value = "10")]
    pub top_k: usize,
    /// Whether a page linking to itself counts in its own row
    #[arg(long, default_value = "include", value_enum)]
    pub self_loops: SelfLoopPolicy,
    /// Write the full ranking as JSON to this file
    #[arg(short, long)]
    pub output_file: Option<PathBuf>,
    /// Logging level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", value_enum)]
    pub log_level: LogLevel,
}

impl Config {
    pub fn new() -> Self {
        Self::parse()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_edges == 0 {
            anyhow::bail!("max_edges must be greater than 0");
        }
        if self.top_k == 0 {
            anyhow::bail!("top_k must be greater than 0");
        }
        if self.solver_timeout == 0 {
            anyhow::bail!("solver_timeout must be greater than 0");
        }
        if let Some(url) = &self.start_url {
            if !is_valid_start_url(url) {
                anyhow::bail!("start_url must be an https URL, got {}", url);
            }
        }
        Ok(())
    }

    pub fn crawler_config(&self, start_url: Url) -> CrawlerConfig {
        CrawlerConfig::new(start_url)
            .with_max_depth(self.max_depth)
            .with_max_edges(self.max_edges)
            .with_request_delay(self.request_delay)
            .with_request_timeout(self.request_timeout)
            .with_max_retries(self.max_retries)
            .with_user_agent(self.user_agent.clone())
    }

    pub fn pipeline_config(&self, start_url: Url) -> PipelineConfig {
        let solver = match &self.solver {
            Some(program) => Solver::External(
                ExternalSolver::new(program, &self.work_dir)
                    .with_timeout(Duration::from_secs(self.solver_timeout)),
            ),
            None => Solver::BuiltIn(PowerIterationSolver::new()),
        };

        PipelineConfig {
            crawler: self.crawler_config(start_url),
            solver,
            work_dir: self.work_dir.clone(),
            self_loops: self.self_loops,
        }
    }
}

/// Seed URLs must use https and parse
pub fn is_valid_start_url(url: &str) -> bool {
    url.starts_with("https") && Url::parse(url).is_ok()
}

/// Asks for a seed URL until a valid one is entered
pub fn prompt_start_url<R: BufRead, W: Write>(mut input: R, mut output: W) -> anyhow::Result<String> {
    loop {
        write!(output, "Enter the URL to start crawling from: ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            anyhow::bail!("no start URL given");
        }
        let url = line.trim();
        if is_valid_start_url(url) {
            return Ok(url.to_string());
        }
        writeln!(output, "Please enter a valid https URL.")?;
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        write!(f, "{}", s)
    }
}
