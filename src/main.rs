use link_ranker::{config, pipeline, rank};

use log2::*;
use anyhow::Result;
use url::Url;
use std::time::Instant;

/// Indicates start time of a project, lazily initialized
pub static START_TIME: once_cell::sync::Lazy<Instant> = once_cell::sync::Lazy::new(Instant::now);

#[tokio::main]
async fn main() -> Result<()> {
    let _ = *START_TIME;
    let cfg = config::Config::new();
    cfg.validate()?;
    let _log2 = stdout()
        .module(true) // include module name
        .module_with_line(true) // include line number from module
        .module_filter(|module| module.starts_with("link_ranker")) // include only modules having this pattern
        .compress(false) // compress output
        .level(cfg.log_level.to_string()) // level of logging (trace - error)
        .start();

    let start_url = match &cfg.start_url {
        Some(url) => url.clone(),
        None => config::prompt_start_url(std::io::stdin().lock(), std::io::stdout())?,
    };
    let start_url = Url::parse(&start_url)?;

    let pipeline_cfg = cfg.pipeline_config(start_url);

    match pipeline::run_pipeline(&pipeline_cfg).await {
        Ok(report) => {
            info!(
                "Crawled {} pages into {} nodes and {} edges",
                report.pages_crawled, report.node_count, report.edge_count
            );
            rank::print_ranking(&report.ranking, cfg.top_k);

            if let Some(path) = &cfg.output_file {
                std::fs::write(path, serde_json::to_string_pretty(&report.ranking)?)?;
                info!("Ranking written to {:?}", path);
            }
            info!("Finished in {:.2?}", START_TIME.elapsed());
        }
        Err(e) => {
            error!("Ranking failed: {}", e);
            return Err(e);
        }
    }

    Ok(())
}
