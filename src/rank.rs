use serde::{Deserialize, Serialize};

use crate::chain::NodeOrdering;
use crate::error::{PipelineError, Result};

/// A URL and its stationary probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub label: String,
    pub probability: f64,
}

impl RankedEntry {
    pub fn new(label: impl Into<String>, probability: f64) -> Self {
        Self { label: label.into(), probability }
    }
}

/// Pairs the first probability row with `ordering` and sorts it descending.
///
/// The row must have exactly one value per ordered node. Equal probabilities keep
/// their ordering position. The full list is returned, callers truncate.
pub fn rank(probabilities: &[Vec<f64>], ordering: &NodeOrdering) -> Result<Vec<RankedEntry>> {
    if ordering.is_empty() {
        return Ok(Vec::new());
    }

    let row = probabilities.first().map(Vec::as_slice).unwrap_or_default();
    if row.len() != ordering.len() {
        return Err(PipelineError::RankAlignment {
            probabilities: row.len(),
            nodes: ordering.len(),
        });
    }

    let mut ranking: Vec<RankedEntry> = ordering
        .labels()
        .iter()
        .zip(row)
        .map(|(label, &probability)| RankedEntry::new(label.as_str(), probability))
        .collect();
    // sort_by is stable, ties stay in ordering position
    ranking.sort_by(|a, b| b.probability.total_cmp(&a.probability));

    Ok(ranking)
}

/// Print the top `k` entries in a readable format
pub fn print_ranking(ranking: &[RankedEntry], k: usize) {
    if ranking.is_empty() {
        println!("No pages ranked.");
        return;
    }
    println!("Top {} of {} pages by stationary probability:", k.min(ranking.len()), ranking.len());
    for (i, entry) in ranking.iter().take(k).enumerate() {
        println!("  {:>3}. {:.6}  {}", i + 1, entry.probability, entry.label);
    }
}
