//! Link graph to Markov chain conversion.
//!
//! The graph is serialized into a square integer adjacency matrix under a
//! [`NodeOrdering`], then each row is divided by its sum to get a transition
//! matrix. The same ordering value is handed on to ranking, so matrix rows and
//! solver output are always read back against the enumeration that produced them.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use crate::error::{PipelineError, Result};
use crate::link_graph::WeightedGraph;

/// Mapping between node URLs and matrix indices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeOrdering {
    labels: Vec<String>,
    index: HashMap<String, usize>,
}

impl NodeOrdering {
    /// Graph insertion order
    pub fn from_graph(graph: &WeightedGraph) -> Self {
        Self::from_labels(graph.nodes())
    }

    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordering = Self::default();
        for label in labels {
            let label = label.into();
            if ordering.index.contains_key(&label) {
                continue;
            }
            ordering.index.insert(label.clone(), ordering.labels.len());
            ordering.labels.push(label);
        }
        ordering
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// How a page linking to itself counts when its row is normalized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum SelfLoopPolicy {
    /// Diagonal weight stays in the row and in its sum
    #[default]
    Include,
    /// Diagonal is zeroed before normalizing
    Exclude,
}

/// Square matrix of edge weights
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdjacencyMatrix {
    rows: Vec<Vec<u64>>,
}

/// Builds the symmetric adjacency matrix of `graph` and the ordering it uses
pub fn to_adjacency_matrix(graph: &WeightedGraph) -> (AdjacencyMatrix, NodeOrdering) {
    let ordering = NodeOrdering::from_graph(graph);
    let n = ordering.len();
    let mut rows = vec![vec![0u64; n]; n];

    for (a, b, weight) in graph.edges() {
        // both endpoints come from the same graph the ordering was built from
        if let (Some(i), Some(j)) = (ordering.index_of(a), ordering.index_of(b)) {
            rows[i][j] = u64::from(weight);
            rows[j][i] = u64::from(weight);
        }
    }

    (AdjacencyMatrix { rows }, ordering)
}

impl AdjacencyMatrix {
    pub fn from_rows(rows: Vec<Vec<u64>>) -> Result<Self> {
        check_square(&rows)?;
        Ok(Self { rows })
    }

    pub fn order(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Vec<u64>] {
        &self.rows
    }

    pub fn get(&self, i: usize, j: usize) -> Option<u64> {
        self.rows.get(i)?.get(j).copied()
    }

    /// Comma-delimited integers, one row per line
    pub fn to_text(&self) -> String {
        format_rows(&self.rows, ",", |v| v.to_string())
    }

    pub fn parse(text: &str) -> Result<Self> {
        Self::from_rows(parse_rows(text)?)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_text())?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }
}

/// Row-normalized adjacency matrix.
///
/// Rows with a positive sum add up to 1. Rows of isolated nodes stay all zero,
/// so consumers must cope with rows that are not stochastic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionMatrix {
    rows: Vec<Vec<f64>>,
}

/// Normalizes with self-loops counted in the row sum
pub fn normalize(adjacency: &AdjacencyMatrix) -> TransitionMatrix {
    normalize_with(adjacency, SelfLoopPolicy::Include)
}

pub fn normalize_with(adjacency: &AdjacencyMatrix, self_loops: SelfLoopPolicy) -> TransitionMatrix {
    let rows = adjacency
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut row: Vec<f64> = row.iter().map(|&w| w as f64).collect();
            if self_loops == SelfLoopPolicy::Exclude {
                row[i] = 0.0;
            }
            let sum: f64 = row.iter().sum();
            if sum > 0.0 {
                row.iter_mut().for_each(|p| *p /= sum);
            }
            row
        })
        .collect();

    TransitionMatrix { rows }
}

/// Reads an adjacency file and normalizes it. Malformed files are fatal.
pub fn normalize_file(path: &Path, self_loops: SelfLoopPolicy) -> Result<TransitionMatrix> {
    let adjacency = AdjacencyMatrix::read_from(path)?;
    Ok(normalize_with(&adjacency, self_loops))
}

impl TransitionMatrix {
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        check_square(&rows)?;
        Ok(Self { rows })
    }

    pub fn order(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.rows.get(i)?.get(j).copied()
    }

    pub fn row_sum(&self, i: usize) -> f64 {
        self.rows.get(i).map(|row| row.iter().sum()).unwrap_or(0.0)
    }

    /// Space-delimited, six decimals
    pub fn to_text(&self) -> String {
        format_rows(&self.rows, " ", |v| format!("{:.6}", v))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Self::from_rows(parse_rows(text)?)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_text())?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }
}

fn format_rows<T>(rows: &[Vec<T>], delimiter: &str, fmt: impl Fn(&T) -> String) -> String {
    let mut text = String::new();
    for row in rows {
        let line: Vec<String> = row.iter().map(&fmt).collect();
        text.push_str(&line.join(delimiter));
        text.push('\n');
    }
    text
}

/// Values separated by commas and/or whitespace. Blank lines and `#` comments are skipped.
fn parse_rows<T>(text: &str) -> Result<Vec<Vec<T>>>
where
    T: FromStr,
    T::Err: Display,
{
    let mut rows: Vec<Vec<T>> = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let row = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|field| !field.is_empty())
            .map(|field| {
                field.parse::<T>().map_err(|e| PipelineError::MatrixParse {
                    line: number + 1,
                    reason: format!("{:?}: {}", field, e),
                })
            })
            .collect::<Result<Vec<T>>>()?;

        if let Some(first) = rows.first() {
            if first.len() != row.len() {
                return Err(PipelineError::MatrixParse {
                    line: number + 1,
                    reason: format!("expected {} values, found {}", first.len(), row.len()),
                });
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

fn check_square<T>(rows: &[Vec<T>]) -> Result<()> {
    for row in rows {
        if row.len() != rows.len() {
            return Err(PipelineError::MatrixShape { rows: rows.len(), cols: row.len() });
        }
    }
    Ok(())
}
