use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors of the matrix, solve and rank phases.
///
/// Per-URL failures (robots fetch, page fetch) never end up here: the crawler
/// logs them and moves on.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed matrix at line {line}: {reason}")]
    MatrixParse { line: usize, reason: String },

    #[error("Matrix is not square: {rows} rows, {cols} columns")]
    MatrixShape { rows: usize, cols: usize },

    #[error("Solver {program:?} failed with {status}: {stderr}")]
    SolverFailed {
        program: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("Solver {program:?} did not finish within {timeout_sec}s")]
    SolverTimeout { program: PathBuf, timeout_sec: u64 },

    #[error("Unusable solver output: {0}")]
    SolverOutput(String),

    #[error("Got {probabilities} probabilities for {nodes} nodes")]
    RankAlignment { probabilities: usize, nodes: usize },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
