//! Stationary distribution solvers.
//!
//! Both solvers speak the same results protocol: one line per probability row,
//! fields separated by `;`, the first field being `1` when the iteration
//! converged and `0` when it hit its run limit.

use log2::{debug, info, warn};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::chain::TransitionMatrix;
use crate::error::{PipelineError, Result};

pub const TRANSITION_FILE: &str = "transition.txt";
pub const RESULTS_FILE: &str = "results.txt";
pub const ERRORS_FILE: &str = "errors.txt";

/// Largest per-component change still counted as converged
pub const RESIDUE: f64 = 1e-10;
pub const DEFAULT_MAX_RUNS: usize = 10_000;
pub const DEFAULT_SOLVER_TIMEOUT_SEC: u64 = 60;

/// Probability rows produced by a solver, convergence flag stripped
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutput {
    pub converged: bool,
    pub probabilities: Vec<Vec<f64>>,
}

pub trait StationarySolver {
    fn solve(&self, transition: &TransitionMatrix) -> impl Future<Output = Result<SolverOutput>>;
}

/// Splits results text into rows of floats
pub fn parse_results(text: &str) -> Result<Vec<Vec<f64>>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(number, line)| {
            line.split(';')
                .map(|field| {
                    field.trim().parse::<f64>().map_err(|e| {
                        PipelineError::SolverOutput(format!("row {}: {:?}: {}", number + 1, field, e))
                    })
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect()
}

pub fn read_results(path: &Path) -> Result<Vec<Vec<f64>>> {
    parse_results(&std::fs::read_to_string(path)?)
}

/// Checks every row is `flag` followed by `order` probabilities and strips the flags
pub fn solver_output(rows: Vec<Vec<f64>>, order: usize) -> Result<SolverOutput> {
    if rows.is_empty() {
        return Err(PipelineError::SolverOutput("solver produced no results".to_string()));
    }

    let mut converged = true;
    let mut probabilities = Vec::with_capacity(rows.len());
    for (number, row) in rows.into_iter().enumerate() {
        if row.len() != order + 1 {
            return Err(PipelineError::SolverOutput(format!(
                "row {} has {} fields, expected a flag and {} probabilities",
                number + 1,
                row.len(),
                order
            )));
        }
        converged &= row[0] != 0.0;
        probabilities.push(row[1..].to_vec());
    }

    Ok(SolverOutput { converged, probabilities })
}

/// Formats one result row the way external solvers print it
pub fn format_result_row(converged: bool, probabilities: &[f64]) -> String {
    let mut fields = vec![if converged { "1".to_string() } else { "0".to_string() }];
    fields.extend(probabilities.iter().map(|p| format!("{:.6}", p)));
    fields.join(";")
}

/// Vector-matrix product iteration started from the first state.
///
/// Repeats `v <- v * P` until no component moves by more than [`RESIDUE`] or
/// `max_runs` products have been taken.
#[derive(Debug, Clone)]
pub struct PowerIterationSolver {
    pub max_runs: usize,
    pub residue: f64,
}

impl Default for PowerIterationSolver {
    fn default() -> Self {
        Self { max_runs: DEFAULT_MAX_RUNS, residue: RESIDUE }
    }
}

impl PowerIterationSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_runs(mut self, max_runs: usize) -> Self {
        self.max_runs = max_runs;
        self
    }

    pub fn iterate(&self, transition: &TransitionMatrix) -> SolverOutput {
        let n = transition.order();
        if n == 0 {
            return SolverOutput { converged: true, probabilities: vec![Vec::new()] };
        }

        let rows = transition.rows();
        let mut vector = vec![0.0; n];
        vector[0] = 1.0;

        let mut converged = false;
        for run in 1..=self.max_runs {
            let next: Vec<f64> = (0..n)
                .map(|i| (0..n).map(|j| rows[j][i] * vector[j]).sum::<f64>())
                .collect();
            let settled = vector
                .iter()
                .zip(&next)
                .all(|(old, new)| (old - new).abs() <= self.residue);
            vector = next;
            if settled {
                debug!("Power iteration converged after {} runs", run);
                converged = true;
                break;
            }
        }

        SolverOutput { converged, probabilities: vec![vector] }
    }
}

impl StationarySolver for PowerIterationSolver {
    async fn solve(&self, transition: &TransitionMatrix) -> Result<SolverOutput> {
        Ok(self.iterate(transition))
    }
}

/// Runs a separate solver executable on the transition matrix file.
///
/// The matrix is written to `work_dir`, the program is invoked with the file name
/// as its last argument, stdout goes to the results file and stderr to the errors
/// file. A non-zero exit, a spawn failure or a timeout are errors.
#[derive(Debug, Clone)]
pub struct ExternalSolver {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub work_dir: PathBuf,
    pub timeout: Duration,
}

impl ExternalSolver {
    pub fn new(program: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            work_dir: work_dir.into(),
            timeout: Duration::from_secs(DEFAULT_SOLVER_TIMEOUT_SEC),
        }
    }

    /// Arguments placed before the matrix file name
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn transition_path(&self) -> PathBuf {
        self.work_dir.join(TRANSITION_FILE)
    }

    pub fn results_path(&self) -> PathBuf {
        self.work_dir.join(RESULTS_FILE)
    }

    pub fn errors_path(&self) -> PathBuf {
        self.work_dir.join(ERRORS_FILE)
    }

    fn failed(&self, status: impl Into<String>, stderr: impl Into<String>) -> PipelineError {
        PipelineError::SolverFailed {
            program: self.program.clone(),
            status: status.into(),
            stderr: stderr.into(),
        }
    }
}

impl StationarySolver for ExternalSolver {
    async fn solve(&self, transition: &TransitionMatrix) -> Result<SolverOutput> {
        let matrix_path = self.transition_path();
        transition.write_to(&matrix_path)?;
        info!("Running solver {:?} on {:?}", self.program, matrix_path);

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(&matrix_path)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(self.failed("spawn error", e.to_string())),
            Err(_) => {
                return Err(PipelineError::SolverTimeout {
                    program: self.program.clone(),
                    timeout_sec: self.timeout.as_secs(),
                })
            }
        };

        std::fs::write(self.results_path(), &output.stdout)?;
        std::fs::write(self.errors_path(), &output.stderr)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(self.failed(output.status.to_string(), stderr));
        }

        let result = solver_output(read_results(&self.results_path())?, transition.order())?;
        if !result.converged {
            warn!("Solver {:?} reported no convergence", self.program);
        }
        Ok(result)
    }
}

/// Solver picked at startup
#[derive(Debug, Clone)]
pub enum Solver {
    BuiltIn(PowerIterationSolver),
    External(ExternalSolver),
}

impl StationarySolver for Solver {
    async fn solve(&self, transition: &TransitionMatrix) -> Result<SolverOutput> {
        match self {
            Solver::BuiltIn(solver) => solver.solve(transition).await,
            Solver::External(solver) => solver.solve(transition).await,
        }
    }
}
