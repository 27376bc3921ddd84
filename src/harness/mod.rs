//! # Benchmark harness
//!
//! Named tasks over a [`NormalizedMatrix`], a timing loop that appends
//! per-iteration wall-clock milliseconds to a text file, and a cross-check
//! that evaluates a task on both representations of a synthesized join.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use log::{debug, error, info};
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::avatar::Avatar;
use crate::dataset::{Mode, SynthesizedMatrices};
use crate::error::{MatrixError, Result};
use crate::matrix::NormalizedMatrix;
use crate::regression::{LinearRegressionBuilder, DEFAULT_GAMMA, DEFAULT_ITERATIONS};
use crate::utils::Direction;

pub const DEFAULT_REPETITIONS: usize = 25;

/// Scalar used by the scalar microbenchmarks.
pub const TASK_SCALAR: f64 = 42.0;

/// Columns of the left multiplication argument and rows of the right one.
const MULTIPLICATION_WIDTH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    ScalarAddition,
    ScalarMultiplication,
    LeftMatrixMultiplication,
    RightMatrixMultiplication,
    RowWiseSum,
    ColumnWiseSum,
    ElementWiseSum,
    CrossProduct,
    LinearRegression,
}

pub const MICRO_TASKS: [Task; 7] = [
    Task::ScalarAddition,
    Task::ScalarMultiplication,
    Task::LeftMatrixMultiplication,
    Task::RightMatrixMultiplication,
    Task::RowWiseSum,
    Task::ColumnWiseSum,
    Task::ElementWiseSum,
];

pub const ALGORITHM_TASKS: [Task; 1] = [Task::LinearRegression];

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::ScalarAddition => "scalarAddition",
            Task::ScalarMultiplication => "scalarMultiplication",
            Task::LeftMatrixMultiplication => "leftMatrixMultiplication",
            Task::RightMatrixMultiplication => "rightMatrixMultiplication",
            Task::RowWiseSum => "rowWiseSum",
            Task::ColumnWiseSum => "columnWiseSum",
            Task::ElementWiseSum => "elementWiseSum",
            Task::CrossProduct => "crossProduct",
            Task::LinearRegression => "linearRegression",
        }
    }

    /// Evaluates the task on `data`.
    pub fn run(&self, data: &NormalizedMatrix, operands: &TaskOperands) -> Result<NormalizedMatrix> {
        match self {
            Task::ScalarAddition => data.add(TASK_SCALAR),
            Task::ScalarMultiplication => data.mul(TASK_SCALAR),
            Task::LeftMatrixMultiplication => data.mul(&operands.lmm_arg),
            Task::RightMatrixMultiplication => data.rmul(&operands.rmm_arg),
            Task::RowWiseSum => data.sum(Some(Direction::ROW)),
            Task::ColumnWiseSum => data.sum(Some(Direction::COLUMN)),
            Task::ElementWiseSum => data.sum(None),
            Task::CrossProduct => data.transpose()?.mul(data),
            Task::LinearRegression => {
                let mut model = LinearRegressionBuilder::new()
                    .iterations(operands.iterations)
                    .gamma(operands.gamma)
                    .build();
                model.fit(data, &operands.target, Some(&operands.w_init))?;
                model
                    .weights()
                    .cloned()
                    .ok_or(MatrixError::NotTrained)
            }
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Task {
    type Err = MatrixError;

    fn from_str(s: &str) -> Result<Self> {
        MICRO_TASKS
            .iter()
            .chain(ALGORITHM_TASKS.iter())
            .chain(std::iter::once(&Task::CrossProduct))
            .find(|task| task.name() == s)
            .copied()
            .ok_or_else(|| MatrixError::InvalidConfiguration(format!("unknown task `{}`", s)))
    }
}

/// Expands `all`, `micro` or `algorithm`, or parses a single task name.
pub fn select_tasks(selector: &str) -> Result<Vec<Task>> {
    let tasks = match selector {
        "all" => MICRO_TASKS.iter().chain(ALGORITHM_TASKS.iter()).copied().collect(),
        "micro" => MICRO_TASKS.to_vec(),
        "algorithm" => ALGORITHM_TASKS.to_vec(),
        name => vec![name.parse()?],
    };
    Ok(tasks)
}

/// Arguments shared by all tasks of one run.
#[derive(Debug, Clone)]
pub struct TaskOperands {
    /// `d × 2`
    pub lmm_arg: NormalizedMatrix,
    /// `2 × n`
    pub rmm_arg: NormalizedMatrix,
    /// `d × 1`
    pub w_init: NormalizedMatrix,
    pub target: NormalizedMatrix,
    pub iterations: usize,
    pub gamma: f64,
}

impl TaskOperands {
    /// Uniform random operands sized for an `n × d` join.
    pub fn generate(
        n: usize,
        d: usize,
        target: NormalizedMatrix,
        avatar: &Arc<dyn Avatar>,
        seed: u64,
    ) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut uniform = |shape: (usize, usize)| {
            let values = Array2::from_shape_fn(shape, |_| rng.random::<f64>());
            NormalizedMatrix::dense(values, Arc::clone(avatar))
        };
        let lmm_arg = uniform((d, MULTIPLICATION_WIDTH));
        let rmm_arg = uniform((MULTIPLICATION_WIDTH, n));
        let w_init = uniform((d, 1));
        TaskOperands {
            lmm_arg,
            rmm_arg,
            w_init,
            target,
            iterations: DEFAULT_ITERATIONS,
            gamma: DEFAULT_GAMMA,
        }
    }

    pub fn for_matrices(matrices: &SynthesizedMatrices, seed: u64) -> Self {
        Self::generate(
            matrices.n_mat(),
            matrices.d_mat(),
            matrices.target.clone(),
            matrices.materialized.avatar(),
            seed,
        )
    }
}

/// `{task}_{outputMeta}_TR={tr}_FR={fr}_{mode}.txt`
pub fn output_file_name(task: Task, output_meta: &str, tr: usize, fr: usize, mode: Mode) -> String {
    format!("{}_{}_TR={}_FR={}_{}.txt", task, output_meta, tr, fr, mode)
}

/// Output path inside `dir`, creating the directory if needed.
pub fn output_path(
    dir: &Path,
    task: Task,
    output_meta: &str,
    tr: usize,
    fr: usize,
    mode: Mode,
) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;
    Ok(dir.join(output_file_name(task, output_meta, tr, fr, mode)))
}

/// Runs `action` `repetitions` times and appends each duration, in whole
/// milliseconds, as one line of `path`. Every line is flushed and synced
/// before the next iteration starts.
///
/// The first failing iteration aborts the loop; lines already written stay
/// in the file. The file is only created once there is a line to write.
pub fn benchmark_it<T, F>(mut action: F, path: &Path, repetitions: usize) -> anyhow::Result<Vec<u128>>
where
    F: FnMut() -> Result<T>,
{
    info!("Beginning benchmark loop");
    let mut file: Option<File> = None;

    let mut times = Vec::with_capacity(repetitions);
    for i in 0..repetitions {
        let start = Instant::now();
        let result = action();
        let elapsed = start.elapsed().as_millis();
        result.with_context(|| format!("iteration {} of {}", i, path.display()))?;

        if file.is_none() {
            file = Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("opening {}", path.display()))?,
            );
        }
        if let Some(out) = file.as_mut() {
            writeln!(out, "{}", elapsed)?;
            out.flush()?;
            out.sync_all()?;
        }
        info!("iteration: {}/{} | time total: {}", i, repetitions, elapsed);
        times.push(elapsed);
    }
    Ok(times)
}

/// Failures and mismatches collected over a driver run.
#[derive(Debug, Default)]
pub struct RunReport {
    failed: Vec<(Task, String)>,
    mismatched: Vec<(Task, f64)>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Times `task` on `data` into `path`, recording a failure instead of
    /// returning it.
    pub fn time_task(
        &mut self,
        task: Task,
        data: &NormalizedMatrix,
        operands: &TaskOperands,
        path: &Path,
        repetitions: usize,
    ) -> Option<Vec<u128>> {
        match benchmark_it(|| task.run(data, operands), path, repetitions) {
            Ok(times) => {
                info!("{} -> {} ({} samples)", task, path.display(), times.len());
                Some(times)
            }
            Err(e) => {
                error!("{} failed: {:#}", task, e);
                self.failed.push((task, format!("{:#}", e)));
                None
            }
        }
    }

    /// Cross-checks `task` on both representations, recording a failure or
    /// a difference above `tolerance`.
    pub fn check_task(
        &mut self,
        task: Task,
        matrices: &SynthesizedMatrices,
        operands: &TaskOperands,
        tolerance: f64,
    ) -> Option<f64> {
        match max_abs_difference(task, matrices, operands) {
            Ok(diff) => {
                if diff > tolerance {
                    error!("{} differs between representations (max diff {:e})", task, diff);
                    self.mismatched.push((task, diff));
                }
                Some(diff)
            }
            Err(e) => {
                error!("{} failed: {}", task, e);
                self.failed.push((task, e.to_string()));
                None
            }
        }
    }

    pub fn failed(&self) -> &[(Task, String)] {
        &self.failed
    }

    pub fn mismatched(&self) -> &[(Task, f64)] {
        &self.mismatched
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.mismatched.is_empty()
    }

    /// An error naming every failed and mismatched task, if there was one.
    pub fn into_result(self) -> anyhow::Result<()> {
        if self.is_success() {
            return Ok(());
        }
        let failed: Vec<String> = self
            .failed
            .iter()
            .map(|(task, e)| format!("{}: {}", task, e))
            .collect();
        let mismatched: Vec<String> = self
            .mismatched
            .iter()
            .map(|(task, diff)| format!("{} (max diff {:e})", task, diff))
            .collect();
        bail!(
            "{} task(s) failed [{}], {} task(s) differ [{}]",
            failed.len(),
            failed.join("; "),
            mismatched.len(),
            mismatched.join("; ")
        )
    }
}

/// Largest absolute element difference between the task's results on the
/// factorized and materialized representations.
pub fn max_abs_difference(
    task: Task,
    matrices: &SynthesizedMatrices,
    operands: &TaskOperands,
) -> Result<f64> {
    let factorized = task.run(&matrices.factorized, operands)?.to_dense()?;
    let materialized = task.run(&matrices.materialized, operands)?.to_dense()?;
    if factorized.dim() != materialized.dim() {
        return Err(MatrixError::ShapeMismatch {
            op: task.name(),
            left: factorized.dim(),
            right: materialized.dim(),
        });
    }
    let diff = factorized
        .iter()
        .zip(materialized.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max);
    debug!("{}: max abs difference {}", task, diff);
    Ok(diff)
}

/// Whether both representations agree on `task` within `tolerance`.
pub fn compare_equality(
    task: Task,
    matrices: &SynthesizedMatrices,
    operands: &TaskOperands,
    tolerance: f64,
) -> Result<bool> {
    Ok(max_abs_difference(task, matrices, operands)? <= tolerance)
}
