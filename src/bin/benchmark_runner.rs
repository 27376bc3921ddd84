//! Times factorized against materialized execution of the benchmark tasks.
//!
//! ```bash
//! benchmark_runner --fpath benchparams/synth.json --task micro \
//!     --output-dir results --mode trinity --tr 10 --fr 2
//! ```
//!
//! Without `--tr`/`--fr` every ratio listed in the metadata file is run.
//! With `--check` no timing happens; each task is evaluated on both
//! representations and the results are compared.
//!
//! Every task runs even if an earlier one fails; the process exits with an
//! error listing the failed and differing tasks.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::info;

use normalized_algebra::avatar::{Avatar, NdarrayAvatar};
use normalized_algebra::dataset::{synthesize, DatasetMeta, Mode};
use normalized_algebra::harness::{
    output_path, select_tasks, RunReport, TaskOperands, DEFAULT_REPETITIONS,
};

#[derive(Parser, Debug)]
#[command(
    name = "benchmark_runner",
    version,
    about = "Benchmark normalized matrix operators on synthesized joins",
    long_about = None,
)]
struct Args {
    /// Dataset metadata (JSON).
    #[arg(long)]
    fpath: PathBuf,

    /// Task name, or one of `all`, `micro`, `algorithm`.
    #[arg(long, default_value = "all")]
    task: String,

    #[arg(long, default_value = "results")]
    output_dir: PathBuf,

    /// `trinity` (factorized) or `materialized`.
    #[arg(long, default_value = "trinity")]
    mode: Mode,

    /// Tuple ratio; defaults to every entry of `TRs`.
    #[arg(long)]
    tr: Option<usize>,

    /// Feature ratio; defaults to every entry of `FRs`.
    #[arg(long)]
    fr: Option<usize>,

    #[arg(long, default_value_t = DEFAULT_REPETITIONS)]
    repetitions: usize,

    /// Seed for the synthesized matrices and task operands.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Compare representations instead of timing.
    #[arg(long, default_value_t = false)]
    check: bool,

    #[arg(long, default_value_t = 1e-6)]
    tolerance: f64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let meta = DatasetMeta::from_path(&args.fpath)?;
    let tasks = select_tasks(&args.task)?;
    info!("tasks: {:?}", tasks);

    let tuple_ratios = args.tr.map_or_else(|| meta.tuple_ratios.clone(), |tr| vec![tr]);
    let feature_ratios = args.fr.map_or_else(|| meta.feature_ratios.clone(), |fr| vec![fr]);

    let avatar: Arc<dyn Avatar> = Arc::new(NdarrayAvatar::new());
    let mut report = RunReport::new();

    for &tr in &tuple_ratios {
        for &fr in &feature_ratios {
            let matrices = synthesize(meta.n_r, meta.d_s, tr, fr, args.seed, Arc::clone(&avatar))?;
            let operands = TaskOperands::for_matrices(&matrices, args.seed);
            info!(
                "TR={} FR={}: join {}x{}",
                tr,
                fr,
                matrices.n_mat(),
                matrices.d_mat()
            );

            for &task in &tasks {
                if args.check {
                    if let Some(diff) = report.check_task(task, &matrices, &operands, args.tolerance) {
                        let verdict = if diff <= args.tolerance { "equal" } else { "DIFFERENT" };
                        println!("{} TR={} FR={}: {} (max diff {:e})", task, tr, fr, verdict, diff);
                    }
                    continue;
                }

                let path = output_path(&args.output_dir, task, &meta.output_meta, tr, fr, args.mode)?;
                report.time_task(task, matrices.data(args.mode), &operands, &path, args.repetitions);
            }
        }
    }

    report.into_result()
}
