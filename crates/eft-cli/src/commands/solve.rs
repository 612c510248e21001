use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use eft_core::Parameter;
use eft_scale::{model_digest, read_stats, write_model, SolveMode, SolveOpts, TermSolver};

use super::{grid_parameters, load_config};

#[derive(Args, Debug)]
pub struct SolveArgs {
    /// Accumulated-statistics document.
    #[arg(long)]
    pub stats: PathBuf,
    /// Parameter-configuration document providing the step values.
    #[arg(long)]
    pub config: PathBuf,
    /// Output scaling-model document.
    #[arg(long)]
    pub out: PathBuf,
    /// How the statistics were accumulated (finite-difference or decomposed).
    #[arg(long, default_value = "finite-difference")]
    pub mode: SolveMode,
    /// Drop terms whose largest magnitude is below this value.
    #[arg(long)]
    pub prune: Option<f64>,
    /// Interpret `--prune` relative to the largest term magnitude.
    #[arg(long, requires = "prune")]
    pub prune_relative: bool,
}

pub fn run(args: &SolveArgs) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args.config)?;
    let (grid, acc) = read_stats(&args.stats)?;
    let parameters = grid_parameters(&config, &grid)?;
    let steps: Vec<f64> = parameters.iter().map(Parameter::step).collect();

    let solver = TermSolver::new(&grid, &steps)?;
    tracing::debug!(parameters = ?grid.names(), steps = ?solver.steps(), "solving");
    let mut model = solver.solve(&acc, &SolveOpts { mode: args.mode })?;
    if let Some(threshold) = args.prune {
        model = model.pruned(threshold, args.prune_relative);
    }
    write_model(&args.out, &model)?;
    tracing::info!(
        terms = model.terms().len(),
        bins = model.nbins(),
        digest = %model_digest(&model)?,
        "wrote scaling model"
    );
    Ok(())
}
