use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use eft_core::Parameter;
use eft_scale::{
    accumulator_digest, ingest_events, model_digest, to_canonical_json_bytes, write_model,
    write_stats, BinAccumulator, BinEdges, IngestOpts, QuadraticTruth, SampleGrid, SolveMode,
    SolveOpts, SynthOpts, TermSolver,
};
use serde::Serialize;

use super::{grid_parameters, load_config};

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Parameter-configuration document.
    #[arg(long)]
    pub config: PathBuf,
    /// Number of observable bins.
    #[arg(long, default_value_t = 4)]
    pub bins: usize,
    /// Events generated per bin.
    #[arg(long, default_value_t = 1000)]
    pub events: usize,
    /// Master seed for the truth and the event sample.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    /// Relative per-event weight jitter.
    #[arg(long, default_value_t = 0.1)]
    pub noise: f64,
    /// Worker threads for ingestion; 0 uses the global pool.
    #[arg(long, default_value_t = 0)]
    pub workers: usize,
    /// Decompose event weights into coefficients while ingesting.
    #[arg(long)]
    pub decompose: bool,
    /// Output directory for stats.json, model.json and closure.json.
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Debug, Serialize)]
struct TermClosure {
    params: Vec<String>,
    max_abs_deviation: f64,
    max_pull: f64,
}

#[derive(Debug, Serialize)]
struct ClosureReport {
    seed: u64,
    bins: usize,
    events_per_bin: usize,
    mode: SolveMode,
    stats_digest: String,
    model_digest: String,
    terms: Vec<TermClosure>,
}

pub fn run(args: &DemoArgs) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args.config)?;
    let grid = SampleGrid::build(&config.names())?;
    let parameters = grid_parameters(&config, &grid)?;
    let steps: Vec<f64> = parameters.iter().map(Parameter::step).collect();
    let mode = if args.decompose {
        SolveMode::Decomposed
    } else {
        SolveMode::FiniteDifference
    };

    let truth = QuadraticTruth::random(&parameters, args.bins, args.seed);
    let events = truth.events(&SynthOpts {
        events_per_bin: args.events,
        noise: args.noise,
        seed: args.seed,
    });
    let opts = IngestOpts {
        workers: args.workers,
        decompose: args.decompose,
    };
    let boundaries: Vec<f64> = (0..=args.bins).map(|edge| edge as f64).collect();
    let edges = BinEdges::from_boundaries(&boundaries);
    let acc: BinAccumulator = ingest_events(&grid, &parameters, &truth, &events, args.bins, &opts)?
        .with_binning(edges.clone(), None)?;

    fs::create_dir_all(&args.out)?;
    write_stats(&args.out.join("stats.json"), &acc, &grid)?;

    let model = TermSolver::new(&grid, &steps)?.solve(&acc, &SolveOpts { mode })?;
    write_model(&args.out.join("model.json"), &model)?;

    let exact = truth.to_model(edges)?;
    let mut terms = Vec::with_capacity(exact.terms().len());
    for expected in exact.terms() {
        let Some(found) = model.term(expected.params()) else {
            tracing::warn!(term = %expected.params().join("*"), "term missing from solved model");
            continue;
        };
        let mut closure = TermClosure {
            params: expected.params().to_vec(),
            max_abs_deviation: 0.0,
            max_pull: 0.0,
        };
        let rows = found
            .values()
            .iter()
            .zip(found.uncertainties())
            .zip(expected.values());
        for ((value, uncertainty), truth_value) in rows {
            let deviation = (value - truth_value).abs();
            closure.max_abs_deviation = closure.max_abs_deviation.max(deviation);
            if *uncertainty > 0.0 {
                closure.max_pull = closure.max_pull.max(deviation / uncertainty);
            }
        }
        terms.push(closure);
    }

    let report = ClosureReport {
        seed: args.seed,
        bins: args.bins,
        events_per_bin: args.events,
        mode,
        stats_digest: accumulator_digest(&acc)?,
        model_digest: model_digest(&model)?,
        terms,
    };
    fs::write(args.out.join("closure.json"), to_canonical_json_bytes(&report)?)?;

    let worst = report
        .terms
        .iter()
        .map(|term| term.max_abs_deviation)
        .fold(0.0_f64, f64::max);
    tracing::info!(
        seed = args.seed,
        bins = args.bins,
        events = events.len(),
        terms = report.terms.len(),
        worst_deviation = worst,
        out = %args.out.display(),
        "closure test finished"
    );
    Ok(())
}
