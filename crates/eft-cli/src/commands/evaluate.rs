use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use eft_scale::{read_model, Couplings, EvalOpts, ScaledBins};
use serde::Serialize;

use super::{emit, parse_assignment};

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Scaling-model document.
    #[arg(long)]
    pub model: PathBuf,
    /// Coupling value as `name=value`; may be repeated.
    #[arg(long = "set", value_parser = parse_assignment)]
    pub set: Vec<(String, f64)>,
    /// Exclude linear terms.
    #[arg(long)]
    pub no_linear: bool,
    /// Exclude pure quadratic terms.
    #[arg(long)]
    pub no_square: bool,
    /// Exclude cross terms.
    #[arg(long)]
    pub no_cross: bool,
    /// Output file; printed to stdout when omitted.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Evaluation<'a> {
    couplings: &'a Couplings,
    opts: EvalOpts,
    nominal: &'a [f64],
    #[serde(flatten)]
    scaled: ScaledBins,
}

pub fn run(args: &EvaluateArgs) -> Result<(), Box<dyn Error>> {
    let model = read_model(&args.model)?;
    let couplings: Couplings = args.set.iter().cloned().collect();
    let known = model.parameter_names();
    let unknown: Vec<&String> = couplings
        .keys()
        .filter(|name| !known.contains(*name))
        .collect();
    if !unknown.is_empty() {
        tracing::warn!(?unknown, "couplings not used by the model");
    }
    let opts = EvalOpts {
        linear: !args.no_linear,
        quadratic: !args.no_square,
        cross: !args.no_cross,
    };
    let scaled = model.evaluate(model.nominal(), &couplings, &opts)?;
    let report = Evaluation {
        couplings: &couplings,
        opts,
        nominal: model.nominal(),
        scaled,
    };
    emit(args.out.as_deref(), &serde_json::to_string_pretty(&report)?)
}
