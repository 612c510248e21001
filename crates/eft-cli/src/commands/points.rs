use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use eft_scale::{PointRole, SampleGrid};
use serde::Serialize;

use super::{emit, load_config};

#[derive(Args, Debug)]
pub struct PointsArgs {
    /// Parameter-configuration document.
    #[arg(long)]
    pub config: PathBuf,
    /// Output file; printed to stdout when omitted.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct PointEntry<'a> {
    index: usize,
    role: PointRole,
    params: &'a [String],
    values: Vec<f64>,
}

#[derive(Debug, Serialize)]
struct PointsReport<'a> {
    parameters: &'a [String],
    points: Vec<PointEntry<'a>>,
}

pub fn run(args: &PointsArgs) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args.config)?;
    let grid = SampleGrid::build(&config.names())?;
    let values = grid.point_values(config.parameters())?;
    let report = PointsReport {
        parameters: grid.names(),
        points: grid
            .points()
            .iter()
            .zip(values)
            .map(|(point, values)| PointEntry {
                index: point.index,
                role: point.role(),
                params: &point.params,
                values,
            })
            .collect(),
    };
    tracing::info!(parameters = grid.n_params(), points = grid.len(), "built reweighting grid");
    emit(args.out.as_deref(), &serde_json::to_string_pretty(&report)?)
}
