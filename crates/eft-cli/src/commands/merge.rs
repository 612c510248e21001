use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use eft_core::{EftError, ErrorInfo};
use eft_scale::{read_stats, write_stats, BinAccumulator, SampleGrid};

use super::parse_selector;

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Accumulated-statistics documents to combine.
    #[arg(long, num_args = 1.., required = true)]
    pub inputs: Vec<PathBuf>,
    /// Terms to zero in every input before merging, e.g. `cG` or `cG,c2G`.
    #[arg(long = "zero")]
    pub zero: Vec<String>,
    /// Also zero points that contain a single-name selector.
    #[arg(long)]
    pub zero_subset: bool,
    /// Output statistics document.
    #[arg(long)]
    pub out: PathBuf,
}

pub fn run(args: &MergeArgs) -> Result<(), Box<dyn Error>> {
    let selectors = args
        .zero
        .iter()
        .map(|raw| parse_selector(raw))
        .collect::<Result<Vec<_>, _>>()?;
    let mut merged: Option<(SampleGrid, BinAccumulator)> = None;
    for path in &args.inputs {
        let (grid, mut acc) = read_stats(path)?;
        if !selectors.is_empty() {
            acc.zero_terms(&grid, &selectors, args.zero_subset)?;
        }
        merged = Some(match merged {
            None => (grid, acc),
            Some((base_grid, base)) => {
                if base_grid != grid {
                    return Err(EftError::InvalidConfiguration(
                        ErrorInfo::new("merge-grid", "inputs were filled on different grids")
                            .with_context("field", "terms")
                            .with_context("path", path.display()),
                    )
                    .into());
                }
                (base_grid, base.merged(&acc)?)
            }
        });
        tracing::info!(input = %path.display(), "merged statistics");
    }
    let Some((grid, acc)) = merged else {
        return Err("no inputs given".into());
    };
    write_stats(&args.out, &acc, &grid)?;
    tracing::info!(
        inputs = args.inputs.len(),
        bins = acc.n_bins(),
        out = %args.out.display(),
        "wrote merged statistics"
    );
    Ok(())
}
