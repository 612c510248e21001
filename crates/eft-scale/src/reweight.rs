//! Per-event weight evaluation, decomposition and parallel ingestion.

use eft_core::errors::{EftError, ErrorInfo};
use eft_core::params::Parameter;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::accumulator::BinAccumulator;
use crate::grid::{PointKind, SampleGrid};
use crate::model::Couplings;

fn pool_error(err: impl ToString) -> EftError {
    EftError::Io(ErrorInfo::new("thread-pool", err.to_string()).with_context("field", "workers"))
}

/// External matrix-element routine evaluated once per sample point per event.
///
/// `couplings` holds one value per grid parameter, in grid order.
pub trait WeightOracle<E>: Sync {
    /// Event weight at the given parameter point.
    fn weight(&self, event: &E, couplings: &[f64]) -> f64;
}

impl<E, F> WeightOracle<E> for F
where
    F: Fn(&E, &[f64]) -> f64 + Sync,
{
    fn weight(&self, event: &E, couplings: &[f64]) -> f64 {
        self(event, couplings)
    }
}

/// An event together with the histogram bin it falls into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinnedEvent<E> {
    /// Target bin; `None` for events outside the histogram.
    pub bin: Option<usize>,
    /// Payload handed to the oracle.
    pub event: E,
}

/// Options for [`ingest_events`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOpts {
    /// Worker threads; zero uses the global rayon pool.
    #[serde(default)]
    pub workers: usize,
    /// Store per-event coefficients from [`decompose_event`] instead of raw weights.
    #[serde(default)]
    pub decompose: bool,
}

/// Converts one event's raw per-point weights into per-event coefficients.
///
/// Slot 0 keeps the reference weight. Half and full slots receive the linear
/// and quadratic coefficients of their parameter, cross slots the cross
/// coefficient, all normalized by the steps.
pub fn decompose_event(grid: &SampleGrid, steps: &[f64], raw: &[f64]) -> Result<Vec<f64>, EftError> {
    if raw.len() != grid.len() {
        return Err(EftError::shape("event-weights", "weights", grid.len(), raw.len()));
    }
    if steps.len() != grid.n_params() {
        return Err(EftError::shape("event-steps", "steps", grid.n_params(), steps.len()));
    }
    let reference = raw[0];
    let delta = |index: usize| raw[index] - reference;
    let mut out = vec![0.0; raw.len()];
    for point in grid.points() {
        out[point.index] = match point.kind {
            PointKind::Reference => reference,
            PointKind::Half(ip) => {
                let (half, full) = (delta(grid.half_index(ip)), delta(grid.full_index(ip)));
                (4.0 * half - full) / steps[ip]
            }
            PointKind::Full(ip) => {
                let (half, full) = (delta(grid.half_index(ip)), delta(grid.full_index(ip)));
                (full - (4.0 * half - full)) / (steps[ip] * steps[ip])
            }
            PointKind::Cross(ix, iy) => {
                let along = delta(grid.full_index(ix)) + delta(grid.full_index(iy));
                (delta(point.index) - along) / (steps[ix] * steps[iy])
            }
        };
    }
    Ok(out)
}

/// Event weight at `couplings` from decomposed per-event coefficients.
///
/// Couplings are displacements from the baseline; missing names count as zero.
pub fn reweight_event(
    grid: &SampleGrid,
    coefficients: &[f64],
    couplings: &Couplings,
) -> Result<f64, EftError> {
    if coefficients.len() != grid.len() {
        return Err(EftError::shape(
            "event-weights",
            "coefficients",
            grid.len(),
            coefficients.len(),
        ));
    }
    let value = |ip: usize| couplings.get(&grid.names()[ip]).copied();
    let mut weight = coefficients[0];
    for point in grid.points() {
        weight += match point.kind {
            PointKind::Reference => 0.0,
            PointKind::Half(ip) => value(ip).map_or(0.0, |x| coefficients[point.index] * x),
            PointKind::Full(ip) => value(ip).map_or(0.0, |x| coefficients[point.index] * x * x),
            PointKind::Cross(ix, iy) => match (value(ix), value(iy)) {
                (Some(x), Some(y)) => coefficients[point.index] * x * y,
                _ => 0.0,
            },
        };
    }
    Ok(weight)
}

/// Evaluates `oracle` at every sample point for every event and accumulates
/// the weights into a fresh [`BinAccumulator`].
///
/// Workers fill private accumulators that are merged at the end, so the
/// result does not depend on scheduling beyond floating-point rounding.
pub fn ingest_events<E, O>(
    grid: &SampleGrid,
    parameters: &[Parameter],
    oracle: &O,
    events: &[BinnedEvent<E>],
    n_bins: usize,
    opts: &IngestOpts,
) -> Result<BinAccumulator, EftError>
where
    E: Sync,
    O: WeightOracle<E> + ?Sized,
{
    let points = grid.point_values(parameters)?;
    let steps: Vec<f64> = parameters.iter().map(Parameter::step).collect();
    let n_points = grid.len();

    let fill = || {
        events
            .par_iter()
            .filter_map(|ev| ev.bin.map(|bin| (bin, &ev.event)))
            .try_fold(
                || BinAccumulator::new(n_points, n_bins),
                |mut acc, (bin, event)| -> Result<BinAccumulator, EftError> {
                    let raw: Vec<f64> = points.iter().map(|p| oracle.weight(event, p)).collect();
                    let weights = if opts.decompose {
                        decompose_event(grid, &steps, &raw)?
                    } else {
                        raw
                    };
                    acc.add_event_weights(bin, &weights)?;
                    Ok(acc)
                },
            )
            .try_reduce(
                || BinAccumulator::new(n_points, n_bins),
                |left, right| left.merged(&right),
            )
    };

    let acc = if opts.workers == 0 {
        fill()?
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(opts.workers)
            .build()
            .map_err(pool_error)?;
        pool.install(fill)?
    };

    let skipped = events.iter().filter(|ev| ev.bin.is_none()).count();
    log::info!(
        "ingested {} events into {n_bins} bins ({skipped} outside the histogram)",
        events.len() - skipped
    );
    Ok(acc)
}
