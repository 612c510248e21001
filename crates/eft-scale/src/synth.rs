//! Seeded synthetic data with a known quadratic response.
//!
//! Randomness is drawn from `StdRng` streams whose seeds are derived from a
//! master seed with SipHash-1-3 (fixed zero keys), one substream per bin or
//! per sample point, so results do not depend on processing order.

use std::hash::Hasher;

use eft_core::errors::{EftError, ErrorInfo};
use eft_core::params::Parameter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;

use crate::accumulator::BinAccumulator;
use crate::grid::SampleGrid;
use crate::model::{BinEdges, EftTerm, ScalingModel};
use crate::reweight::{BinnedEvent, WeightOracle};

/// Seed of substream `substream` under `master_seed`.
pub fn derive_substream_seed(master_seed: u64, substream: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(substream);
    hasher.finish()
}

/// Options for synthetic sample generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthOpts {
    /// Events generated per bin (and per sample point for independent samples).
    pub events_per_bin: usize,
    /// Relative amplitude of the uniform per-event jitter.
    pub noise: f64,
    /// Master seed.
    pub seed: u64,
}

impl Default for SynthOpts {
    fn default() -> Self {
        Self {
            events_per_bin: 100,
            noise: 0.1,
            seed: 0,
        }
    }
}

/// Event payload produced by [`QuadraticTruth::events`].
///
/// The jitter factor is shared by every sample point, as it would be for
/// reweighted copies of one generated event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticEvent {
    /// Bin the event belongs to.
    pub bin: usize,
    /// Multiplicative weight factor around one.
    pub factor: f64,
}

/// Exact per-bin quadratic response used as ground truth.
///
/// Coefficients are relative to the SM expectation and multiply coupling
/// displacements from each parameter's baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadraticTruth {
    names: Vec<String>,
    baselines: Vec<f64>,
    sm: Vec<f64>,
    linear: Vec<Vec<f64>>,
    quadratic: Vec<Vec<f64>>,
    cross: Vec<Vec<f64>>,
}

impl QuadraticTruth {
    /// Builds a truth from explicit coefficient tables.
    ///
    /// `linear` and `quadratic` are indexed `[parameter][bin]`, `cross` is
    /// indexed `[pair][bin]` with pairs in grid order.
    pub fn new(
        parameters: &[Parameter],
        sm: Vec<f64>,
        linear: Vec<Vec<f64>>,
        quadratic: Vec<Vec<f64>>,
        cross: Vec<Vec<f64>>,
    ) -> Result<Self, EftError> {
        let n = parameters.len();
        let nbins = sm.len();
        let pairs = n * n.saturating_sub(1) / 2;
        for (field, table, rows) in [
            ("linear", &linear, n),
            ("quadratic", &quadratic, n),
            ("cross", &cross, pairs),
        ] {
            if table.len() != rows {
                return Err(EftError::shape("truth-shape", field, rows, table.len()));
            }
            if let Some(row) = table.iter().find(|row| row.len() != nbins) {
                return Err(EftError::shape("truth-shape", field, nbins, row.len()));
            }
        }
        Ok(Self {
            names: parameters.iter().map(|p| p.name.clone()).collect(),
            baselines: parameters.iter().map(|p| p.sm).collect(),
            sm,
            linear,
            quadratic,
            cross,
        })
    }

    /// Draws a random truth: SM contents in `[50, 150)`, linear terms in
    /// `[-0.5, 0.5)`, quadratic terms in `[0, 0.3)` and cross terms in `[-0.2, 0.2)`.
    pub fn random(parameters: &[Parameter], n_bins: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = parameters.len();
        let pairs = n * n.saturating_sub(1) / 2;
        let mut table = |rows: usize, lo: f64, hi: f64| -> Vec<Vec<f64>> {
            (0..rows)
                .map(|_| (0..n_bins).map(|_| rng.gen_range(lo..hi)).collect())
                .collect()
        };
        let sm = table(1, 50.0, 150.0).pop().unwrap_or_default();
        let linear = table(n, -0.5, 0.5);
        let quadratic = table(n, 0.0, 0.3);
        let cross = table(pairs, -0.2, 0.2);
        Self {
            names: parameters.iter().map(|p| p.name.clone()).collect(),
            baselines: parameters.iter().map(|p| p.sm).collect(),
            sm,
            linear,
            quadratic,
            cross,
        }
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.sm.len()
    }

    /// SM expectation per bin.
    pub fn sm(&self) -> &[f64] {
        &self.sm
    }

    /// Relative scaling `1 + sum(...)` of `bin` at absolute couplings in grid order.
    pub fn scaling(&self, bin: usize, couplings: &[f64]) -> f64 {
        let x: Vec<f64> = couplings
            .iter()
            .zip(&self.baselines)
            .map(|(value, base)| value - base)
            .collect();
        let mut total = 1.0;
        let mut pair = 0;
        for ip in 0..x.len() {
            total += self.linear[ip][bin] * x[ip] + self.quadratic[ip][bin] * x[ip] * x[ip];
            for iy in (ip + 1)..x.len() {
                total += self.cross[pair][bin] * x[ip] * x[iy];
                pair += 1;
            }
        }
        total
    }

    /// Expected content of `bin` at absolute couplings in grid order.
    pub fn expected(&self, bin: usize, couplings: &[f64]) -> f64 {
        self.sm[bin] * self.scaling(bin, couplings)
    }

    /// Exact model equivalent to this truth, without uncertainties.
    pub fn to_model(&self, edges: BinEdges) -> Result<ScalingModel, EftError> {
        let grid = SampleGrid::build(&self.names)?;
        let zeros = vec![0.0; self.n_bins()];
        let mut terms = Vec::with_capacity(grid.len() - 1);
        for (ip, name) in self.names.iter().enumerate() {
            terms.push(EftTerm::new(
                vec![name.clone()],
                self.linear[ip].clone(),
                zeros.clone(),
            )?);
            terms.push(EftTerm::new(
                vec![name.clone(), name.clone()],
                self.quadratic[ip].clone(),
                zeros.clone(),
            )?);
        }
        let pairs = grid
            .points()
            .iter()
            .filter(|p| p.params.len() == 2 && p.params[0] != p.params[1]);
        for (point, values) in pairs.zip(&self.cross) {
            terms.push(EftTerm::new(point.params.clone(), values.clone(), zeros.clone())?);
        }
        ScalingModel::new(self.n_bins(), edges, None, self.sm.clone(), terms)
    }

    /// Correlated event sample: `events_per_bin` events per bin, each with
    /// one jitter factor reused at every sample point.
    pub fn events(&self, opts: &SynthOpts) -> Vec<BinnedEvent<SyntheticEvent>> {
        let mut events = Vec::with_capacity(self.n_bins() * opts.events_per_bin);
        for bin in 0..self.n_bins() {
            let mut rng = StdRng::seed_from_u64(derive_substream_seed(opts.seed, bin as u64));
            for _ in 0..opts.events_per_bin {
                let factor = 1.0 + opts.noise * rng.gen_range(-1.0..=1.0);
                events.push(BinnedEvent {
                    bin: Some(bin),
                    event: SyntheticEvent { bin, factor },
                });
            }
        }
        events
    }

    /// Independent samples per sample point, as from separate generator runs.
    pub fn fill_independent(
        &self,
        grid: &SampleGrid,
        parameters: &[Parameter],
        opts: &SynthOpts,
    ) -> Result<BinAccumulator, EftError> {
        if grid.names() != self.names.as_slice() {
            return Err(EftError::InvalidConfiguration(
                ErrorInfo::new("truth-parameters", "grid parameters differ from the truth")
                    .with_context("field", "parameters")
                    .with_context("expected", self.names.join(","))
                    .with_context("actual", grid.names().join(",")),
            ));
        }
        let values = grid.point_values(parameters)?;
        let mut acc = BinAccumulator::for_grid(grid, self.n_bins());
        for (point, couplings) in grid.points().iter().zip(&values) {
            let mut rng =
                StdRng::seed_from_u64(derive_substream_seed(opts.seed, point.index as u64));
            for bin in 0..self.n_bins() {
                let expected = self.expected(bin, couplings);
                for _ in 0..opts.events_per_bin {
                    let factor = 1.0 + opts.noise * rng.gen_range(-1.0..=1.0);
                    acc.add_event(point.index, bin, expected * factor)?;
                }
            }
        }
        Ok(acc)
    }
}

impl WeightOracle<SyntheticEvent> for QuadraticTruth {
    fn weight(&self, event: &SyntheticEvent, couplings: &[f64]) -> f64 {
        self.expected(event.bin, couplings) * event.factor
    }
}
