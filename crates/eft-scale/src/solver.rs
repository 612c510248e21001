//! Reduction of accumulated statistics into polynomial coefficients.
//!
//! Along each parameter axis the response `f(x) = A x + B x^2` is sampled at
//! `x = step/2` and `x = step`, which fixes `A = 4 d_half - d_full` and
//! `B = d_full - A` in step units. The cross coefficient is whatever the pair
//! point shows beyond the two single-parameter responses. Coefficients are
//! divided by the reference mean and by the steps, so they multiply raw
//! coupling displacements relative to the SM prediction.

use std::str::FromStr;

use eft_core::errors::{EftError, ErrorInfo};
use serde::{Deserialize, Serialize};

use crate::accumulator::{BinAccumulator, BinStatistics};
use crate::grid::{PointKind, SampleGrid};
use crate::model::{EftTerm, ScalingModel};

/// Interpretation of the accumulated weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolveMode {
    /// Cells hold raw weights at each sample point.
    #[default]
    FiniteDifference,
    /// Cells hold per-event coefficients from [`crate::reweight::decompose_event`].
    Decomposed,
}

impl FromStr for SolveMode {
    type Err = EftError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "finite-difference" => Ok(SolveMode::FiniteDifference),
            "decomposed" => Ok(SolveMode::Decomposed),
            other => Err(EftError::InvalidConfiguration(
                ErrorInfo::new("solve-mode", format!("unknown solve mode {other}"))
                    .with_context("field", "mode")
                    .with_hint("expected finite-difference or decomposed"),
            )),
        }
    }
}

/// Solver options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolveOpts {
    /// How cell contents are interpreted.
    #[serde(default)]
    pub mode: SolveMode,
}

/// Solves a grid with fixed finite-differencing steps.
#[derive(Debug, Clone)]
pub struct TermSolver<'a> {
    grid: &'a SampleGrid,
    steps: Vec<f64>,
}

/// Accumulates a linear combination of independent means.
#[derive(Debug, Default, Clone, Copy)]
struct Combination {
    value: f64,
    variance: f64,
}

impl Combination {
    fn add(mut self, coefficient: f64, mean: f64, std_err: f64) -> Self {
        self.value += coefficient * mean;
        self.variance += (coefficient * std_err).powi(2);
        self
    }

    /// Adds the error contributions of `(coefficient, std_err)` pairs only.
    fn with_errors(self, terms: &[(f64, f64)]) -> Self {
        terms
            .iter()
            .fold(self, |combo, (coefficient, std_err)| combo.add(*coefficient, 0.0, *std_err))
    }
}

/// Solves `acc` in finite-difference mode.
pub fn solve(
    acc: &BinAccumulator,
    grid: &SampleGrid,
    steps: &[f64],
) -> Result<ScalingModel, EftError> {
    TermSolver::new(grid, steps)?.solve(acc, &SolveOpts::default())
}

impl<'a> TermSolver<'a> {
    /// Checks that one finite, non-zero step is given per parameter.
    pub fn new(grid: &'a SampleGrid, steps: &[f64]) -> Result<Self, EftError> {
        if steps.len() != grid.n_params() {
            return Err(EftError::shape(
                "solver-steps",
                "parameterStepValues",
                grid.n_params(),
                steps.len(),
            ));
        }
        for (name, step) in grid.names().iter().zip(steps) {
            if !step.is_finite() || *step == 0.0 {
                return Err(EftError::InvalidConfiguration(
                    ErrorInfo::new("zero-step", "step values must be finite and non-zero")
                        .with_context("field", "parameterStepValues")
                        .with_context("parameter", name),
                ));
            }
        }
        Ok(Self {
            grid,
            steps: steps.to_vec(),
        })
    }

    /// Step values in grid order.
    pub fn steps(&self) -> &[f64] {
        &self.steps
    }

    /// Reduces `acc` into a [`ScalingModel`].
    pub fn solve(&self, acc: &BinAccumulator, opts: &SolveOpts) -> Result<ScalingModel, EftError> {
        if acc.n_points() != self.grid.len() {
            return Err(EftError::shape(
                "solver-shape",
                "samplePoints",
                self.grid.len(),
                acc.n_points(),
            ));
        }
        let nbins = acc.n_bins();
        let stats = acc.bin_statistics();
        let mut values = vec![vec![0.0; nbins]; self.grid.len()];
        let mut errors = vec![vec![0.0; nbins]; self.grid.len()];
        let mut degenerate = 0usize;

        for bin in 0..nbins {
            let reference = stats.mean[0][bin];
            if reference == 0.0 {
                degenerate += 1;
                continue;
            }
            for point in self.grid.points().iter().skip(1) {
                let combo = match opts.mode {
                    SolveMode::FiniteDifference => self.finite_difference(&stats, point.kind, bin),
                    SolveMode::Decomposed => Combination::default().add(
                        1.0,
                        stats.mean[point.index][bin],
                        stats.std_err[point.index][bin],
                    ),
                };
                let norm = match opts.mode {
                    SolveMode::FiniteDifference => reference * self.step_product(point.kind),
                    SolveMode::Decomposed => reference,
                };
                values[point.index][bin] = combo.value / norm;
                errors[point.index][bin] = combo.variance.sqrt() / norm.abs();
            }
        }
        if degenerate > 0 {
            log::debug!("{degenerate} of {nbins} bins have an empty reference and scale by zero");
        }

        let terms = self
            .grid
            .points()
            .iter()
            .skip(1)
            .map(|point| {
                EftTerm::new(
                    point.params.clone(),
                    std::mem::take(&mut values[point.index]),
                    std::mem::take(&mut errors[point.index]),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        ScalingModel::new(
            nbins,
            acc.edges().clone(),
            acc.labels().map(<[String]>::to_vec),
            stats.mean[0].clone(),
            terms,
        )
    }

    fn step_product(&self, kind: PointKind) -> f64 {
        match kind {
            PointKind::Reference => 1.0,
            PointKind::Half(ip) => self.steps[ip],
            PointKind::Full(ip) => self.steps[ip] * self.steps[ip],
            PointKind::Cross(ix, iy) => self.steps[ix] * self.steps[iy],
        }
    }

    /// Step-unit coefficient of `kind` as a combination of independent point means.
    fn finite_difference(&self, stats: &BinStatistics, kind: PointKind, bin: usize) -> Combination {
        let mean = |index: usize| stats.mean[index][bin];
        let err = |index: usize| stats.std_err[index][bin];
        let reference = mean(0);
        let delta = |index: usize| mean(index) - reference;
        match kind {
            PointKind::Reference => Combination::default(),
            PointKind::Half(ip) => {
                let (half, full) = (self.grid.half_index(ip), self.grid.full_index(ip));
                // A = 4 d_half - d_full = 4 m_half - m_full - 3 m_ref
                Combination {
                    value: 4.0 * delta(half) - delta(full),
                    variance: 0.0,
                }
                .with_errors(&[(4.0, err(half)), (-1.0, err(full)), (-3.0, err(0))])
            }
            PointKind::Full(ip) => {
                let (half, full) = (self.grid.half_index(ip), self.grid.full_index(ip));
                // B = d_full - A = 2 m_full - 4 m_half + 2 m_ref
                let linear = 4.0 * delta(half) - delta(full);
                Combination {
                    value: delta(full) - linear,
                    variance: 0.0,
                }
                .with_errors(&[(2.0, err(full)), (-4.0, err(half)), (2.0, err(0))])
            }
            PointKind::Cross(ix, iy) => {
                let cross = self.grid.cross_index(ix, iy);
                let (fx, fy) = (self.grid.full_index(ix), self.grid.full_index(iy));
                let (hx, hy) = (self.grid.half_index(ix), self.grid.half_index(iy));
                let single = |half: usize, full: usize| {
                    let a = 4.0 * delta(half) - delta(full);
                    let b = delta(full) - a;
                    a + b
                };
                // A_p + B_p = d_full(p), so C = m_pq - m_p - m_q + m_ref
                Combination {
                    value: delta(cross) - (single(hx, fx) + single(hy, fy)),
                    variance: 0.0,
                }
                .with_errors(&[
                    (1.0, err(cross)),
                    (-1.0, err(fx)),
                    (-1.0, err(fy)),
                    (1.0, err(0)),
                ])
            }
        }
    }
}
