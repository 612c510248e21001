//! Canonical reweighting grid for a quadratic model.
//!
//! For `N` parameters the grid holds `1 + 2N + N(N-1)/2` points: the
//! reference point, a half-step and a full-step point per parameter
//! (interleaved), then one point per unordered pair in input order. The
//! positional indices are part of the interchange format.

use std::collections::BTreeSet;

use eft_core::errors::{EftError, ErrorInfo};
use eft_core::params::{Parameter, SampleOffset};
use serde::{Deserialize, Serialize};

/// Tag accepted in stored term lists for the reference point.
pub const LEGACY_REFERENCE_TAG: &str = "1";

/// Coarse role of a sample point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointRole {
    /// All parameters at their baseline.
    Reference,
    /// One parameter perturbed.
    Single,
    /// Two distinct parameters perturbed together.
    Pair,
}

/// Position of a sample point in parameter space, by parameter index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    /// Reference point.
    Reference,
    /// Parameter at half its step.
    Half(usize),
    /// Parameter at its full step.
    Full(usize),
    /// Two parameters at their full steps (`first < second`).
    Cross(usize, usize),
}

/// One entry of the reweighting grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplePoint {
    /// Position inside result arrays.
    pub index: usize,
    /// Location in parameter space.
    pub kind: PointKind,
    /// Parameter-name tuple: empty, `[p]`, `[p, p]` or `[p, q]`.
    pub params: Vec<String>,
}

impl SamplePoint {
    /// Coarse role of the point.
    pub fn role(&self) -> PointRole {
        match self.kind {
            PointKind::Reference => PointRole::Reference,
            PointKind::Half(_) | PointKind::Full(_) => PointRole::Single,
            PointKind::Cross(..) => PointRole::Pair,
        }
    }

    /// Human readable label, `1` for the reference point.
    pub fn label(&self) -> String {
        if self.params.is_empty() {
            LEGACY_REFERENCE_TAG.to_string()
        } else {
            self.params.join(" * ")
        }
    }

    /// Whether the unordered parameter set equals `names`.
    pub fn matches(&self, names: &[String]) -> bool {
        let mut own: Vec<&str> = self.params.iter().map(String::as_str).collect();
        let mut other: Vec<&str> = names.iter().map(String::as_str).collect();
        own.sort_unstable();
        other.sort_unstable();
        own == other
    }
}

/// Ordered grid of sample points for a fixed parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleGrid {
    names: Vec<String>,
    points: Vec<SamplePoint>,
}

/// Builds the canonical point list for `names`.
pub fn build_points<S: AsRef<str>>(names: &[S]) -> Result<Vec<SamplePoint>, EftError> {
    Ok(SampleGrid::build(names)?.points)
}

impl SampleGrid {
    /// Builds the grid for an ordered list of unique parameter names.
    pub fn build<S: AsRef<str>>(names: &[S]) -> Result<Self, EftError> {
        let names: Vec<String> = names.iter().map(|n| n.as_ref().to_string()).collect();
        let mut seen = BTreeSet::new();
        for name in &names {
            if name.is_empty() || name == LEGACY_REFERENCE_TAG {
                return Err(EftError::InvalidConfiguration(
                    ErrorInfo::new("reserved-parameter-name", "parameter name is empty or reserved")
                        .with_context("field", "parameters")
                        .with_context("parameter", name),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(EftError::InvalidConfiguration(
                    ErrorInfo::new("duplicate-parameter", "parameter names must be unique")
                        .with_context("field", "parameters")
                        .with_context("parameter", name),
                ));
            }
        }

        let n = names.len();
        let mut points = Vec::with_capacity(Self::point_count(n));
        points.push(SamplePoint {
            index: 0,
            kind: PointKind::Reference,
            params: Vec::new(),
        });
        for (ip, name) in names.iter().enumerate() {
            points.push(SamplePoint {
                index: points.len(),
                kind: PointKind::Half(ip),
                params: vec![name.clone()],
            });
            points.push(SamplePoint {
                index: points.len(),
                kind: PointKind::Full(ip),
                params: vec![name.clone(), name.clone()],
            });
        }
        for ix in 0..n {
            for iy in (ix + 1)..n {
                points.push(SamplePoint {
                    index: points.len(),
                    kind: PointKind::Cross(ix, iy),
                    params: vec![names[ix].clone(), names[iy].clone()],
                });
            }
        }
        Ok(Self { names, points })
    }

    /// Reconstructs a grid from a stored list of parameter tuples.
    ///
    /// The list must be exactly the canonical ordering for the parameters it
    /// implies. `[]` and `["1"]` both denote the reference point.
    pub fn from_terms(terms: &[Vec<String>]) -> Result<Self, EftError> {
        let n = Self::parameter_count_for_points(terms.len()).ok_or_else(|| {
            EftError::InvalidConfiguration(
                ErrorInfo::new(
                    "term-count",
                    format!("{} terms is not a valid grid size", terms.len()),
                )
                .with_context("field", "terms")
                .with_context("actual", terms.len()),
            )
        })?;
        let names = (0..n)
            .map(|ip| {
                terms[1 + 2 * ip].first().cloned().ok_or_else(|| {
                    EftError::invalid(
                        "term-layout",
                        "terms",
                        format!("term {} should name a single parameter", 1 + 2 * ip),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let grid = Self::build(&names)?;
        for (point, stored) in grid.points.iter().zip(terms) {
            let stored_is_reference = stored.is_empty()
                || (stored.len() == 1 && stored[0] == LEGACY_REFERENCE_TAG);
            let consistent = match point.kind {
                PointKind::Reference => stored_is_reference,
                _ => &point.params == stored,
            };
            if !consistent {
                return Err(EftError::InvalidConfiguration(
                    ErrorInfo::new("term-layout", "terms are not in canonical grid order")
                        .with_context("field", "terms")
                        .with_context("index", point.index)
                        .with_context("expected", point.label())
                        .with_context("actual", stored.join(" * ")),
                ));
            }
        }
        Ok(grid)
    }

    /// Number of points for `n` parameters.
    pub fn point_count(n: usize) -> usize {
        1 + 2 * n + n * n.saturating_sub(1) / 2
    }

    /// Inverts [`SampleGrid::point_count`]; `None` when no `n` fits.
    pub fn parameter_count_for_points(points: usize) -> Option<usize> {
        let mut n = 0usize;
        loop {
            let count = Self::point_count(n);
            if count == points {
                return Some(n);
            }
            if count > points {
                return None;
            }
            n += 1;
        }
    }

    /// Parameter names in grid order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of parameters.
    pub fn n_params(&self) -> usize {
        self.names.len()
    }

    /// All points in positional order.
    pub fn points(&self) -> &[SamplePoint] {
        &self.points
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false: the reference point is always present.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Position of parameter `name` in grid order.
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Index of the half-step point of parameter `ip`.
    pub fn half_index(&self, ip: usize) -> usize {
        1 + 2 * ip
    }

    /// Index of the full-step point of parameter `ip`.
    pub fn full_index(&self, ip: usize) -> usize {
        2 + 2 * ip
    }

    /// Index of the cross point of parameters `ix < iy`.
    pub fn cross_index(&self, ix: usize, iy: usize) -> usize {
        let n = self.n_params();
        let (ix, iy) = if ix < iy { (ix, iy) } else { (iy, ix) };
        1 + 2 * n + ix * n - ix * (ix + 1) / 2 + (iy - ix - 1)
    }

    /// Reporting order: reference, all half-steps, all full-steps, crosses.
    pub fn ordered_entries(&self) -> Vec<usize> {
        let n = self.n_params();
        let mut order = Vec::with_capacity(self.len());
        order.push(0);
        order.extend((0..n).map(|ip| self.half_index(ip)));
        order.extend((0..n).map(|ip| self.full_index(ip)));
        order.extend((1 + 2 * n)..self.len());
        order
    }

    /// Parameter tuples per point; the reference point is an empty tuple.
    pub fn terms(&self) -> Vec<Vec<String>> {
        self.points.iter().map(|p| p.params.clone()).collect()
    }

    /// Coupling vectors (one value per parameter) for every point.
    pub fn point_values(&self, parameters: &[Parameter]) -> Result<Vec<Vec<f64>>, EftError> {
        self.check_parameters(parameters)?;
        let baseline: Vec<f64> = parameters
            .iter()
            .map(|p| p.sample_value(SampleOffset::Baseline))
            .collect();
        Ok(self
            .points
            .iter()
            .map(|point| {
                let mut values = baseline.clone();
                match point.kind {
                    PointKind::Reference => {}
                    PointKind::Half(ip) => {
                        values[ip] = parameters[ip].sample_value(SampleOffset::Half);
                    }
                    PointKind::Full(ip) => {
                        values[ip] = parameters[ip].sample_value(SampleOffset::Full);
                    }
                    PointKind::Cross(ix, iy) => {
                        values[ix] = parameters[ix].sample_value(SampleOffset::Full);
                        values[iy] = parameters[iy].sample_value(SampleOffset::Full);
                    }
                }
                values
            })
            .collect())
    }

    /// Ensures `parameters` lists exactly the grid names in grid order.
    pub fn check_parameters(&self, parameters: &[Parameter]) -> Result<(), EftError> {
        if parameters.len() != self.n_params() {
            return Err(EftError::shape(
                "parameter-count",
                "parameters",
                self.n_params(),
                parameters.len(),
            ));
        }
        for (expected, param) in self.names.iter().zip(parameters) {
            if *expected != param.name {
                return Err(EftError::InvalidConfiguration(
                    ErrorInfo::new("parameter-order", "parameters differ from the grid order")
                        .with_context("field", "parameters")
                        .with_context("expected", expected)
                        .with_context("actual", &param.name),
                ));
            }
        }
        Ok(())
    }
}
