//! Per-bin running sums for every sample point.

use eft_core::errors::{EftError, ErrorInfo};
use serde::{Deserialize, Serialize};

use crate::grid::{SampleGrid, LEGACY_REFERENCE_TAG};
use crate::model::BinEdges;

fn index_error(field: &str, limit: usize, index: usize) -> EftError {
    EftError::ShapeMismatch(
        ErrorInfo::new(
            "index-out-of-range",
            format!("{field} {index} is out of range for {limit} entries"),
        )
        .with_context("field", field)
        .with_context("expected", format!("< {limit}"))
        .with_context("actual", index),
    )
}

fn binning_error(field: &str) -> EftError {
    EftError::ShapeMismatch(
        ErrorInfo::new("merge-binning", format!("{field} differ between the merged accumulators"))
            .with_context("field", field),
    )
}

/// Raw sums of a single (sample point, bin) cell.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CellStats {
    /// Sum of weights.
    pub sum_w: f64,
    /// Sum of squared weights.
    pub sum_w2: f64,
    /// Number of contributing events.
    pub entries: u64,
}

impl CellStats {
    /// Mean weight, zero when the cell is empty.
    pub fn mean(&self) -> f64 {
        if self.entries == 0 {
            0.0
        } else {
            self.sum_w / self.entries as f64
        }
    }

    /// Standard error of the mean, zero for empty cells or non-positive variance.
    pub fn std_err(&self) -> f64 {
        if self.entries == 0 {
            return 0.0;
        }
        let n = self.entries as f64;
        let mean = self.sum_w / n;
        let variance = self.sum_w2 / n - mean * mean;
        if variance > 0.0 {
            (variance / n).sqrt()
        } else {
            0.0
        }
    }
}

/// Mean weights and standard errors indexed `[point][bin]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinStatistics {
    /// Mean weight per cell.
    pub mean: Vec<Vec<f64>>,
    /// Standard error per cell.
    pub std_err: Vec<Vec<f64>>,
}

/// Accumulated `sumW`, `sumW2` and `numEntries` over a point x bin matrix.
///
/// The accumulator exclusively owns its arrays. Concurrent filling is done by
/// giving each worker its own accumulator and merging them afterwards, which
/// keeps writers to the same cell serialised.
#[derive(Debug, Clone, PartialEq)]
pub struct BinAccumulator {
    n_points: usize,
    n_bins: usize,
    sum_w: Vec<f64>,
    sum_w2: Vec<f64>,
    num_entries: Vec<u64>,
    edges: BinEdges,
    labels: Option<Vec<String>>,
}

impl BinAccumulator {
    /// Creates an all-zero accumulator.
    pub fn new(n_points: usize, n_bins: usize) -> Self {
        let cells = n_points * n_bins;
        Self {
            n_points,
            n_bins,
            sum_w: vec![0.0; cells],
            sum_w2: vec![0.0; cells],
            num_entries: vec![0; cells],
            edges: BinEdges::default(),
            labels: None,
        }
    }

    /// Creates an accumulator sized for `grid`.
    pub fn for_grid(grid: &SampleGrid, n_bins: usize) -> Self {
        Self::new(grid.len(), n_bins)
    }

    /// Restores an accumulator from nested `[point][bin]` arrays.
    pub fn from_parts(
        sum_w: Vec<Vec<f64>>,
        sum_w2: Vec<Vec<f64>>,
        num_entries: Vec<Vec<u64>>,
    ) -> Result<Self, EftError> {
        let n_points = sum_w.len();
        let n_bins = sum_w.first().map(Vec::len).unwrap_or(0);
        check_matrix("sumW", &sum_w, n_points, n_bins)?;
        check_matrix("sumW2", &sum_w2, n_points, n_bins)?;
        check_matrix("numEntries", &num_entries, n_points, n_bins)?;
        Ok(Self {
            n_points,
            n_bins,
            sum_w: sum_w.into_iter().flatten().collect(),
            sum_w2: sum_w2.into_iter().flatten().collect(),
            num_entries: num_entries.into_iter().flatten().collect(),
            edges: BinEdges::default(),
            labels: None,
        })
    }

    /// Attaches bin edges and labels; empty edges mean "unknown".
    pub fn with_binning(
        mut self,
        edges: BinEdges,
        labels: Option<Vec<String>>,
    ) -> Result<Self, EftError> {
        if !edges.is_empty() && edges.len() != self.n_bins {
            return Err(EftError::shape(
                "binning-shape",
                "bin_edges",
                self.n_bins,
                edges.len(),
            ));
        }
        if let Some(labels) = &labels {
            if labels.len() != self.n_bins {
                return Err(EftError::shape(
                    "binning-shape",
                    "bin_labels",
                    self.n_bins,
                    labels.len(),
                ));
            }
        }
        self.edges = edges;
        self.labels = labels;
        Ok(self)
    }

    /// Number of sample points.
    pub fn n_points(&self) -> usize {
        self.n_points
    }

    /// Number of histogram bins.
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// Bin edges, empty when unknown.
    pub fn edges(&self) -> &BinEdges {
        &self.edges
    }

    /// Optional bin labels.
    pub fn labels(&self) -> Option<&[String]> {
        self.labels.as_deref()
    }

    fn offset(&self, point: usize, bin: usize) -> Result<usize, EftError> {
        if point >= self.n_points {
            return Err(index_error("samplePointIndex", self.n_points, point));
        }
        if bin >= self.n_bins {
            return Err(index_error("binIndex", self.n_bins, bin));
        }
        Ok(point * self.n_bins + bin)
    }

    /// Adds one weighted event to a single cell.
    pub fn add_event(&mut self, point: usize, bin: usize, weight: f64) -> Result<(), EftError> {
        let idx = self.offset(point, bin)?;
        self.sum_w[idx] += weight;
        self.sum_w2[idx] += weight * weight;
        self.num_entries[idx] += 1;
        Ok(())
    }

    /// Adds one event carrying a weight for every sample point to `bin`.
    pub fn add_event_weights(&mut self, bin: usize, weights: &[f64]) -> Result<(), EftError> {
        if weights.len() != self.n_points {
            return Err(EftError::shape(
                "event-weights",
                "weights",
                self.n_points,
                weights.len(),
            ));
        }
        for (point, weight) in weights.iter().enumerate() {
            self.add_event(point, bin, *weight)?;
        }
        Ok(())
    }

    /// Adds `other` element-wise; dimensions must agree.
    ///
    /// Bin edges and labels known on both sides must be equal. Metadata missing
    /// on this side is taken from `other`.
    pub fn merge(&mut self, other: &BinAccumulator) -> Result<(), EftError> {
        if other.n_points != self.n_points {
            return Err(EftError::shape(
                "merge-shape",
                "samplePoints",
                self.n_points,
                other.n_points,
            ));
        }
        if other.n_bins != self.n_bins {
            return Err(EftError::shape(
                "merge-shape",
                "bins",
                self.n_bins,
                other.n_bins,
            ));
        }
        if !self.edges.is_empty() && !other.edges.is_empty() && self.edges != other.edges {
            return Err(binning_error("bin_edges"));
        }
        if let (Some(own), Some(theirs)) = (&self.labels, &other.labels) {
            if own != theirs {
                return Err(binning_error("bin_labels"));
            }
        }
        for (dst, src) in self.sum_w.iter_mut().zip(&other.sum_w) {
            *dst += src;
        }
        for (dst, src) in self.sum_w2.iter_mut().zip(&other.sum_w2) {
            *dst += src;
        }
        for (dst, src) in self.num_entries.iter_mut().zip(&other.num_entries) {
            *dst += src;
        }
        if self.edges.is_empty() && !other.edges.is_empty() {
            self.edges = other.edges.clone();
        }
        if self.labels.is_none() {
            self.labels = other.labels.clone();
        }
        Ok(())
    }

    /// Consuming form of [`BinAccumulator::merge`] for reductions.
    pub fn merged(mut self, other: &BinAccumulator) -> Result<Self, EftError> {
        self.merge(other)?;
        Ok(self)
    }

    /// Zeroes `sumW` and `sumW2` (not `numEntries`) of matching points.
    ///
    /// A point matches a selector when their unordered name sets are equal,
    /// or, with `allow_subset_match`, when the selector is shorter than the
    /// point and its first name appears in the point. The legacy `["1"]`
    /// selector names the reference point.
    pub fn zero_terms(
        &mut self,
        grid: &SampleGrid,
        selectors: &[Vec<String>],
        allow_subset_match: bool,
    ) -> Result<(), EftError> {
        if grid.len() != self.n_points {
            return Err(EftError::shape(
                "grid-shape",
                "samplePoints",
                self.n_points,
                grid.len(),
            ));
        }
        for selector in selectors {
            let selector: &[String] = match selector.as_slice() {
                [tag] if tag == LEGACY_REFERENCE_TAG => &[],
                names => names,
            };
            for point in grid.points() {
                let subset = allow_subset_match
                    && selector.len() < point.params.len()
                    && selector
                        .first()
                        .map(|name| point.params.contains(name))
                        .unwrap_or(false);
                if subset || point.matches(selector) {
                    log::info!("zeroing {} term", point.label());
                    let start = point.index * self.n_bins;
                    let end = start + self.n_bins;
                    self.sum_w[start..end].fill(0.0);
                    self.sum_w2[start..end].fill(0.0);
                }
            }
        }
        Ok(())
    }

    /// Raw sums of one cell.
    pub fn cell(&self, point: usize, bin: usize) -> Result<CellStats, EftError> {
        let idx = self.offset(point, bin)?;
        Ok(CellStats {
            sum_w: self.sum_w[idx],
            sum_w2: self.sum_w2[idx],
            entries: self.num_entries[idx],
        })
    }

    /// `sumW` row of one point.
    pub fn sum_w(&self, point: usize) -> &[f64] {
        &self.sum_w[point * self.n_bins..(point + 1) * self.n_bins]
    }

    /// `sumW2` row of one point.
    pub fn sum_w2(&self, point: usize) -> &[f64] {
        &self.sum_w2[point * self.n_bins..(point + 1) * self.n_bins]
    }

    /// `numEntries` row of one point.
    pub fn num_entries(&self, point: usize) -> &[u64] {
        &self.num_entries[point * self.n_bins..(point + 1) * self.n_bins]
    }

    /// Nested copies of the three arrays, `[point][bin]`.
    pub fn to_nested(&self) -> (Vec<Vec<f64>>, Vec<Vec<f64>>, Vec<Vec<u64>>) {
        let rows = |point: usize| point * self.n_bins..(point + 1) * self.n_bins;
        (
            (0..self.n_points)
                .map(|p| self.sum_w[rows(p)].to_vec())
                .collect(),
            (0..self.n_points)
                .map(|p| self.sum_w2[rows(p)].to_vec())
                .collect(),
            (0..self.n_points)
                .map(|p| self.num_entries[rows(p)].to_vec())
                .collect(),
        )
    }

    /// Mean weights and standard errors with guarded division.
    pub fn bin_statistics(&self) -> BinStatistics {
        let mut mean = Vec::with_capacity(self.n_points);
        let mut std_err = Vec::with_capacity(self.n_points);
        for point in 0..self.n_points {
            let (m, e): (Vec<f64>, Vec<f64>) = (0..self.n_bins)
                .map(|bin| {
                    let idx = point * self.n_bins + bin;
                    let cell = CellStats {
                        sum_w: self.sum_w[idx],
                        sum_w2: self.sum_w2[idx],
                        entries: self.num_entries[idx],
                    };
                    (cell.mean(), cell.std_err())
                })
                .unzip();
            mean.push(m);
            std_err.push(e);
        }
        BinStatistics { mean, std_err }
    }
}

fn check_matrix<T>(
    field: &str,
    rows: &[Vec<T>],
    n_points: usize,
    n_bins: usize,
) -> Result<(), EftError> {
    if rows.len() != n_points {
        return Err(EftError::shape("stats-shape", field, n_points, rows.len()));
    }
    for row in rows {
        if row.len() != n_bins {
            return Err(EftError::shape("stats-shape", field, n_bins, row.len()));
        }
    }
    Ok(())
}
