//! Queryable polynomial scaling model.

use std::collections::{BTreeMap, BTreeSet};

use eft_core::errors::{EftError, ErrorInfo};
use serde::{Deserialize, Serialize};

use crate::hist::{BinSequence, BinSequenceMut};

/// Coupling values keyed by parameter name.
pub type Couplings = BTreeMap<String, f64>;

/// Histogram bin edges: `[lo, hi]` per bin, or `[[xlo, xhi], [ylo, yhi]]` in 2-D.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BinEdges {
    /// One range per bin.
    OneD(Vec<[f64; 2]>),
    /// One x range and one y range per bin.
    TwoD(Vec<[[f64; 2]; 2]>),
}

impl Default for BinEdges {
    fn default() -> Self {
        BinEdges::OneD(Vec::new())
    }
}

impl BinEdges {
    /// Builds 1-D ranges from a list of `n + 1` boundaries.
    pub fn from_boundaries(boundaries: &[f64]) -> Self {
        BinEdges::OneD(boundaries.windows(2).map(|w| [w[0], w[1]]).collect())
    }

    /// Number of bins described.
    pub fn len(&self) -> usize {
        match self {
            BinEdges::OneD(edges) => edges.len(),
            BinEdges::TwoD(edges) => edges.len(),
        }
    }

    /// Whether no edges are known.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the binning is two dimensional.
    pub fn is_two_d(&self) -> bool {
        matches!(self, BinEdges::TwoD(_))
    }

    /// Bin widths in 1-D, bin areas in 2-D.
    pub fn widths(&self) -> Vec<f64> {
        match self {
            BinEdges::OneD(edges) => edges.iter().map(|[lo, hi]| hi - lo).collect(),
            BinEdges::TwoD(edges) => edges
                .iter()
                .map(|[x, y]| (x[1] - x[0]) * (y[1] - y[0]))
                .collect(),
        }
    }

    /// Flattens 2-D bins onto one axis, each bin as wide as its y range.
    ///
    /// 1-D edges are returned unchanged.
    pub fn unrolled(&self) -> Vec<[f64; 2]> {
        match self {
            BinEdges::OneD(edges) => edges.clone(),
            BinEdges::TwoD(edges) => {
                let mut lo = 0.0;
                edges
                    .iter()
                    .map(|[_, y]| {
                        let hi = lo + (y[1] - y[0]);
                        let range = [lo, hi];
                        lo = hi;
                        range
                    })
                    .collect()
            }
        }
    }
}

/// Category of a polynomial term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermKind {
    /// No parameters.
    Constant,
    /// `c_p * x_p`.
    Linear,
    /// `c_pp * x_p^2`.
    Quadratic,
    /// `c_pq * x_p * x_q`.
    Cross,
}

/// One polynomial coefficient with per-bin values and uncertainties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EftTerm {
    params: Vec<String>,
    values: Vec<f64>,
    uncertainties: Vec<f64>,
}

impl EftTerm {
    /// Creates a term; cross-term names are stored sorted.
    pub fn new(
        params: Vec<String>,
        values: Vec<f64>,
        uncertainties: Vec<f64>,
    ) -> Result<Self, EftError> {
        if params.len() > 2 {
            return Err(EftError::InvalidConfiguration(
                ErrorInfo::new("term-degree", "terms have at most two parameters")
                    .with_context("field", "terms")
                    .with_context("actual", params.join(" * ")),
            ));
        }
        if params.iter().any(String::is_empty) {
            return Err(EftError::invalid(
                "term-name",
                "terms",
                "term parameter names must be non-empty",
            ));
        }
        if uncertainties.len() != values.len() {
            return Err(EftError::shape(
                "term-shape",
                "uncertainties",
                values.len(),
                uncertainties.len(),
            ));
        }
        let mut params = params;
        params.sort();
        Ok(Self {
            params,
            values,
            uncertainties,
        })
    }

    /// Parameter names of the term.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Per-bin coefficient values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Per-bin coefficient uncertainties.
    pub fn uncertainties(&self) -> &[f64] {
        &self.uncertainties
    }

    /// Category of the term.
    pub fn kind(&self) -> TermKind {
        match self.params.as_slice() {
            [] => TermKind::Constant,
            [_] => TermKind::Linear,
            [a, b] if a == b => TermKind::Quadratic,
            _ => TermKind::Cross,
        }
    }

    /// Canonical ordering key: constant, then single-parameter, then cross terms.
    pub fn sort_key(&self) -> (bool, usize, &[String]) {
        let distinct = match self.kind() {
            TermKind::Constant => 0,
            TermKind::Linear | TermKind::Quadratic => 1,
            TermKind::Cross => 2,
        };
        (!self.params.is_empty(), distinct, &self.params)
    }

    /// Order-insensitive comparison of the parameter names.
    pub fn matches<S: AsRef<str>>(&self, names: &[S]) -> bool {
        let mut other: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        other.sort_unstable();
        self.params.iter().map(String::as_str).eq(other)
    }

    fn largest_magnitude(&self) -> f64 {
        self.values.iter().fold(0.0, |acc: f64, v| acc.max(v.abs()))
    }

    fn product(&self, couplings: &Couplings) -> f64 {
        self.params
            .iter()
            .map(|name| couplings.get(name).copied().unwrap_or(0.0))
            .product()
    }
}

/// Switches selecting which term categories contribute to an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalOpts {
    /// Include linear terms.
    #[serde(default = "enabled")]
    pub linear: bool,
    /// Include pure quadratic terms.
    #[serde(default = "enabled")]
    pub quadratic: bool,
    /// Include cross terms.
    #[serde(default = "enabled")]
    pub cross: bool,
}

fn enabled() -> bool {
    true
}

impl Default for EvalOpts {
    fn default() -> Self {
        Self {
            linear: true,
            quadratic: true,
            cross: true,
        }
    }
}

impl EvalOpts {
    fn includes(&self, kind: TermKind) -> bool {
        match kind {
            TermKind::Constant => true,
            TermKind::Linear => self.linear,
            TermKind::Quadratic => self.quadratic,
            TermKind::Cross => self.cross,
        }
    }
}

/// Output of [`ScalingModel::evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledBins {
    /// Predicted bin contents.
    pub values: Vec<f64>,
    /// Predicted bin uncertainties.
    pub uncertainties: Vec<f64>,
}

/// Immutable quadratic scaling model of a binned observable.
///
/// Coefficients are relative to the SM prediction, so a bin scales as
/// `1 + sum(c_t * prod(x))` over the included terms.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingModel {
    nbins: usize,
    edges: BinEdges,
    labels: Option<Vec<String>>,
    sm_vals: Vec<f64>,
    terms: Vec<EftTerm>,
}

impl ScalingModel {
    /// Validates shapes and stores the terms in canonical order.
    pub fn new(
        nbins: usize,
        edges: BinEdges,
        labels: Option<Vec<String>>,
        sm_vals: Vec<f64>,
        mut terms: Vec<EftTerm>,
    ) -> Result<Self, EftError> {
        if sm_vals.len() != nbins {
            return Err(EftError::shape("model-shape", "sm_vals", nbins, sm_vals.len()));
        }
        if !edges.is_empty() && edges.len() != nbins {
            return Err(EftError::shape("model-shape", "bin_edges", nbins, edges.len()));
        }
        if let Some(labels) = &labels {
            if labels.len() != nbins {
                return Err(EftError::shape("model-shape", "bin_labels", nbins, labels.len()));
            }
        }
        for term in &terms {
            if term.values.len() != nbins {
                return Err(EftError::ShapeMismatch(
                    ErrorInfo::new("model-shape", "term has the wrong number of bins")
                        .with_context("field", "terms")
                        .with_context("term", term.params.join(" * "))
                        .with_context("expected", nbins)
                        .with_context("actual", term.values.len()),
                ));
            }
        }
        terms.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        if let Some(pair) = terms.windows(2).find(|w| w[0].params == w[1].params) {
            return Err(EftError::InvalidConfiguration(
                ErrorInfo::new("duplicate-term", "each term may appear only once")
                    .with_context("field", "terms")
                    .with_context("term", pair[0].params.join(" * ")),
            ));
        }
        Ok(Self {
            nbins,
            edges,
            labels,
            sm_vals,
            terms,
        })
    }

    /// Number of bins.
    pub fn nbins(&self) -> usize {
        self.nbins
    }

    /// Bin edges, empty when unknown.
    pub fn edges(&self) -> &BinEdges {
        &self.edges
    }

    /// Optional bin labels.
    pub fn labels(&self) -> Option<&[String]> {
        self.labels.as_deref()
    }

    /// Terms in canonical order.
    pub fn terms(&self) -> &[EftTerm] {
        &self.terms
    }

    /// SM reference value per bin.
    pub fn nominal(&self) -> &[f64] {
        &self.sm_vals
    }

    /// Distinct parameter names across all terms, sorted.
    pub fn parameter_names(&self) -> Vec<String> {
        self.terms
            .iter()
            .flat_map(|t| t.params.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Looks up a term by its (unordered) parameter names.
    pub fn term<S: AsRef<str>>(&self, params: &[S]) -> Option<&EftTerm> {
        self.terms.iter().find(|t| t.matches(params))
    }

    /// Per-bin relative scaling and its variance for the given couplings.
    fn scaling(&self, couplings: &Couplings, opts: &EvalOpts) -> (Vec<f64>, Vec<f64>) {
        let mut scale = vec![0.0; self.nbins];
        let mut variance = vec![0.0; self.nbins];
        for term in self.terms.iter().filter(|t| opts.includes(t.kind())) {
            let product = term.product(couplings);
            if product == 0.0 {
                continue;
            }
            for bin in 0..self.nbins {
                scale[bin] += term.values[bin] * product;
                let err = term.uncertainties[bin] * product;
                variance[bin] += err * err;
            }
        }
        (scale, variance)
    }

    /// Scales `nominal` bin by bin: `(1 + s) * n` with uncertainty `sqrt(var) * n`.
    ///
    /// Couplings missing from `couplings` are treated as zero.
    pub fn evaluate<B: BinSequence + ?Sized>(
        &self,
        nominal: &B,
        couplings: &Couplings,
        opts: &EvalOpts,
    ) -> Result<ScaledBins, EftError> {
        if nominal.num_bins() != self.nbins {
            return Err(EftError::shape(
                "evaluate-shape",
                "nominal",
                self.nbins,
                nominal.num_bins(),
            ));
        }
        let (scale, variance) = self.scaling(couplings, opts);
        let mut values = Vec::with_capacity(self.nbins);
        let mut uncertainties = Vec::with_capacity(self.nbins);
        for bin in 0..self.nbins {
            let base = nominal.content(bin);
            values.push((1.0 + scale[bin]) * base);
            uncertainties.push(variance[bin].sqrt() * base);
        }
        Ok(ScaledBins {
            values,
            uncertainties,
        })
    }

    /// Scales a histogram in place.
    ///
    /// The model uncertainty is added in quadrature to the existing bin error.
    pub fn apply<H: BinSequenceMut + ?Sized>(
        &self,
        hist: &mut H,
        couplings: &Couplings,
        opts: &EvalOpts,
    ) -> Result<(), EftError> {
        let scaled = self.evaluate(&*hist, couplings, opts)?;
        for bin in 0..self.nbins {
            let existing = hist.error(bin);
            let model = scaled.uncertainties[bin];
            hist.set_content(bin, scaled.values[bin]);
            hist.set_error(bin, (existing * existing + model * model).sqrt());
        }
        Ok(())
    }

    /// Copy of the model without terms whose largest magnitude is below `threshold`.
    ///
    /// With `relative`, the cut is `threshold` times the largest magnitude of any term.
    pub fn pruned(&self, threshold: f64, relative: bool) -> ScalingModel {
        let cut = if relative {
            let largest = self
                .terms
                .iter()
                .map(EftTerm::largest_magnitude)
                .fold(0.0, f64::max);
            if largest == 0.0 {
                log::warn!("relative pruning requested but every term is zero");
            }
            threshold * largest
        } else {
            threshold
        };
        let terms: Vec<EftTerm> = self
            .terms
            .iter()
            .filter(|t| t.largest_magnitude() >= cut)
            .cloned()
            .collect();
        log::info!(
            "pruned {} of {} terms below {cut:e}",
            self.terms.len() - terms.len(),
            self.terms.len()
        );
        ScalingModel {
            terms,
            ..self.clone()
        }
    }
}
