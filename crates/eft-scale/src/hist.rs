//! Bin-indexable sequences accepted by [`crate::ScalingModel`].
//!
//! Plain numeric slices, the crate's own [`Histogram`], and external histogram
//! types (through [`OneBased`]) all implement the same capability.

use serde::{Deserialize, Serialize};

/// Read access to bin contents by zero-based bin number.
pub trait BinSequence {
    /// Number of bins.
    fn num_bins(&self) -> usize;
    /// Content of `bin`.
    fn content(&self, bin: usize) -> f64;
    /// Error of `bin`; zero for sequences without errors.
    fn error(&self, _bin: usize) -> f64 {
        0.0
    }
}

/// Write access on top of [`BinSequence`].
pub trait BinSequenceMut: BinSequence {
    /// Replaces the content of `bin`.
    fn set_content(&mut self, bin: usize, value: f64);
    /// Replaces the error of `bin`; ignored by sequences without errors.
    fn set_error(&mut self, bin: usize, value: f64);
}

impl BinSequence for [f64] {
    fn num_bins(&self) -> usize {
        self.len()
    }

    fn content(&self, bin: usize) -> f64 {
        self[bin]
    }
}

impl BinSequenceMut for [f64] {
    fn set_content(&mut self, bin: usize, value: f64) {
        self[bin] = value;
    }

    fn set_error(&mut self, _bin: usize, _value: f64) {}
}

impl BinSequence for Vec<f64> {
    fn num_bins(&self) -> usize {
        self.len()
    }

    fn content(&self, bin: usize) -> f64 {
        self[bin]
    }
}

impl BinSequenceMut for Vec<f64> {
    fn set_content(&mut self, bin: usize, value: f64) {
        self[bin] = value;
    }

    fn set_error(&mut self, _bin: usize, _value: f64) {}
}

/// Minimal histogram with per-bin contents and errors.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Histogram {
    /// Bin contents.
    pub contents: Vec<f64>,
    /// Bin errors.
    pub errors: Vec<f64>,
}

impl Histogram {
    /// Histogram with the given contents and zero errors.
    pub fn from_contents(contents: Vec<f64>) -> Self {
        let errors = vec![0.0; contents.len()];
        Self { contents, errors }
    }
}

impl BinSequence for Histogram {
    fn num_bins(&self) -> usize {
        self.contents.len()
    }

    fn content(&self, bin: usize) -> f64 {
        self.contents[bin]
    }

    fn error(&self, bin: usize) -> f64 {
        self.errors.get(bin).copied().unwrap_or(0.0)
    }
}

impl BinSequenceMut for Histogram {
    fn set_content(&mut self, bin: usize, value: f64) {
        self.contents[bin] = value;
    }

    fn set_error(&mut self, bin: usize, value: f64) {
        if self.errors.len() < self.contents.len() {
            self.errors.resize(self.contents.len(), 0.0);
        }
        self.errors[bin] = value;
    }
}

/// Accessors of plotting-library histograms that number bins from 1
/// (bin 0 being the underflow).
pub trait ExternalHistogram {
    /// Number of in-range bins.
    fn n_bins_x(&self) -> usize;
    /// Content of the 1-based bin `i`.
    fn bin_content(&self, i: usize) -> f64;
    /// Error of the 1-based bin `i`.
    fn bin_error(&self, i: usize) -> f64;
    /// Sets the content of the 1-based bin `i`.
    fn set_bin_content(&mut self, i: usize, value: f64);
    /// Sets the error of the 1-based bin `i`.
    fn set_bin_error(&mut self, i: usize, value: f64);
}

impl<H: ExternalHistogram + ?Sized> ExternalHistogram for &mut H {
    fn n_bins_x(&self) -> usize {
        (**self).n_bins_x()
    }

    fn bin_content(&self, i: usize) -> f64 {
        (**self).bin_content(i)
    }

    fn bin_error(&self, i: usize) -> f64 {
        (**self).bin_error(i)
    }

    fn set_bin_content(&mut self, i: usize, value: f64) {
        (**self).set_bin_content(i, value)
    }

    fn set_bin_error(&mut self, i: usize, value: f64) {
        (**self).set_bin_error(i, value)
    }
}

/// Adapter exposing an [`ExternalHistogram`] with zero-based bin numbers.
#[derive(Debug)]
pub struct OneBased<H>(pub H);

impl<H> OneBased<H> {
    /// Returns the wrapped histogram.
    pub fn into_inner(self) -> H {
        self.0
    }
}

impl<H: ExternalHistogram> BinSequence for OneBased<H> {
    fn num_bins(&self) -> usize {
        self.0.n_bins_x()
    }

    fn content(&self, bin: usize) -> f64 {
        self.0.bin_content(bin + 1)
    }

    fn error(&self, bin: usize) -> f64 {
        self.0.bin_error(bin + 1)
    }
}

impl<H: ExternalHistogram> BinSequenceMut for OneBased<H> {
    fn set_content(&mut self, bin: usize, value: f64) {
        self.0.set_bin_content(bin + 1, value)
    }

    fn set_error(&mut self, bin: usize, value: f64) {
        self.0.set_bin_error(bin + 1, value)
    }
}
