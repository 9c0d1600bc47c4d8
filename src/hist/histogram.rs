//! One-dimensional count histogram over a fixed axis.
//!
//! Counts are integers so that partial fills merged by elementwise sum are
//! exactly equal to a single combined fill, regardless of order.

use crate::domain::AxisRange;
use crate::error::PidError;

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram1D {
    min: f64,
    max: f64,
    counts: Vec<u64>,
    underflow: u64,
    overflow: u64,
}

impl Histogram1D {
    /// Create an empty histogram. The axis must already be validated.
    pub fn new(axis: &AxisRange) -> Self {
        Self {
            min: axis.min,
            max: axis.max,
            counts: vec![0; axis.bins],
            underflow: 0,
            overflow: 0,
        }
    }

    pub fn axis(&self) -> AxisRange {
        AxisRange {
            min: self.min,
            max: self.max,
            bins: self.counts.len(),
        }
    }

    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.counts.len() as f64
    }

    /// Centre of bin `i`.
    pub fn bin_center(&self, i: usize) -> f64 {
        self.min + (i as f64 + 0.5) * self.bin_width()
    }

    /// Bin index for `x`, or `None` when it falls outside `[min, max)`.
    pub fn find_bin(&self, x: f64) -> Option<usize> {
        let (lo, hi) = (self.min, self.max);
        if !(x >= lo && x < hi) {
            return None;
        }
        let idx = ((x - lo) / self.bin_width()) as usize;
        Some(idx.min(self.counts.len() - 1))
    }

    pub fn fill(&mut self, x: f64) {
        match self.find_bin(x) {
            Some(i) => self.counts[i] += 1,
            None if x < self.min => self.underflow += 1,
            // NaN lands in overflow.
            None => self.overflow += 1,
        }
    }

    /// Add another histogram's counts bin by bin.
    ///
    /// Merging is only defined for identical binning; `self` is left untouched
    /// when the axes differ.
    pub fn merge(&mut self, other: &Histogram1D) -> Result<(), PidError> {
        if self.axis() != other.axis() {
            let (a, b) = (self.axis(), other.axis());
            return Err(PidError::InvalidConfig(format!(
                "cannot merge m2 histograms with different axes: [{}, {}] x {} vs [{}, {}] x {}",
                a.min, a.max, a.bins, b.min, b.max, b.bins
            )));
        }
        for (a, b) in self.counts.iter_mut().zip(other.counts.iter()) {
            *a += *b;
        }
        self.underflow += other.underflow;
        self.overflow += other.overflow;
        Ok(())
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// In-range entries.
    pub fn entries(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// All fills including under/overflow.
    pub fn total_fills(&self) -> u64 {
        self.entries() + self.underflow + self.overflow
    }

    pub fn nonzero_bins(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    /// Count-weighted mean and standard deviation of the in-range entries.
    pub fn mean_and_rms(&self) -> Option<(f64, f64)> {
        let n = self.entries();
        if n == 0 {
            return None;
        }
        let mut sum = 0.0;
        let mut sum2 = 0.0;
        for (i, &c) in self.counts.iter().enumerate() {
            let x = self.bin_center(i);
            sum += c as f64 * x;
            sum2 += c as f64 * x * x;
        }
        let mean = sum / n as f64;
        let var = (sum2 / n as f64 - mean * mean).max(0.0);
        Some((mean, var.sqrt()))
    }
}
