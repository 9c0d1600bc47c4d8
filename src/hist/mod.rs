//! Fixed-binning count histograms.

pub mod histogram;

pub use histogram::*;
