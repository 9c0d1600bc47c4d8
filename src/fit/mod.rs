//! Calibration: momentum partitioning, slice fitting, and concatenation.
//!
//! Responsibilities:
//!
//! - partition the momentum range into equal-width slices
//! - histogram `m²` per slice and fit a single Gaussian to each (parallel)
//! - concatenate the slice fits into a piecewise density per species
//! - drive the fill/fit passes over all species at once

pub mod builder;
pub mod calibration;
pub mod density;
pub mod gauss_fit;
pub mod partition;
pub mod slice;

pub use builder::*;
pub use calibration::*;
pub use density::*;
pub use gauss_fit::*;
pub use partition::*;
pub use slice::*;
