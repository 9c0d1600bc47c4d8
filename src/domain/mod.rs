//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - candidate records and calibration configuration (`Candidate`, `CalibrationConfig`)
//! - species classes and the particle-code catalogue (`SpeciesClass`)
//! - fit outputs (`GaussianParams`, `FitQuality`)
//! - the persisted calibration schema (`ModelFile`)

pub mod species;
pub mod types;

pub use species::*;
pub use types::*;
