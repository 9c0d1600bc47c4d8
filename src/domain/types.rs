//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during calibration and classification
//! - written to the persisted calibration JSON
//! - reloaded later for inference or inspection

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::SpeciesClass;
use crate::error::PidError;

/// One track candidate with a valid time-of-flight match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Momentum (GeV/c).
    pub p: f64,
    /// Measured mass squared (GeV²/c⁴).
    pub m2: f64,
    /// Generator-level particle code.
    pub true_code: i32,
}

/// Lifecycle of a species calibration model.
///
/// Transitions are strictly forward: `Unfilled → Filled → Fitted → Concatenated → Persisted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CalibrationState {
    Unfilled,
    Filled,
    Fitted,
    Concatenated,
    Persisted,
}

impl fmt::Display for CalibrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CalibrationState::Unfilled => "unfilled",
            CalibrationState::Filled => "filled",
            CalibrationState::Fitted => "fitted",
            CalibrationState::Concatenated => "concatenated",
            CalibrationState::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

/// Fitted Gaussian `A · exp(-(x - μ)² / 2σ²)`, in counts per histogram bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianParams {
    pub amplitude: f64,
    pub mean: f64,
    pub sigma: f64,
}

impl GaussianParams {
    pub fn eval(&self, x: f64) -> f64 {
        crate::math::gaussian(x, self.amplitude, self.mean, self.sigma)
    }
}

/// Goodness-of-fit metadata of one slice fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub chi2: f64,
    pub ndf: usize,
    pub iterations: usize,
    pub converged: bool,
}

impl FitQuality {
    pub fn chi2_per_ndf(&self) -> f64 {
        if self.ndf == 0 {
            f64::NAN
        } else {
            self.chi2 / self.ndf as f64
        }
    }
}

/// Fixed binning of the mass-squared axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
    pub bins: usize,
}

impl AxisRange {
    pub fn validate(&self) -> Result<(), PidError> {
        if !(self.min.is_finite() && self.max.is_finite() && self.min < self.max) {
            return Err(PidError::InvalidConfig(format!(
                "invalid m2 axis [{}, {}]",
                self.min, self.max
            )));
        }
        if self.bins == 0 {
            return Err(PidError::InvalidConfig("m2 axis needs at least one bin".into()));
        }
        Ok(())
    }
}

impl Default for AxisRange {
    fn default() -> Self {
        Self {
            min: -1.0,
            max: 2.0,
            bins: 400,
        }
    }
}

/// Calibration run configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct CalibrationConfig {
    pub filelist: PathBuf,
    pub output: PathBuf,
    /// Lower bound of the first momentum slice. Slices start here, not at zero.
    pub p_min: f64,
    pub p_max: f64,
    pub n_slices: usize,
    pub m2_axis: AxisRange,
    pub species: Vec<SpeciesClass>,
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<(), PidError> {
        if !(self.p_min.is_finite() && self.p_max.is_finite()) || self.p_min >= self.p_max {
            return Err(PidError::MalformedRange {
                p_min: self.p_min,
                p_max: self.p_max,
            });
        }
        if self.n_slices == 0 {
            return Err(PidError::InvalidConfig("slice count must be > 0".into()));
        }
        self.m2_axis.validate()?;
        validate_species(&self.species)
    }
}

/// Inference run configuration.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub filelist: PathBuf,
    pub model: PathBuf,
    pub purity_cut: f64,
    pub species: Vec<SpeciesClass>,
    pub export_labels: Option<PathBuf>,
    pub export_diagnostics: Option<PathBuf>,
}

/// Species classes must be non-empty, uniquely keyed and not share codes.
pub fn validate_species(species: &[SpeciesClass]) -> Result<(), PidError> {
    if species.is_empty() {
        return Err(PidError::InvalidConfig("at least one species class is required".into()));
    }
    for (i, a) in species.iter().enumerate() {
        if a.codes.is_empty() {
            return Err(PidError::InvalidConfig(format!("species '{}' has no codes", a.name)));
        }
        for b in &species[i + 1..] {
            if a.key() == b.key() {
                return Err(PidError::InvalidConfig(format!(
                    "species '{}' and '{}' share the key {}",
                    a.name,
                    b.name,
                    a.key()
                )));
            }
            if let Some(code) = a.codes.iter().find(|c| b.contains(**c)) {
                return Err(PidError::InvalidConfig(format!(
                    "code {code} belongs to both '{}' and '{}'",
                    a.name, b.name
                )));
            }
        }
    }
    Ok(())
}

/// Outcome of a slice fit as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SliceStatus {
    Fitted,
    /// Fit was not possible; the slice contributes zero density.
    Degraded,
}

/// One persisted momentum slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceEntry {
    pub p_lo: f64,
    pub p_hi: f64,
    pub amplitude: f64,
    pub mean: f64,
    pub sigma: f64,
    pub chi2: f64,
    pub ndf: usize,
    pub status: SliceStatus,
}

/// One persisted species model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesEntry {
    pub key: String,
    pub name: String,
    pub codes: Vec<i32>,
    pub slices: Vec<SliceEntry>,
}

/// A saved calibration file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    pub tool: String,
    pub created: DateTime<Utc>,
    pub p_min: f64,
    pub p_max: f64,
    pub n_slices: usize,
    /// Only used for diagnostic plotting; density evaluation does not need it.
    pub m2_axis: AxisRange,
    pub species: Vec<SpeciesEntry>,
}

impl ModelFile {
    pub fn find(&self, key: &str) -> Option<&SpeciesEntry> {
        self.species.iter().find(|s| s.key == key)
    }
}
