//! Reporting utilities: per-species fit summaries and formatted terminal output.

use crate::domain::{ModelFile, SliceStatus};

pub mod format;

pub use format::*;

/// Fit outcome of one persisted species model.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesFitSummary {
    pub name: String,
    pub key: String,
    pub fitted: usize,
    pub degraded: usize,
    /// Mean χ²/ndf over fitted slices with `ndf > 0`.
    pub mean_chi2_ndf: Option<f64>,
    /// Momentum range `(lo, hi]` of the first and last fitted slices.
    pub fitted_range: Option<(f64, f64)>,
    pub median_mean: Option<f64>,
    pub median_sigma: Option<f64>,
}

/// Summarize every species entry of a calibration file.
pub fn summarize_model(model: &ModelFile) -> Vec<SpeciesFitSummary> {
    model
        .species
        .iter()
        .map(|entry| {
            let fitted: Vec<_> = entry
                .slices
                .iter()
                .filter(|s| s.status == SliceStatus::Fitted)
                .collect();

            let ratios: Vec<f64> = fitted
                .iter()
                .filter(|s| s.ndf > 0)
                .map(|s| s.chi2 / s.ndf as f64)
                .collect();
            let mean_chi2_ndf = if ratios.is_empty() {
                None
            } else {
                Some(ratios.iter().sum::<f64>() / ratios.len() as f64)
            };

            let fitted_range = match (fitted.first(), fitted.last()) {
                (Some(a), Some(b)) => Some((a.p_lo, b.p_hi)),
                _ => None,
            };

            SpeciesFitSummary {
                name: entry.name.clone(),
                key: entry.key.clone(),
                fitted: fitted.len(),
                degraded: entry.slices.len() - fitted.len(),
                mean_chi2_ndf,
                fitted_range,
                median_mean: median(fitted.iter().map(|s| s.mean).collect()),
                median_sigma: median(fitted.iter().map(|s| s.sigma).collect()),
            }
        })
        .collect()
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some(0.5 * (values[mid - 1] + values[mid]))
    } else {
        Some(values[mid])
    }
}
