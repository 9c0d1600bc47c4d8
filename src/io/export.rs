//! Export calibration and inference results.
//!
//! - labeled candidates as CSV (one row per candidate, easy to load in a notebook)
//! - the diagnostics summary as JSON
//! - the raw m² histogram of every calibration slice as CSV

use std::fs::File;
use std::path::Path;

use crate::classify::{ClassificationEngine, Decision, DiagnosticsReport};
use crate::domain::Candidate;
use crate::error::AppError;
use crate::fit::calibration::SpeciesCalibrationModel;

/// Write per-candidate labels to a CSV file.
///
/// `label_codes` lists the codes of the assigned class joined with `_`
/// (`0` for background).
pub fn write_labels_csv(
    path: &Path,
    candidates: &[Candidate],
    decisions: &[Decision],
    engine: &ClassificationEngine,
) -> Result<(), AppError> {
    if candidates.len() != decisions.len() {
        return Err(AppError::new(
            4,
            format!(
                "label export: {} candidates but {} decisions",
                candidates.len(),
                decisions.len()
            ),
        ));
    }

    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create label CSV '{}': {e}", path.display())))?;

    writer
        .write_record(["p", "m2", "true_pdg", "label", "label_codes", "confidence"])
        .map_err(|e| AppError::new(2, format!("Failed to write label CSV header: {e}")))?;

    for (c, d) in candidates.iter().zip(decisions) {
        let codes = engine
            .label_codes(d.label)
            .iter()
            .map(|code| code.to_string())
            .collect::<Vec<_>>()
            .join("_");
        writer
            .write_record([
                format!("{:.6}", c.p),
                format!("{:.6}", c.m2),
                c.true_code.to_string(),
                engine.label_name(d.label).to_string(),
                codes,
                format!("{:.6}", d.confidence),
            ])
            .map_err(|e| AppError::new(2, format!("Failed to write label CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush label CSV: {e}")))?;
    Ok(())
}

/// Write every slice histogram of every model, one row per m² bin.
///
/// Columns: `species,key,slice,p_lo,p_hi,m2,count` where `m2` is the bin center.
pub fn write_slice_histograms_csv(path: &Path, models: &[SpeciesCalibrationModel]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create histogram CSV '{}': {e}", path.display())))?;

    writer
        .write_record(["species", "key", "slice", "p_lo", "p_hi", "m2", "count"])
        .map_err(|e| AppError::new(2, format!("Failed to write histogram CSV header: {e}")))?;

    for model in models {
        let key = model.class().key();
        for (idx, slice) in model.slices().iter().enumerate() {
            let hist = slice.histogram();
            for (bin, count) in hist.counts().iter().enumerate() {
                writer
                    .write_record([
                        model.class().name.clone(),
                        key.clone(),
                        idx.to_string(),
                        format!("{:.6}", slice.interval().lo()),
                        format!("{:.6}", slice.interval().hi()),
                        format!("{:.6}", hist.bin_center(bin)),
                        count.to_string(),
                    ])
                    .map_err(|e| AppError::new(2, format!("Failed to write histogram CSV row: {e}")))?;
            }
        }
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush histogram CSV: {e}")))?;
    Ok(())
}

/// Write the diagnostics summary as pretty JSON.
pub fn write_diagnostics_json(path: &Path, report: &DiagnosticsReport) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create diagnostics JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, report)
        .map_err(|e| AppError::new(2, format!("Failed to write diagnostics JSON: {e}")))?;
    Ok(())
}
