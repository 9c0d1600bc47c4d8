//! Read/write calibration JSON files.
//!
//! The calibration file is the portable result of a calibration pass:
//! - the momentum range and slice count it was built with
//! - the m² axis the slice histograms used
//! - one entry per species, keyed by its particle codes joined with `_`
//!
//! The schema is defined by `domain::ModelFile`.

use std::fs::File;
use std::path::Path;

use crate::domain::ModelFile;
use crate::error::AppError;
use crate::fit::density::CalibrationDensityFunction;

/// Write a calibration JSON file.
pub fn write_model_json(path: &Path, model: &ModelFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create calibration JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, model)
        .map_err(|e| AppError::new(2, format!("Failed to write calibration JSON: {e}")))?;

    Ok(())
}

/// Read and validate a calibration JSON file.
pub fn read_model_json(path: &Path) -> Result<ModelFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open calibration JSON '{}': {e}", path.display())))?;
    let model: ModelFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid calibration JSON: {e}")))?;
    validate_model(&model)?;
    Ok(model)
}

/// Structural checks a hand-edited or truncated file could violate.
fn validate_model(model: &ModelFile) -> Result<(), AppError> {
    let invalid = |msg: String| AppError::new(2, format!("Invalid calibration JSON: {msg}"));

    if !(model.p_min.is_finite() && model.p_max.is_finite() && model.p_min < model.p_max) {
        return Err(invalid(format!(
            "momentum range [{}, {}] is malformed",
            model.p_min, model.p_max
        )));
    }
    model.m2_axis.validate().map_err(|e| invalid(e.to_string()))?;
    if model.species.is_empty() {
        return Err(invalid("no species entries".to_string()));
    }

    for entry in &model.species {
        let key = entry
            .codes
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join("_");
        if key != entry.key {
            return Err(invalid(format!("entry '{}' does not match its codes ({key})", entry.key)));
        }
        if entry.slices.len() != model.n_slices {
            return Err(invalid(format!(
                "entry '{}' has {} slices, expected {}",
                entry.key,
                entry.slices.len(),
                model.n_slices
            )));
        }
        CalibrationDensityFunction::from_entry(entry)
            .map_err(|e| invalid(format!("entry '{}': {e}", entry.key)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AxisRange, SliceEntry, SliceStatus, SpeciesEntry};

    fn slice(p_lo: f64, p_hi: f64) -> SliceEntry {
        SliceEntry {
            p_lo,
            p_hi,
            amplitude: 120.0,
            mean: 0.24,
            sigma: 0.03,
            chi2: 12.5,
            ndf: 40,
            status: SliceStatus::Fitted,
        }
    }

    fn model() -> ModelFile {
        ModelFile {
            tool: "tofpid".to_string(),
            created: chrono::Utc::now(),
            p_min: 0.0,
            p_max: 2.0,
            n_slices: 2,
            m2_axis: AxisRange::default(),
            species: vec![SpeciesEntry {
                key: "321".to_string(),
                name: "kaons".to_string(),
                codes: vec![321],
                slices: vec![slice(0.0, 1.0), slice(1.0, 2.0)],
            }],
        }
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("tofpid-model-{name}-{}.json", std::process::id()))
    }

    #[test]
    fn written_model_reads_back() {
        let path = temp_path("roundtrip");
        let m = model();
        write_model_json(&path, &m).unwrap();
        let back = read_model_json(&path).unwrap();
        assert_eq!(back.species, m.species);
        assert_eq!(back.created, m.created);
    }

    #[test]
    fn gapped_slices_are_rejected() {
        let path = temp_path("gap");
        let mut m = model();
        m.species[0].slices[1] = slice(1.5, 2.0);
        write_model_json(&path, &m).unwrap();
        let err = read_model_json(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn mismatched_key_is_rejected() {
        let path = temp_path("key");
        let mut m = model();
        m.species[0].key = "2212".to_string();
        write_model_json(&path, &m).unwrap();
        assert!(read_model_json(&path).unwrap_err().to_string().contains("2212"));
    }
}
