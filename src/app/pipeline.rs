//! Shared calibration and inference workflows.
//!
//! Keeping the workflows here (instead of inside the command handlers) lets the
//! integration tests drive the exact same steps the binary runs:
//!
//! - calibration: ingest -> fill pass -> fit pass -> concatenate -> persist
//! - inference: ingest -> load calibration -> classify -> diagnostics
//!
//! The command handlers in `app` only add printing and optional exports.

use log::info;

use crate::classify::{ClassificationEngine, Decision, DiagnosticsReport};
use crate::domain::{CalibrationConfig, InferenceConfig, ModelFile};
use crate::error::AppError;
use crate::fit::builder::{CalibrationBuilder, FillStats};
use crate::fit::calibration::{FitSummary, SpeciesCalibrationModel};
use crate::io::ingest::EventSet;

/// All computed outputs of a single calibration run.
#[derive(Debug, Clone)]
pub struct CalibrationOutput {
    pub events: EventSet,
    pub fill: FillStats,
    pub fits: Vec<FitSummary>,
    pub model: ModelFile,
    /// Persisted species models, still holding their slice histograms.
    pub models: Vec<SpeciesCalibrationModel>,
}

/// All computed outputs of a single inference run.
#[derive(Debug, Clone)]
pub struct InferenceOutput {
    pub events: EventSet,
    pub engine: ClassificationEngine,
    pub decisions: Vec<Decision>,
    pub report: DiagnosticsReport,
}

/// Run calibration and write the calibration file.
pub fn run_calibration(config: &CalibrationConfig) -> Result<CalibrationOutput, AppError> {
    config.validate()?;
    let events = crate::io::ingest::load_events(&config.filelist)?;
    let output = calibrate_events(config, events)?;
    crate::io::model_file::write_model_json(&config.output, &output.model)?;
    info!("wrote calibration to {}", config.output.display());
    Ok(output)
}

/// Calibrate already-ingested candidates without touching the output file.
pub fn calibrate_events(config: &CalibrationConfig, events: EventSet) -> Result<CalibrationOutput, AppError> {
    let mut builder = CalibrationBuilder::new(config)?;

    info!("fill pass over {} candidates", events.candidates.len());
    let fill = builder.fill(&events.candidates)?;

    info!("fit pass over {} species x {} slices", config.species.len(), config.n_slices);
    let fits = builder.fit_all()?;

    let model = builder.finish()?;
    Ok(CalibrationOutput {
        events,
        fill,
        fits,
        model,
        models: builder.into_models(),
    })
}

/// Run inference against the calibration file named in `config`.
pub fn run_inference(config: &InferenceConfig) -> Result<InferenceOutput, AppError> {
    let model = crate::io::model_file::read_model_json(&config.model)?;
    let events = crate::io::ingest::load_events(&config.filelist)?;
    classify_events(config, &model, events)
}

/// Classify already-ingested candidates against a loaded calibration.
pub fn classify_events(
    config: &InferenceConfig,
    model: &ModelFile,
    events: EventSet,
) -> Result<InferenceOutput, AppError> {
    let mut engine = ClassificationEngine::from_model_file(model, &config.species, config.purity_cut)?;

    info!("classifying {} candidates", events.candidates.len());
    let decisions = engine.classify_batch(&events.candidates);
    let report = engine.report();
    info!(
        "{} of {} candidates rejected to background",
        report.background, report.candidates
    );

    Ok(InferenceOutput {
        events,
        engine,
        decisions,
        report,
    })
}
