//! Calibration driver: one fill pass over labelled candidates for all species,
//! one fit pass, then concatenation into the persisted model file.
//!
//! The fill pass is parallel: every rayon worker owns a private set of
//! [`SliceAccumulator`]s (one per species) over a disjoint subset of the
//! candidates, and the sets are merged by elementwise sum before any fit runs.

use chrono::Utc;
use log::{error, info};
use rayon::prelude::*;

use crate::domain::{CalibrationConfig, Candidate, ModelFile, validate_species};
use crate::error::PidError;
use crate::fit::calibration::{FitSummary, SliceAccumulator, SpeciesCalibrationModel};
use crate::fit::gauss_fit::MIN_NONZERO_BINS;

pub const TOOL_NAME: &str = "tofpid";

/// Routing counts of the fill pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FillStats {
    pub candidates: usize,
    /// Candidates routed to each species, in model order.
    pub routed: Vec<usize>,
    /// Candidates whose true code belongs to no species class.
    pub unrouted: usize,
}

#[derive(Debug, Clone)]
pub struct CalibrationBuilder {
    models: Vec<SpeciesCalibrationModel>,
    p_min: f64,
    p_max: f64,
    n_slices: usize,
}

#[derive(Clone)]
struct WorkerState {
    accumulators: Vec<SliceAccumulator>,
    routed: Vec<usize>,
    unrouted: usize,
}

impl WorkerState {
    fn merge(mut self, other: WorkerState) -> Result<WorkerState, PidError> {
        self.accumulators = self
            .accumulators
            .into_iter()
            .zip(other.accumulators.iter())
            .map(|(a, b)| a.merge(b))
            .collect::<Result<Vec<_>, _>>()?;
        for (a, b) in self.routed.iter_mut().zip(other.routed.iter()) {
            *a += *b;
        }
        self.unrouted += other.unrouted;
        Ok(self)
    }
}

impl CalibrationBuilder {
    pub fn new(config: &CalibrationConfig) -> Result<Self, PidError> {
        config.validate()?;
        let models = config
            .species
            .iter()
            .map(|class| {
                SpeciesCalibrationModel::new(
                    class.clone(),
                    config.p_min,
                    config.p_max,
                    config.n_slices,
                    config.m2_axis,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            models,
            p_min: config.p_min,
            p_max: config.p_max,
            n_slices: config.n_slices,
        })
    }

    /// Build from already constructed models (all must share one partition).
    pub fn from_models(models: Vec<SpeciesCalibrationModel>) -> Result<Self, PidError> {
        let first = models
            .first()
            .ok_or_else(|| PidError::InvalidConfig("at least one species model is required".into()))?;
        let (p_min, p_max) = first.p_range();
        let n_slices = first.slices().len();
        if models
            .iter()
            .any(|m| m.p_range() != (p_min, p_max) || m.slices().len() != n_slices)
        {
            return Err(PidError::InvalidConfig("species models use different momentum partitions".into()));
        }
        let classes: Vec<_> = models.iter().map(|m| m.class().clone()).collect();
        validate_species(&classes)?;
        Ok(Self {
            models,
            p_min,
            p_max,
            n_slices,
        })
    }

    pub fn models(&self) -> &[SpeciesCalibrationModel] {
        &self.models
    }

    pub fn into_models(self) -> Vec<SpeciesCalibrationModel> {
        self.models
    }

    /// Route every candidate to the model(s) whose class contains its true code.
    pub fn fill(&mut self, candidates: &[Candidate]) -> Result<FillStats, PidError> {
        let init = || WorkerState {
            accumulators: self.models.iter().map(|m| m.accumulator()).collect(),
            routed: vec![0; self.models.len()],
            unrouted: 0,
        };

        let merged = candidates
            .par_iter()
            .try_fold(init, |mut state, c| {
                let mut hit = false;
                for (idx, model) in self.models.iter().enumerate() {
                    if model.class().contains(c.true_code) {
                        state.accumulators[idx].fill(c.p, c.m2);
                        state.routed[idx] += 1;
                        hit = true;
                    }
                }
                if !hit {
                    state.unrouted += 1;
                }
                Ok::<_, PidError>(state)
            })
            .try_reduce(init, WorkerState::merge)?;

        for (model, acc) in self.models.iter_mut().zip(merged.accumulators.iter()) {
            model.absorb(acc)?;
        }

        let stats = FillStats {
            candidates: candidates.len(),
            routed: merged.routed,
            unrouted: merged.unrouted,
        };
        info!(
            "filled {} candidates ({} outside every species class)",
            stats.candidates, stats.unrouted
        );
        Ok(stats)
    }

    /// Fit every slice of every model.
    ///
    /// A species that received no candidates, or whose slices all degraded,
    /// fails the whole calibration with `InsufficientData`.
    pub fn fit_all(&mut self) -> Result<Vec<FitSummary>, PidError> {
        if let Some(model) = self.models.iter().find(|m| !m.has_fills()) {
            error!("{}: no candidates in any momentum slice", model.class().name);
            return Err(PidError::InsufficientData {
                nonzero_bins: 0,
                required: MIN_NONZERO_BINS,
            });
        }

        let mut summaries = Vec::with_capacity(self.models.len());
        for model in &mut self.models {
            let summary = model.fit_all()?;
            info!(
                "{}: {} slices fitted, {} degraded",
                model.class().name,
                summary.fitted,
                summary.degraded.len()
            );
            if summary.fitted == 0 {
                error!("{}: every momentum slice degraded", model.class().name);
                return Err(no_fitted_slices(model));
            }
            summaries.push(summary);
        }
        Ok(summaries)
    }

    /// Concatenate and persist every model into a model file.
    ///
    /// Refuses to write a model in which some species has no fitted slice.
    pub fn finish(&mut self) -> Result<ModelFile, PidError> {
        if let Some(model) = self.models.iter().find(|m| !m.slices().iter().any(|s| s.is_fitted())) {
            error!("{}: no fitted momentum slice to persist", model.class().name);
            return Err(no_fitted_slices(model));
        }

        let mut species = Vec::with_capacity(self.models.len());
        for model in &mut self.models {
            model.build_density_function()?;
            species.push(model.persist()?);
        }

        let m2_axis = *self
            .models
            .first()
            .map(|m| m.m2_axis())
            .ok_or_else(|| PidError::InvalidConfig("no species models to persist".into()))?;

        Ok(ModelFile {
            tool: TOOL_NAME.to_string(),
            created: Utc::now(),
            p_min: self.p_min,
            p_max: self.p_max,
            n_slices: self.n_slices,
            m2_axis,
            species,
        })
    }
}

fn no_fitted_slices(model: &SpeciesCalibrationModel) -> PidError {
    let nonzero_bins = model
        .slices()
        .iter()
        .map(|s| s.histogram().nonzero_bins())
        .max()
        .unwrap_or(0);
    PidError::InsufficientData {
        nonzero_bins,
        required: MIN_NONZERO_BINS,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::data::sample::{SampleConfig, generate_candidates};
    use crate::domain::{AxisRange, CalibrationState, SpeciesClass};

    fn config(n_slices: usize) -> CalibrationConfig {
        CalibrationConfig {
            filelist: PathBuf::from("filelist.txt"),
            output: PathBuf::from("model.json"),
            p_min: 0.5,
            p_max: 4.5,
            n_slices,
            m2_axis: AxisRange::default(),
            species: SpeciesClass::defaults(),
        }
    }

    fn events() -> Vec<Candidate> {
        generate_candidates(&SampleConfig {
            n_candidates: 60_000,
            seed: 3,
            p_min: 0.5,
            p_max: 4.5,
        })
        .unwrap()
    }

    #[test]
    fn parallel_fill_matches_per_model_sequential_fill() {
        let evts = events();
        let mut builder = CalibrationBuilder::new(&config(8)).unwrap();
        let stats = builder.fill(&evts).unwrap();
        assert_eq!(stats.candidates, evts.len());
        assert_eq!(stats.routed.iter().sum::<usize>() + stats.unrouted, evts.len());

        for model in builder.models() {
            let mut sequential = SpeciesCalibrationModel::new(
                model.class().clone(),
                0.5,
                4.5,
                8,
                AxisRange::default(),
            )
            .unwrap();
            sequential.fill_from_events(&evts).unwrap();
            for (a, b) in model.slices().iter().zip(sequential.slices()) {
                assert_eq!(a.histogram(), b.histogram());
            }
        }
    }

    #[test]
    fn finish_produces_one_entry_per_species() {
        let mut builder = CalibrationBuilder::new(&config(8)).unwrap();
        builder.fill(&events()).unwrap();
        let summaries = builder.fit_all().unwrap();
        assert_eq!(summaries.len(), 3);
        assert!(summaries.iter().all(|s| s.fitted == 8));

        let file = builder.finish().unwrap();
        assert_eq!(file.tool, TOOL_NAME);
        assert_eq!(file.n_slices, 8);
        let keys: Vec<&str> = file.species.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["2212", "321", "13_211_11"]);
        assert!(builder.models().iter().all(|m| m.state() == CalibrationState::Persisted));

        let kaons = file.find("321").unwrap();
        let mid = &kaons.slices[3];
        assert!((mid.mean - 0.2437).abs() < 0.02, "kaon mean {}", mid.mean);
    }

    #[test]
    fn species_without_candidates_fails_calibration() {
        let mut with_ghost = config(8);
        with_ghost.species.push(SpeciesClass::new("ghost", vec![99999]));
        let evts = generate_candidates(&SampleConfig {
            n_candidates: 20_000,
            seed: 9,
            p_min: 0.5,
            p_max: 4.5,
        })
        .unwrap();

        let mut builder = CalibrationBuilder::new(&with_ghost).unwrap();
        let stats = builder.fill(&evts).unwrap();
        assert_eq!(stats.routed[3], 0);
        assert_eq!(builder.models()[3].state(), CalibrationState::Unfilled);

        let err = builder.fit_all().unwrap_err();
        assert!(matches!(err, PidError::InsufficientData { nonzero_bins: 0, .. }));
        assert_eq!(crate::error::AppError::from(err).exit_code(), 3);
        assert!(matches!(builder.finish(), Err(PidError::InsufficientData { .. })));
    }

    #[test]
    fn species_with_only_degraded_slices_fails_calibration() {
        // Every kaon sits at one m2 value, so no slice has three populated bins.
        let mut only_kaons = config(4);
        only_kaons.species = vec![SpeciesClass::new("kaons", vec![321])];
        let evts: Vec<Candidate> = (0..400)
            .map(|i| Candidate {
                p: 0.6 + 3.8 * (i as f64) / 400.0,
                m2: 0.2437,
                true_code: 321,
            })
            .collect();

        let mut builder = CalibrationBuilder::new(&only_kaons).unwrap();
        builder.fill(&evts).unwrap();
        let err = builder.fit_all().unwrap_err();
        assert!(matches!(err, PidError::InsufficientData { nonzero_bins: 1, .. }));
        assert!(matches!(builder.finish(), Err(PidError::InsufficientData { .. })));
    }

    #[test]
    fn invalid_configuration_fails_construction() {
        let mut bad = config(8);
        bad.p_max = bad.p_min;
        assert!(matches!(CalibrationBuilder::new(&bad), Err(PidError::MalformedRange { .. })));
    }
}
