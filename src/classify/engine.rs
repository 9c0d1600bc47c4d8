//! Classification engine.
//!
//! Every species density is evaluated at `(p, m²)`; the highest score wins if its
//! share of the summed scores exceeds the purity cut, otherwise the candidate is
//! rejected to background.
//!
//! Tie-break: on exactly equal top scores the species that comes first in engine
//! order wins (engine order is the configured species order).

use log::info;
use rayon::prelude::*;

use crate::classify::diagnostics::{Diagnostics, DiagnosticsReport};
use crate::domain::{BACKGROUND_CODE, Candidate, ModelFile, SpeciesClass, validate_species};
use crate::error::PidError;
use crate::fit::density::CalibrationDensityFunction;
use crate::fit::partition::MomentumInterval;

/// Score sums at or below this are treated as zero.
pub const MIN_TOTAL_SCORE: f64 = 1e-12;

/// Assigned label of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    /// Index of the species in engine order.
    Species(usize),
    Background,
}

/// Why a candidate went to background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackgroundReason {
    /// Every species scored (near) zero; no confidence can be formed.
    DivisionUnstable,
    /// The best species' confidence did not exceed the purity cut.
    BelowPurityCut,
}

/// Full outcome of evaluating one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub scores: Vec<f64>,
    pub best: Option<usize>,
    /// `best score / total`, zero when the total is (near) zero.
    pub confidence: f64,
    pub label: Label,
    pub reason: Option<BackgroundReason>,
}

#[derive(Debug, Clone)]
pub struct SpeciesDensity {
    pub class: SpeciesClass,
    pub density: CalibrationDensityFunction,
}

#[derive(Debug, Clone)]
pub struct ClassificationEngine {
    species: Vec<SpeciesDensity>,
    purity_cut: f64,
    /// Momentum bins of the diagnostics: the slices of the first species.
    momentum_bins: Vec<MomentumInterval>,
    diagnostics: Diagnostics,
}

impl ClassificationEngine {
    pub fn new(species: Vec<SpeciesDensity>, purity_cut: f64) -> Result<Self, PidError> {
        if !(purity_cut > 0.0 && purity_cut <= 1.0) {
            return Err(PidError::PurityOutOfRange(purity_cut));
        }
        let classes: Vec<SpeciesClass> = species.iter().map(|s| s.class.clone()).collect();
        validate_species(&classes)?;

        let momentum_bins: Vec<MomentumInterval> = species
            .first()
            .map(|s| s.density.slices().iter().map(|slice| slice.interval).collect())
            .unwrap_or_default();
        let diagnostics = Diagnostics::new(species.len(), momentum_bins.len());
        Ok(Self {
            species,
            purity_cut,
            momentum_bins,
            diagnostics,
        })
    }

    /// Load every configured species from a persisted model file.
    ///
    /// A missing species is fatal: the engine never runs on a partial model.
    pub fn from_model_file(file: &ModelFile, classes: &[SpeciesClass], purity_cut: f64) -> Result<Self, PidError> {
        let mut species = Vec::with_capacity(classes.len());
        for class in classes {
            let key = class.key();
            let entry = file.find(&key).ok_or(PidError::ModelNotFound(key))?;
            species.push(SpeciesDensity {
                class: class.clone(),
                density: CalibrationDensityFunction::from_entry(entry)?,
            });
        }
        let engine = Self::new(species, purity_cut)?;
        info!(
            "loaded {} species models (purity cut {})",
            engine.species.len(),
            engine.purity_cut
        );
        Ok(engine)
    }

    pub fn species(&self) -> &[SpeciesDensity] {
        &self.species
    }

    pub fn classes(&self) -> Vec<SpeciesClass> {
        self.species.iter().map(|s| s.class.clone()).collect()
    }

    pub fn purity_cut(&self) -> f64 {
        self.purity_cut
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn momentum_bins(&self) -> &[MomentumInterval] {
        &self.momentum_bins
    }

    /// Index of the diagnostics momentum bin holding `p`.
    pub fn momentum_bin(&self, p: f64) -> Option<usize> {
        self.momentum_bins.iter().position(|b| b.contains(p))
    }

    /// Summary of everything classified so far.
    pub fn report(&self) -> DiagnosticsReport {
        self.diagnostics
            .report(&self.classes(), &self.momentum_bins, self.purity_cut)
    }

    /// Species index whose class contains `code`.
    pub fn truth_index(&self, code: i32) -> Option<usize> {
        self.species.iter().position(|s| s.class.contains(code))
    }

    /// Particle codes of a label; background is the single reserved code.
    pub fn label_codes(&self, label: Label) -> &[i32] {
        match label {
            Label::Species(idx) => &self.species[idx].class.codes,
            Label::Background => &[BACKGROUND_CODE],
        }
    }

    pub fn label_name(&self, label: Label) -> &str {
        match label {
            Label::Species(idx) => &self.species[idx].class.name,
            Label::Background => "background",
        }
    }

    /// Score all species and apply the purity cut. Does not touch diagnostics.
    pub fn evaluate(&self, p: f64, m2: f64) -> Decision {
        let scores: Vec<f64> = self
            .species
            .iter()
            .map(|s| {
                let v = s.density.eval(p, m2);
                if v.is_finite() && v > 0.0 { v } else { 0.0 }
            })
            .collect();

        let mut best: Option<usize> = None;
        for (idx, &score) in scores.iter().enumerate() {
            match best {
                Some(b) if score <= scores[b] => {}
                _ => best = Some(idx),
            }
        }
        let total: f64 = scores.iter().sum();

        let Some(best_idx) = best.filter(|_| total > MIN_TOTAL_SCORE) else {
            return Decision {
                scores,
                best,
                confidence: 0.0,
                label: Label::Background,
                reason: Some(BackgroundReason::DivisionUnstable),
            };
        };

        let confidence = scores[best_idx] / total;
        let (label, reason) = if confidence > self.purity_cut {
            (Label::Species(best_idx), None)
        } else {
            (Label::Background, Some(BackgroundReason::BelowPurityCut))
        };

        Decision {
            scores,
            best,
            confidence,
            label,
            reason,
        }
    }

    /// Classify one candidate and book it in the diagnostics.
    pub fn classify(&mut self, p: f64, m2: f64, true_code: i32) -> Label {
        let decision = self.evaluate(p, m2);
        let truth = self.truth_index(true_code);
        let bin = self.momentum_bin(p);
        self.diagnostics.record(bin, truth, decision.label, decision.reason);
        decision.label
    }

    /// Classify many candidates in parallel, returning labels in input order.
    ///
    /// Workers count into private diagnostics that are summed afterwards.
    pub fn classify_batch(&mut self, candidates: &[Candidate]) -> Vec<Decision> {
        let n_species = self.species.len();
        let n_bins = self.momentum_bins.len();
        let engine = &*self;

        let decisions: Vec<Decision> = candidates
            .par_iter()
            .map(|c| engine.evaluate(c.p, c.m2))
            .collect();

        let batch = candidates
            .par_iter()
            .zip(decisions.par_iter())
            .fold(
                || Diagnostics::new(n_species, n_bins),
                |mut d, (c, decision)| {
                    d.record(
                        engine.momentum_bin(c.p),
                        engine.truth_index(c.true_code),
                        decision.label,
                        decision.reason,
                    );
                    d
                },
            )
            .reduce(
                || Diagnostics::new(n_species, n_bins),
                |mut a, b| {
                    a.merge(&b);
                    a
                },
            );

        self.diagnostics.merge(&batch);
        decisions
    }
}
