//! Synthetic candidate generation for time-of-flight identification.
//!
//! Each candidate is drawn as:
//! - species from fixed abundance fractions
//! - momentum uniform in `[p_min, p_max]`
//! - `m²` Gaussian around the species' true mass squared, with a resolution that
//!   widens with momentum: `σ(p) = σ₀ + k·p²`

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Candidate, PDG_ELECTRON, PDG_KAON, PDG_MUON, PDG_PION, PDG_PROTON};
use crate::error::PidError;

/// Deuterons: present in real data but outside the default species classes.
pub const PDG_DEUTERON: i32 = 1000010020;

/// `m²` resolution at zero momentum (GeV²/c⁴).
const SIGMA_M2_0: f64 = 0.01;
/// Quadratic growth of the `m²` resolution with momentum.
const SIGMA_M2_K: f64 = 0.008;

/// `(code, true m², abundance)`. Abundances sum to one.
const SPECIES_TABLE: [(i32, f64, f64); 6] = [
    (PDG_PION, 0.019_479, 0.52),
    (PDG_PROTON, 0.880_354, 0.22),
    (PDG_KAON, 0.243_717, 0.12),
    (PDG_ELECTRON, 2.6e-7, 0.06),
    (PDG_MUON, 0.011_164, 0.05),
    (PDG_DEUTERON, 3.517_6, 0.03),
];

#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub n_candidates: usize,
    pub seed: u64,
    pub p_min: f64,
    pub p_max: f64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            n_candidates: 200_000,
            seed: 42,
            p_min: 0.0,
            p_max: 6.0,
        }
    }
}

/// True mass squared of a generated species, if known to the generator.
pub fn true_mass2(code: i32) -> Option<f64> {
    SPECIES_TABLE
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|(_, m2, _)| *m2)
}

/// Detector `m²` resolution at momentum `p`.
pub fn m2_resolution(p: f64) -> f64 {
    SIGMA_M2_0 + SIGMA_M2_K * p * p
}

pub fn generate_candidates(config: &SampleConfig) -> Result<Vec<Candidate>, PidError> {
    if config.n_candidates == 0 {
        return Err(PidError::InvalidConfig("candidate count must be > 0".into()));
    }
    if !(config.p_min.is_finite() && config.p_max.is_finite()) || config.p_min >= config.p_max {
        return Err(PidError::MalformedRange {
            p_min: config.p_min,
            p_max: config.p_max,
        });
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let unit = Normal::new(0.0, 1.0)
        .map_err(|e| PidError::InvalidConfig(format!("noise distribution error: {e}")))?;

    let mut out = Vec::with_capacity(config.n_candidates);
    for _ in 0..config.n_candidates {
        let (code, mass2) = pick_species(&mut rng);
        let p = rng.gen_range(config.p_min..=config.p_max);
        let m2 = mass2 + m2_resolution(p) * unit.sample(&mut rng);
        out.push(Candidate {
            p,
            m2,
            true_code: code,
        });
    }

    Ok(out)
}

fn pick_species(rng: &mut StdRng) -> (i32, f64) {
    let roll: f64 = rng.r#gen();
    let mut cumulative = 0.0;
    for &(code, mass2, fraction) in &SPECIES_TABLE {
        cumulative += fraction;
        if roll < cumulative {
            return (code, mass2);
        }
    }
    let (code, mass2, _) = SPECIES_TABLE[SPECIES_TABLE.len() - 1];
    (code, mass2)
}
