//! Species classes and the particle-code catalogue.
//!
//! A species class groups one or more particle codes that a single calibration
//! model treats as interchangeable (e.g. muons, pions and positrons are all
//! "pion-like" at time-of-flight resolution).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Label code reported for candidates rejected to background.
pub const BACKGROUND_CODE: i32 = 0;

pub const PDG_PROTON: i32 = 2212;
pub const PDG_KAON: i32 = 321;
pub const PDG_PION: i32 = 211;
pub const PDG_MUON: i32 = 13;
pub const PDG_ELECTRON: i32 = 11;

/// Human-readable name for a particle code.
pub fn particle_name(code: i32) -> String {
    match code {
        2212 => "p".to_string(),
        321 => "K+".to_string(),
        211 => "pi+".to_string(),
        -13 | 13 => "mu+".to_string(),
        -11 | 11 => "e+".to_string(),
        other => other.to_string(),
    }
}

/// A named set of interchangeable particle codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesClass {
    pub name: String,
    pub codes: Vec<i32>,
}

impl SpeciesClass {
    pub fn new(name: impl Into<String>, codes: Vec<i32>) -> Self {
        Self {
            name: name.into(),
            codes,
        }
    }

    /// Identifier used as the persisted entry key: codes joined with `_`.
    pub fn key(&self) -> String {
        self.codes
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join("_")
    }

    pub fn contains(&self, code: i32) -> bool {
        self.codes.contains(&code)
    }

    /// Particle names of all member codes, e.g. `mu+, pi+, e+`.
    pub fn members_label(&self) -> String {
        self.codes
            .iter()
            .map(|&c| particle_name(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The three classes the detector calibration is normally run with.
    pub fn defaults() -> Vec<SpeciesClass> {
        vec![
            SpeciesClass::new("protons", vec![PDG_PROTON]),
            SpeciesClass::new("kaons", vec![PDG_KAON]),
            SpeciesClass::new("pions", vec![PDG_MUON, PDG_PION, PDG_ELECTRON]),
        ]
    }
}

impl fmt::Display for SpeciesClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.key())
    }
}

/// Parses `name=code,code,...` (e.g. `pions=13,211,11`).
impl FromStr for SpeciesClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, codes) = s
            .split_once('=')
            .ok_or_else(|| format!("expected `name=code,code,...`, got `{s}`"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("species name is empty in `{s}`"));
        }

        let mut parsed = Vec::new();
        for part in codes.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let code: i32 = part
                .parse()
                .map_err(|_| format!("invalid particle code `{part}` in `{s}`"))?;
            if code == BACKGROUND_CODE {
                return Err(format!("code {BACKGROUND_CODE} is reserved for background"));
            }
            if !parsed.contains(&code) {
                parsed.push(code);
            }
        }
        if parsed.is_empty() {
            return Err(format!("species `{name}` has no particle codes"));
        }

        Ok(SpeciesClass::new(name, parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_species_class() {
        let class: SpeciesClass = "pions=13, 211,11".parse().unwrap();
        assert_eq!(class.name, "pions");
        assert_eq!(class.codes, vec![13, 211, 11]);
        assert_eq!(class.key(), "13_211_11");
        assert!(class.contains(211));
        assert!(!class.contains(2212));
    }

    #[test]
    fn parse_rejects_background_code_and_empty_sets() {
        assert!("bg=0".parse::<SpeciesClass>().is_err());
        assert!("kaons=".parse::<SpeciesClass>().is_err());
        assert!("321".parse::<SpeciesClass>().is_err());
    }

    #[test]
    fn default_classes_are_disjoint() {
        let classes = SpeciesClass::defaults();
        for (i, a) in classes.iter().enumerate() {
            for b in &classes[i + 1..] {
                assert!(a.codes.iter().all(|c| !b.contains(*c)));
            }
        }
    }
}
