//! Per-species classification counters.
//!
//! Three counters are kept per species and updated independently:
//!
//! - `classified`: candidates assigned to the species
//! - `matched`: assigned to the species *and* truly a member of it
//! - `truth_total`: candidates truly belonging to the species, whatever their label
//!
//! so that `efficiency = matched / truth_total` and `purity = matched / classified`.
//! The same counters plus a background count are kept per momentum bin (the
//! calibration slices), so efficiency and purity can be read as functions of p.
//! Counters from independent workers merge by plain summation.

use serde::{Deserialize, Serialize};

use crate::classify::engine::{BackgroundReason, Label};
use crate::domain::SpeciesClass;
use crate::fit::partition::MomentumInterval;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesCounters {
    pub classified: u64,
    pub matched: u64,
    pub truth_total: u64,
}

impl SpeciesCounters {
    /// Assigned to this species but truly something else.
    pub fn mismatched(&self) -> u64 {
        self.classified - self.matched
    }

    /// `matched / truth_total`, undefined without true members.
    pub fn efficiency(&self) -> Option<f64> {
        ratio(self.matched, self.truth_total)
    }

    /// `matched / classified`, undefined when nothing was assigned.
    pub fn purity(&self) -> Option<f64> {
        ratio(self.matched, self.classified)
    }

    pub fn merge(&mut self, other: &SpeciesCounters) {
        self.classified += other.classified;
        self.matched += other.matched;
        self.truth_total += other.truth_total;
    }
}

fn ratio(num: u64, den: u64) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}

/// Counters of one momentum bin.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MomentumBinCounters {
    /// One entry per species, in engine order.
    pub species: Vec<SpeciesCounters>,
    pub candidates: u64,
    pub background: u64,
}

impl MomentumBinCounters {
    fn new(n_species: usize) -> Self {
        Self {
            species: vec![SpeciesCounters::default(); n_species],
            ..Self::default()
        }
    }

    fn merge(&mut self, other: &MomentumBinCounters) {
        merge_counters(&mut self.species, &other.species);
        self.candidates += other.candidates;
        self.background += other.background;
    }
}

fn merge_counters(into: &mut Vec<SpeciesCounters>, from: &[SpeciesCounters]) {
    if into.len() < from.len() {
        into.resize(from.len(), SpeciesCounters::default());
    }
    for (a, b) in into.iter_mut().zip(from.iter()) {
        a.merge(b);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    /// One entry per species, in engine order.
    pub species: Vec<SpeciesCounters>,
    /// One entry per momentum bin, in momentum order.
    pub momentum: Vec<MomentumBinCounters>,
    pub candidates: u64,
    /// Candidates rejected to background, for any reason.
    pub background: u64,
    /// Background candidates where every species density was (near) zero.
    pub background_unstable: u64,
    /// Candidates whose true code belongs to no species class.
    pub unknown_truth: u64,
}

impl Diagnostics {
    pub fn new(n_species: usize, n_bins: usize) -> Self {
        Self {
            species: vec![SpeciesCounters::default(); n_species],
            momentum: vec![MomentumBinCounters::new(n_species); n_bins],
            ..Self::default()
        }
    }

    /// Book one classified candidate.
    ///
    /// `bin` is the momentum bin holding the candidate (`None` outside every
    /// bin) and `truth` the index of the species it truly belongs to, if any.
    pub fn record(
        &mut self,
        bin: Option<usize>,
        truth: Option<usize>,
        label: Label,
        reason: Option<BackgroundReason>,
    ) {
        self.candidates += 1;
        if truth.is_none() {
            self.unknown_truth += 1;
        }
        if label == Label::Background {
            self.background += 1;
            if reason == Some(BackgroundReason::DivisionUnstable) {
                self.background_unstable += 1;
            }
        }
        book(&mut self.species, truth, label);

        if let Some(bin) = bin.and_then(|b| self.momentum.get_mut(b)) {
            bin.candidates += 1;
            if label == Label::Background {
                bin.background += 1;
            }
            book(&mut bin.species, truth, label);
        }
    }

    pub fn merge(&mut self, other: &Diagnostics) {
        merge_counters(&mut self.species, &other.species);
        if self.momentum.len() < other.momentum.len() {
            self.momentum.resize(other.momentum.len(), MomentumBinCounters::default());
        }
        for (a, b) in self.momentum.iter_mut().zip(other.momentum.iter()) {
            a.merge(b);
        }
        self.candidates += other.candidates;
        self.background += other.background;
        self.background_unstable += other.background_unstable;
        self.unknown_truth += other.unknown_truth;
    }

    /// Serializable summary with derived efficiency/purity per species, overall
    /// and per momentum bin. `bins` are the intervals of `self.momentum`.
    pub fn report(&self, classes: &[SpeciesClass], bins: &[MomentumInterval], purity_cut: f64) -> DiagnosticsReport {
        let momentum_bins = bins
            .iter()
            .zip(self.momentum.iter())
            .map(|(interval, counters)| MomentumBinReport {
                p_lo: interval.lo(),
                p_hi: interval.hi(),
                candidates: counters.candidates,
                background: counters.background,
                species: species_reports(classes, &counters.species),
            })
            .collect();

        DiagnosticsReport {
            purity_cut,
            candidates: self.candidates,
            background: self.background,
            background_unstable: self.background_unstable,
            unknown_truth: self.unknown_truth,
            species: species_reports(classes, &self.species),
            momentum_bins,
        }
    }
}

fn book(counters: &mut [SpeciesCounters], truth: Option<usize>, label: Label) {
    if let Some(t) = truth {
        counters[t].truth_total += 1;
    }
    if let Label::Species(idx) = label {
        counters[idx].classified += 1;
        if truth == Some(idx) {
            counters[idx].matched += 1;
        }
    }
}

fn species_reports(classes: &[SpeciesClass], counters: &[SpeciesCounters]) -> Vec<SpeciesReport> {
    classes
        .iter()
        .zip(counters.iter())
        .map(|(class, c)| SpeciesReport {
            name: class.name.clone(),
            key: class.key(),
            truth_total: c.truth_total,
            classified: c.classified,
            matched: c.matched,
            mismatched: c.mismatched(),
            efficiency: c.efficiency(),
            purity: c.purity(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesReport {
    pub name: String,
    pub key: String,
    pub truth_total: u64,
    pub classified: u64,
    pub matched: u64,
    pub mismatched: u64,
    pub efficiency: Option<f64>,
    pub purity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    pub purity_cut: f64,
    pub candidates: u64,
    pub background: u64,
    pub background_unstable: u64,
    pub unknown_truth: u64,
    pub species: Vec<SpeciesReport>,
    pub momentum_bins: Vec<MomentumBinReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumBinReport {
    pub p_lo: f64,
    pub p_hi: f64,
    pub candidates: u64,
    pub background: u64,
    pub species: Vec<SpeciesReport>,
}
