//! Per-species calibration model.
//!
//! A model owns an ordered, gap-free sequence of momentum slices for one species
//! class and walks a strictly forward lifecycle:
//!
//! `Unfilled → Filled → Fitted → Concatenated → Persisted`
//!
//! Any call that would re-enter an earlier state is rejected with
//! `PidError::InvalidTransition`.

use log::{debug, warn};
use rayon::prelude::*;

use crate::domain::{AxisRange, CalibrationState, Candidate, SpeciesClass, SpeciesEntry};
use crate::error::PidError;
use crate::fit::density::{CalibrationDensityFunction, DensitySlice};
use crate::fit::partition::{MomentumInterval, partition};
use crate::fit::slice::MomentumSlice;
use crate::hist::Histogram1D;

/// Private per-slice counters for one worker.
///
/// Filling is commutative and associative, so accumulators built over disjoint
/// candidate subsets merge by elementwise sum into the same result as a single
/// sequential fill.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceAccumulator {
    intervals: Vec<MomentumInterval>,
    hists: Vec<Histogram1D>,
}

impl SliceAccumulator {
    /// Offer `(p, m2)` to every slice; each applies its own membership test.
    pub fn fill(&mut self, p: f64, m2: f64) {
        for (interval, hist) in self.intervals.iter().zip(self.hists.iter_mut()) {
            if interval.contains(p) {
                hist.fill(m2);
            }
        }
    }

    /// Sum `other` into this accumulator. Both must cover the same slices.
    pub fn merge(mut self, other: &SliceAccumulator) -> Result<Self, PidError> {
        if self.intervals != other.intervals {
            return Err(PidError::InvalidConfig(
                "cannot merge accumulators over different momentum partitions".into(),
            ));
        }
        for (a, b) in self.hists.iter_mut().zip(other.hists.iter()) {
            a.merge(b)?;
        }
        Ok(self)
    }

    pub fn histograms(&self) -> &[Histogram1D] {
        &self.hists
    }
}

/// Per-model outcome of the fit pass.
#[derive(Debug, Clone, Default)]
pub struct FitSummary {
    pub fitted: usize,
    /// `(slice index, reason)` of every degraded slice.
    pub degraded: Vec<(usize, PidError)>,
}

#[derive(Debug, Clone)]
pub struct SpeciesCalibrationModel {
    class: SpeciesClass,
    p_min: f64,
    p_max: f64,
    m2_axis: AxisRange,
    slices: Vec<MomentumSlice>,
    state: CalibrationState,
    density: Option<CalibrationDensityFunction>,
}

impl SpeciesCalibrationModel {
    pub fn new(
        class: SpeciesClass,
        p_min: f64,
        p_max: f64,
        n_slices: usize,
        m2_axis: AxisRange,
    ) -> Result<Self, PidError> {
        if class.codes.is_empty() {
            return Err(PidError::InvalidConfig(format!("species '{}' has no codes", class.name)));
        }
        let slices = partition(p_min, p_max, n_slices)?
            .into_iter()
            .map(|interval| MomentumSlice::new(interval, &m2_axis))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            class,
            p_min,
            p_max,
            m2_axis,
            slices,
            state: CalibrationState::Unfilled,
            density: None,
        })
    }

    pub fn class(&self) -> &SpeciesClass {
        &self.class
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn slices(&self) -> &[MomentumSlice] {
        &self.slices
    }

    pub fn p_range(&self) -> (f64, f64) {
        (self.p_min, self.p_max)
    }

    pub fn m2_axis(&self) -> &AxisRange {
        &self.m2_axis
    }

    pub fn density(&self) -> Option<&CalibrationDensityFunction> {
        self.density.as_ref()
    }

    fn advance(&mut self, allowed_from: &[CalibrationState], to: CalibrationState) -> Result<(), PidError> {
        if allowed_from.contains(&self.state) {
            self.state = to;
            Ok(())
        } else {
            Err(PidError::InvalidTransition { from: self.state, to })
        }
    }

    /// `Unfilled → Filled` once any slice has received a candidate. A fill that
    /// reached no slice leaves the state unchanged.
    fn mark_filled(&mut self) {
        if self.has_fills() {
            self.state = CalibrationState::Filled;
        }
    }

    /// Whether any slice histogram has received a candidate.
    pub fn has_fills(&self) -> bool {
        self.slices.iter().any(|s| s.histogram().total_fills() > 0)
    }

    fn ensure_fillable(&self) -> Result<(), PidError> {
        match self.state {
            CalibrationState::Unfilled | CalibrationState::Filled => Ok(()),
            from => Err(PidError::InvalidTransition {
                from,
                to: CalibrationState::Filled,
            }),
        }
    }

    /// Fill from a stream of candidates, keeping those whose true code belongs
    /// to this species. Returns how many candidates were forwarded.
    ///
    /// The model stays `Unfilled` until some candidate lands in a slice.
    pub fn fill_from_events<'a, I>(&mut self, candidates: I) -> Result<usize, PidError>
    where
        I: IntoIterator<Item = &'a Candidate>,
    {
        self.ensure_fillable()?;
        let mut forwarded = 0;
        for c in candidates {
            if !self.class.contains(c.true_code) {
                continue;
            }
            forwarded += 1;
            for slice in &mut self.slices {
                slice.fill_hist(c.p, c.m2)?;
            }
        }
        self.mark_filled();
        Ok(forwarded)
    }

    /// Empty accumulator matching this model's slices.
    pub fn accumulator(&self) -> SliceAccumulator {
        SliceAccumulator {
            intervals: self.slices.iter().map(|s| *s.interval()).collect(),
            hists: self
                .slices
                .iter()
                .map(|s| Histogram1D::new(&s.histogram().axis()))
                .collect(),
        }
    }

    /// Merge a worker accumulator into the slice histograms.
    ///
    /// The accumulator must have been built over this model's partition and m²
    /// axis; otherwise nothing is merged and `InvalidConfig` is returned.
    pub fn absorb(&mut self, acc: &SliceAccumulator) -> Result<(), PidError> {
        self.ensure_fillable()?;
        if acc.hists.len() != self.slices.len() || acc.intervals.len() != self.slices.len() {
            return Err(PidError::InvalidConfig(format!(
                "accumulator has {} slices, model '{}' has {}",
                acc.hists.len(),
                self.class.name,
                self.slices.len()
            )));
        }
        let layout = self.slices.iter().zip(acc.intervals.iter().zip(acc.hists.iter()));
        for (idx, (slice, (interval, hist))) in layout.enumerate() {
            if interval != slice.interval() {
                return Err(PidError::InvalidConfig(format!(
                    "accumulator slice {idx} covers ({:.3}, {:.3}], model '{}' slice covers ({:.3}, {:.3}]",
                    interval.lo(),
                    interval.hi(),
                    self.class.name,
                    slice.interval().lo(),
                    slice.interval().hi()
                )));
            }
            if hist.axis() != slice.histogram().axis() {
                return Err(PidError::InvalidConfig(format!(
                    "accumulator slice {idx} uses a different m2 axis than model '{}'",
                    self.class.name
                )));
            }
        }
        for (slice, hist) in self.slices.iter_mut().zip(acc.hists.iter()) {
            slice.absorb(hist)?;
        }
        self.mark_filled();
        Ok(())
    }

    /// Fit every slice independently (in parallel).
    ///
    /// Slices that cannot be fitted are degraded and reported in the summary;
    /// they never abort the model.
    pub fn fit_all(&mut self) -> Result<FitSummary, PidError> {
        self.advance(&[CalibrationState::Filled], CalibrationState::Fitted)?;

        let outcomes: Vec<Result<(), PidError>> = self
            .slices
            .par_iter_mut()
            .map(|slice| slice.fit().map(|_| ()))
            .collect();

        let mut summary = FitSummary::default();
        for (idx, outcome) in outcomes.into_iter().enumerate() {
            let interval = self.slices[idx].interval();
            match outcome {
                Ok(()) => {
                    summary.fitted += 1;
                    if let (Some(g), Some(q)) = (self.slices[idx].params(), self.slices[idx].quality()) {
                        debug!(
                            "{} slice ({:.3}, {:.3}]: A={:.2} mean={:.4} sigma={:.4} chi2/ndf={:.3} iter={}",
                            self.class.name,
                            interval.lo(),
                            interval.hi(),
                            g.amplitude,
                            g.mean,
                            g.sigma,
                            q.chi2_per_ndf(),
                            q.iterations
                        );
                    }
                }
                Err(err) if err.is_local_fit_failure() => {
                    warn!(
                        "{} slice ({:.3}, {:.3}] degraded: {err}",
                        self.class.name,
                        interval.lo(),
                        interval.hi()
                    );
                    summary.degraded.push((idx, err));
                }
                Err(err) => return Err(err),
            }
        }

        Ok(summary)
    }

    /// Concatenate the fitted slices into one density function of `(p, m²)`.
    pub fn build_density_function(&mut self) -> Result<&CalibrationDensityFunction, PidError> {
        if self.state != CalibrationState::Fitted {
            return Err(PidError::InvalidTransition {
                from: self.state,
                to: CalibrationState::Concatenated,
            });
        }
        let slices = self
            .slices
            .iter()
            .map(|s| DensitySlice {
                interval: *s.interval(),
                params: s.params().copied(),
            })
            .collect();
        let density = CalibrationDensityFunction::new(slices)?;
        self.state = CalibrationState::Concatenated;
        Ok(&*self.density.insert(density))
    }

    /// Persisted entry: slice boundaries plus fitted parameters, keyed by species.
    pub fn persist(&mut self) -> Result<SpeciesEntry, PidError> {
        if self.state != CalibrationState::Concatenated {
            return Err(PidError::InvalidTransition {
                from: self.state,
                to: CalibrationState::Persisted,
            });
        }
        let slices = self
            .slices
            .iter()
            .map(|s| s.to_entry())
            .collect::<Result<Vec<_>, _>>()?;
        self.state = CalibrationState::Persisted;
        Ok(SpeciesEntry {
            key: self.class.key(),
            name: self.class.name.clone(),
            codes: self.class.codes.clone(),
            slices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::{SampleConfig, generate_candidates};

    fn kaon_model(n_slices: usize) -> SpeciesCalibrationModel {
        SpeciesCalibrationModel::new(
            SpeciesClass::new("kaons", vec![321]),
            0.0,
            6.0,
            n_slices,
            AxisRange::default(),
        )
        .unwrap()
    }

    fn events(n: usize, seed: u64) -> Vec<Candidate> {
        let config = SampleConfig {
            n_candidates: n,
            seed,
            p_min: 0.5,
            p_max: 4.0,
        };
        generate_candidates(&config).unwrap()
    }

    #[test]
    fn fill_only_routes_matching_codes() {
        let mut model = kaon_model(10);
        let evts = events(5_000, 1);
        let n = model.fill_from_events(&evts).unwrap();
        let expected = evts.iter().filter(|c| c.true_code == 321).count();
        assert_eq!(n, expected);

        let in_range = evts
            .iter()
            .filter(|c| c.true_code == 321 && c.p > 0.0 && c.p <= 6.0)
            .count() as u64;
        let filled: u64 = model.slices().iter().map(|s| s.histogram().total_fills()).sum();
        assert_eq!(filled, in_range);
        assert_eq!(model.state(), CalibrationState::Filled);
    }

    #[test]
    fn lifecycle_is_strictly_forward() {
        let mut model = kaon_model(4);
        assert!(matches!(model.fit_all(), Err(PidError::InvalidTransition { .. })));
        assert!(model.build_density_function().is_err());

        model.fill_from_events(&events(20_000, 2)).unwrap();
        model.fit_all().unwrap();
        assert!(matches!(
            model.fill_from_events(&events(10, 3)),
            Err(PidError::InvalidTransition { .. })
        ));
        assert!(matches!(model.fit_all(), Err(PidError::InvalidTransition { .. })));

        model.build_density_function().unwrap();
        assert_eq!(model.state(), CalibrationState::Concatenated);
        assert!(model.build_density_function().is_err());

        let entry = model.persist().unwrap();
        assert_eq!(entry.key, "321");
        assert_eq!(entry.slices.len(), 4);
        assert!(model.persist().is_err());
    }

    #[test]
    fn fill_without_members_stays_unfilled() {
        let mut model = SpeciesCalibrationModel::new(
            SpeciesClass::new("ghost", vec![99999]),
            0.0,
            6.0,
            4,
            AxisRange::default(),
        )
        .unwrap();
        assert_eq!(model.fill_from_events(&events(2_000, 6)).unwrap(), 0);
        assert_eq!(model.state(), CalibrationState::Unfilled);
        assert!(matches!(model.fit_all(), Err(PidError::InvalidTransition { .. })));

        let empty = model.accumulator();
        model.absorb(&empty).unwrap();
        assert_eq!(model.state(), CalibrationState::Unfilled);
        assert!(!model.has_fills());
    }

    #[test]
    fn absorb_rejects_accumulator_from_another_partition() {
        let mut low = kaon_model(6);
        let high = SpeciesCalibrationModel::new(
            SpeciesClass::new("kaons", vec![321]),
            10.0,
            16.0,
            6,
            AxisRange::default(),
        )
        .unwrap();
        let mut acc = high.accumulator();
        for _ in 0..100 {
            acc.fill(12.5, 0.24);
        }
        assert!(matches!(low.absorb(&acc), Err(PidError::InvalidConfig(_))));
        assert!(!low.has_fills());
        assert_eq!(low.state(), CalibrationState::Unfilled);
        assert!(matches!(
            low.accumulator().merge(&acc),
            Err(PidError::InvalidConfig(_))
        ));
    }

    #[test]
    fn absorb_rejects_accumulator_with_another_axis() {
        let mut fine = SpeciesCalibrationModel::new(
            SpeciesClass::new("kaons", vec![321]),
            0.0,
            6.0,
            6,
            AxisRange { min: -0.5, max: 1.5, bins: 400 },
        )
        .unwrap();
        let coarse = SpeciesCalibrationModel::new(
            SpeciesClass::new("kaons", vec![321]),
            0.0,
            6.0,
            6,
            AxisRange { min: -0.5, max: 1.5, bins: 100 },
        )
        .unwrap();
        let mut acc = coarse.accumulator();
        acc.fill(2.5, 0.24);
        assert!(matches!(fine.absorb(&acc), Err(PidError::InvalidConfig(_))));
        assert!(fine.slices().iter().all(|s| s.histogram().total_fills() == 0));
    }

    #[test]
    fn uncovered_slices_degrade_without_aborting() {
        // Events only populate p in (0.5, 4.0]; slices above stay empty.
        let mut model = kaon_model(6);
        model.fill_from_events(&events(30_000, 4)).unwrap();
        let summary = model.fit_all().unwrap();
        assert!(summary.fitted >= 3);
        assert!(!summary.degraded.is_empty());
        assert!(model.slices()[5].is_degraded());

        let density = model.build_density_function().unwrap();
        assert_eq!(density.eval(5.5, 0.24), 0.0);
        assert!(density.eval(2.5, 0.24) > 0.0);
    }

    #[test]
    fn merged_partitions_equal_a_combined_fill() {
        let evts = events(20_000, 5);
        let (left, right) = evts.split_at(7_321);

        let mut combined = kaon_model(5);
        combined.fill_from_events(&evts).unwrap();

        let mut merged = kaon_model(5);
        let mut acc_left = merged.accumulator();
        let mut acc_right = merged.accumulator();
        for c in left.iter().filter(|c| c.true_code == 321) {
            acc_left.fill(c.p, c.m2);
        }
        for c in right.iter().filter(|c| c.true_code == 321) {
            acc_right.fill(c.p, c.m2);
        }
        merged.absorb(&acc_right.merge(&acc_left).unwrap()).unwrap();

        for (a, b) in combined.slices().iter().zip(merged.slices()) {
            assert_eq!(a.histogram(), b.histogram());
        }

        combined.fit_all().unwrap();
        merged.fit_all().unwrap();
        for (a, b) in combined.slices().iter().zip(merged.slices()) {
            match (a.params(), b.params()) {
                (Some(x), Some(y)) => {
                    assert!((x.mean - y.mean).abs() < 1e-9);
                    assert!((x.sigma - y.sigma).abs() < 1e-9);
                    assert!((x.amplitude - y.amplitude).abs() < 1e-6);
                }
                (None, None) => {}
                _ => panic!("fit outcome differs between combined and merged fills"),
            }
        }
    }
}
