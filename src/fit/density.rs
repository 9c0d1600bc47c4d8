//! Piecewise `(p, m²)` density of one species.
//!
//! The function is an explicit ordered list of `(interval, parameters)` pairs and
//! is evaluated by linear scan: the first interval containing `p` wins, and
//! momenta outside every interval evaluate to zero. It holds nothing beyond the
//! fitted slice parameters, so it can be rebuilt exactly from a persisted entry.

use crate::domain::{GaussianParams, SliceEntry, SliceStatus, SpeciesEntry};
use crate::error::PidError;
use crate::fit::partition::MomentumInterval;

/// Boundary mismatch tolerated between persisted neighbouring slices.
const CONTIGUITY_EPS: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct DensitySlice {
    pub interval: MomentumInterval,
    /// `None` for a degraded slice.
    pub params: Option<GaussianParams>,
}

impl DensitySlice {
    pub fn eval(&self, m2: f64) -> f64 {
        self.params.map_or(0.0, |g| g.eval(m2))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationDensityFunction {
    slices: Vec<DensitySlice>,
}

impl CalibrationDensityFunction {
    /// Build from ordered, contiguous slices.
    pub fn new(slices: Vec<DensitySlice>) -> Result<Self, PidError> {
        if slices.is_empty() {
            return Err(PidError::InvalidConfig("density function needs at least one slice".into()));
        }
        for pair in slices.windows(2) {
            let (a, b) = (&pair[0].interval, &pair[1].interval);
            if (a.hi() - b.lo()).abs() > CONTIGUITY_EPS {
                return Err(PidError::MalformedRange {
                    p_min: a.hi(),
                    p_max: b.lo(),
                });
            }
        }
        Ok(Self { slices })
    }

    /// Rebuild from a persisted species entry.
    pub fn from_entry(entry: &SpeciesEntry) -> Result<Self, PidError> {
        let slices = entry
            .slices
            .iter()
            .map(density_slice_from_entry)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(slices)
    }

    pub fn slices(&self) -> &[DensitySlice] {
        &self.slices
    }

    /// Covered momentum range `(lo, hi]`.
    pub fn coverage(&self) -> (f64, f64) {
        let lo = self.slices.first().map_or(0.0, |s| s.interval.lo());
        let hi = self.slices.last().map_or(0.0, |s| s.interval.hi());
        (lo, hi)
    }

    pub fn slice_at(&self, p: f64) -> Option<&DensitySlice> {
        self.slices.iter().find(|s| s.interval.contains(p))
    }

    pub fn eval(&self, p: f64, m2: f64) -> f64 {
        self.slice_at(p).map_or(0.0, |s| s.eval(m2))
    }
}

fn density_slice_from_entry(entry: &SliceEntry) -> Result<DensitySlice, PidError> {
    let interval = MomentumInterval::new(entry.p_lo, entry.p_hi)?;
    let params = match entry.status {
        SliceStatus::Degraded => None,
        SliceStatus::Fitted => {
            let g = GaussianParams {
                amplitude: entry.amplitude,
                mean: entry.mean,
                sigma: entry.sigma,
            };
            if !(g.amplitude.is_finite() && g.mean.is_finite() && g.sigma.is_finite() && g.sigma > 0.0) {
                return Err(PidError::InvalidConfig(format!(
                    "slice ({}, {}] has invalid Gaussian parameters",
                    entry.p_lo, entry.p_hi
                )));
            }
            Some(g)
        }
    };
    Ok(DensitySlice { interval, params })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::partition::partition;

    fn function() -> CalibrationDensityFunction {
        let slices = partition(0.0, 3.0, 3)
            .unwrap()
            .into_iter()
            .enumerate()
            .map(|(i, interval)| DensitySlice {
                interval,
                params: (i != 1).then_some(GaussianParams {
                    amplitude: 10.0 * (i + 1) as f64,
                    mean: 0.25,
                    sigma: 0.05,
                }),
            })
            .collect();
        CalibrationDensityFunction::new(slices).unwrap()
    }

    #[test]
    fn eval_picks_the_slice_containing_p() {
        let f = function();
        assert!((f.eval(0.5, 0.25) - 10.0).abs() < 1e-12);
        assert!((f.eval(1.0, 0.25) - 10.0).abs() < 1e-12);
        assert_eq!(f.eval(1.5, 0.25), 0.0);
        assert!((f.eval(3.0, 0.25) - 30.0).abs() < 1e-12);
    }

    #[test]
    fn outside_coverage_is_zero() {
        let f = function();
        assert_eq!(f.eval(0.0, 0.25), 0.0);
        assert_eq!(f.eval(3.01, 0.25), 0.0);
        assert_eq!(f.eval(-1.0, 0.25), 0.0);
    }

    #[test]
    fn eval_is_idempotent() {
        let f = function();
        let a = f.eval(2.2, 0.27);
        let b = f.eval(2.2, 0.27);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn gaps_are_rejected() {
        let slices = vec![
            DensitySlice {
                interval: MomentumInterval::new(0.0, 1.0).unwrap(),
                params: None,
            },
            DensitySlice {
                interval: MomentumInterval::new(1.5, 2.0).unwrap(),
                params: None,
            },
        ];
        assert!(CalibrationDensityFunction::new(slices).is_err());
    }
}
