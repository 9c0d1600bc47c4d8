//! Momentum partitioning.
//!
//! A species model covers `[p_min, p_max]` with `n` equal-width slices. The first
//! slice starts at the configured `p_min` (never at zero), and every boundary is
//! computed directly as `p_min + i·Δ` rather than by accumulating `Δ`, so
//! neighbouring slices share bit-identical boundaries and the last upper edge is
//! exactly `p_max`.

use serde::{Deserialize, Serialize};

use crate::error::PidError;

/// Half-open momentum interval `(lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumInterval {
    lo: f64,
    hi: f64,
}

impl MomentumInterval {
    pub fn new(lo: f64, hi: f64) -> Result<Self, PidError> {
        if !(lo.is_finite() && hi.is_finite()) || lo >= hi {
            return Err(PidError::MalformedRange { p_min: lo, p_max: hi });
        }
        Ok(Self { lo, hi })
    }

    pub fn lo(&self) -> f64 {
        self.lo
    }

    pub fn hi(&self) -> f64 {
        self.hi
    }

    pub fn width(&self) -> f64 {
        self.hi - self.lo
    }

    /// Membership: the lower edge is excluded, the upper edge included.
    pub fn contains(&self, p: f64) -> bool {
        p > self.lo && p <= self.hi
    }
}

/// Split `[p_min, p_max]` into `n_slices` contiguous equal-width intervals.
pub fn partition(p_min: f64, p_max: f64, n_slices: usize) -> Result<Vec<MomentumInterval>, PidError> {
    if !(p_min.is_finite() && p_max.is_finite()) || p_min >= p_max {
        return Err(PidError::MalformedRange { p_min, p_max });
    }
    if n_slices == 0 {
        return Err(PidError::InvalidConfig("slice count must be > 0".into()));
    }

    let span = p_max - p_min;
    let edge = |i: usize| {
        if i == n_slices {
            p_max
        } else {
            p_min + span * (i as f64 / n_slices as f64)
        }
    };

    (0..n_slices)
        .map(|i| MomentumInterval::new(edge(i), edge(i + 1)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_covers_range_without_gaps() {
        for &(lo, hi, n) in &[(0.0, 6.0, 50), (0.3, 6.0, 7), (-1.0, 1.0, 3), (1.0, 1.1, 1)] {
            let slices = partition(lo, hi, n).unwrap();
            assert_eq!(slices.len(), n);
            assert_eq!(slices[0].lo(), lo);
            assert_eq!(slices[n - 1].hi(), hi);
            for pair in slices.windows(2) {
                assert_eq!(pair[0].hi(), pair[1].lo());
            }
            let total: f64 = slices.iter().map(|s| s.width()).sum();
            assert!((total - (hi - lo)).abs() < 1e-12);
        }
    }

    #[test]
    fn partition_starts_at_configured_lower_bound() {
        let slices = partition(2.0, 6.0, 4).unwrap();
        let los: Vec<f64> = slices.iter().map(|s| s.lo()).collect();
        assert_eq!(los, vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn every_interior_point_belongs_to_exactly_one_slice() {
        let slices = partition(0.5, 4.5, 8).unwrap();
        for k in 1..=400 {
            let p = 0.5 + 4.0 * k as f64 / 400.0;
            let hits = slices.iter().filter(|s| s.contains(p)).count();
            assert_eq!(hits, 1, "p={p}");
        }
        assert_eq!(slices.iter().filter(|s| s.contains(0.5)).count(), 0);
    }

    #[test]
    fn boundary_membership_excludes_lower_includes_upper() {
        let s = MomentumInterval::new(1.0, 2.0).unwrap();
        assert!(!s.contains(1.0));
        assert!(s.contains(2.0));
        assert!(s.contains(1.5));
    }

    #[test]
    fn malformed_ranges_are_rejected() {
        assert!(matches!(partition(3.0, 3.0, 5), Err(PidError::MalformedRange { .. })));
        assert!(matches!(MomentumInterval::new(2.0, 1.0), Err(PidError::MalformedRange { .. })));
        assert!(matches!(partition(0.0, 1.0, 0), Err(PidError::InvalidConfig(_))));
    }
}
