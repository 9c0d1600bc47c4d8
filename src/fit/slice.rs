//! One momentum slice: an `m²` histogram for `(p_lo, p_hi]` plus its Gaussian fit.

use crate::domain::{AxisRange, CalibrationState, FitQuality, GaussianParams, SliceEntry, SliceStatus};
use crate::error::PidError;
use crate::fit::gauss_fit::fit_gaussian;
use crate::fit::partition::MomentumInterval;
use crate::hist::Histogram1D;

/// Fit state of a slice.
#[derive(Debug, Clone, PartialEq)]
pub enum SliceFit {
    /// Still accepting fills.
    Pending,
    Fitted {
        params: GaussianParams,
        quality: FitQuality,
    },
    /// The fit was not possible; density is identically zero.
    Degraded { reason: PidError },
}

#[derive(Debug, Clone)]
pub struct MomentumSlice {
    interval: MomentumInterval,
    hist: Histogram1D,
    fit: SliceFit,
}

impl MomentumSlice {
    pub fn new(interval: MomentumInterval, m2_axis: &AxisRange) -> Result<Self, PidError> {
        m2_axis.validate()?;
        Ok(Self {
            interval,
            hist: Histogram1D::new(m2_axis),
            fit: SliceFit::Pending,
        })
    }

    pub fn interval(&self) -> &MomentumInterval {
        &self.interval
    }

    pub fn histogram(&self) -> &Histogram1D {
        &self.hist
    }

    pub fn fit_state(&self) -> &SliceFit {
        &self.fit
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self.fit, SliceFit::Fitted { .. })
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.fit, SliceFit::Degraded { .. })
    }

    pub fn params(&self) -> Option<&GaussianParams> {
        match &self.fit {
            SliceFit::Fitted { params, .. } => Some(params),
            _ => None,
        }
    }

    pub fn quality(&self) -> Option<&FitQuality> {
        match &self.fit {
            SliceFit::Fitted { quality, .. } => Some(quality),
            _ => None,
        }
    }

    fn ensure_open(&self) -> Result<(), PidError> {
        if matches!(self.fit, SliceFit::Pending) {
            Ok(())
        } else {
            Err(PidError::InvalidTransition {
                from: CalibrationState::Fitted,
                to: CalibrationState::Filled,
            })
        }
    }

    /// Histogram `m2` if `p` lies in this slice. Returns whether it was accepted.
    ///
    /// Out-of-slice momenta are a silent no-op; filling a fitted slice is an error.
    pub fn fill_hist(&mut self, p: f64, m2: f64) -> Result<bool, PidError> {
        self.ensure_open()?;
        if !self.interval.contains(p) {
            return Ok(false);
        }
        self.hist.fill(m2);
        Ok(true)
    }

    /// Merge counts accumulated elsewhere (e.g. by a parallel worker).
    ///
    /// The partial histogram must use this slice's m² axis.
    pub fn absorb(&mut self, partial: &Histogram1D) -> Result<(), PidError> {
        self.ensure_open()?;
        self.hist.merge(partial)
    }

    /// Fit the accumulated histogram.
    ///
    /// On `InsufficientData` / `FitFailed` the slice is marked degraded and the
    /// error is returned so the caller can surface a warning.
    pub fn fit(&mut self) -> Result<&GaussianParams, PidError> {
        if !matches!(self.fit, SliceFit::Pending) {
            return Err(PidError::InvalidTransition {
                from: CalibrationState::Fitted,
                to: CalibrationState::Fitted,
            });
        }

        match fit_gaussian(&self.hist) {
            Ok(result) => {
                self.fit = SliceFit::Fitted {
                    params: result.params,
                    quality: result.quality,
                };
            }
            Err(err) => {
                self.fit = SliceFit::Degraded { reason: err.clone() };
                return Err(err);
            }
        }

        match &self.fit {
            SliceFit::Fitted { params, .. } => Ok(params),
            _ => Err(PidError::NotFitted),
        }
    }

    /// Evaluate the fitted Gaussian at `m2`.
    ///
    /// `NotFitted` unless a fit succeeded, degraded slices included. The zero
    /// density of a degraded slice is applied by `CalibrationDensityFunction`.
    pub fn eval(&self, m2: f64) -> Result<f64, PidError> {
        match &self.fit {
            SliceFit::Fitted { params, .. } => Ok(params.eval(m2)),
            SliceFit::Pending | SliceFit::Degraded { .. } => Err(PidError::NotFitted),
        }
    }

    /// Persisted form. Histogram counts are not part of it.
    pub fn to_entry(&self) -> Result<SliceEntry, PidError> {
        let (params, chi2, ndf, status) = match &self.fit {
            SliceFit::Pending => return Err(PidError::NotFitted),
            SliceFit::Fitted { params, quality } => (*params, quality.chi2, quality.ndf, SliceStatus::Fitted),
            SliceFit::Degraded { .. } => (
                GaussianParams {
                    amplitude: 0.0,
                    mean: 0.0,
                    sigma: 0.0,
                },
                0.0,
                0,
                SliceStatus::Degraded,
            ),
        };
        Ok(SliceEntry {
            p_lo: self.interval.lo(),
            p_hi: self.interval.hi(),
            amplitude: params.amplitude,
            mean: params.mean,
            sigma: params.sigma,
            chi2,
            ndf,
            status,
        })
    }
}
