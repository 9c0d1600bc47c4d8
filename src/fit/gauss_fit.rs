//! Single-Gaussian fit of a count histogram.
//!
//! Fit statistic (the one definition used everywhere in this crate):
//!
//! ```text
//! χ² = Σ_i (n_i - g(x_i))² / max(n_i, 1)
//! ```
//!
//! summed over every bin of the histogram axis, empty bins included with unit
//! variance, where `x_i` is the bin centre. It is minimised with
//! Levenberg–Marquardt; each step is a damped linear least-squares problem
//! solved by SVD.
//!
//! Start values come from the histogram itself: amplitude = tallest bin,
//! mean = count-weighted mean, width = count-weighted RMS (at least one bin).

use nalgebra::{DMatrix, DVector};

use crate::domain::{FitQuality, GaussianParams};
use crate::error::PidError;
use crate::hist::Histogram1D;
use crate::math::{gaussian, gaussian_with_gradient, solve_least_squares};

/// A Gaussian has three parameters; fewer populated bins cannot constrain it.
pub const MIN_NONZERO_BINS: usize = 3;

const MAX_ITERATIONS: usize = 200;
const REL_TOLERANCE: f64 = 1e-10;
const LAMBDA_START: f64 = 1e-3;
const LAMBDA_MAX: f64 = 1e12;

/// Converged (or best-effort) Gaussian fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussFit {
    pub params: GaussianParams,
    pub quality: FitQuality,
}

struct Binned {
    x: Vec<f64>,
    y: Vec<f64>,
    inv_err: Vec<f64>,
}

impl Binned {
    fn from_histogram(hist: &Histogram1D) -> Self {
        let counts = hist.counts();
        let mut x = Vec::with_capacity(counts.len());
        let mut y = Vec::with_capacity(counts.len());
        let mut inv_err = Vec::with_capacity(counts.len());
        for (i, &c) in counts.iter().enumerate() {
            x.push(hist.bin_center(i));
            y.push(c as f64);
            inv_err.push(1.0 / (c.max(1) as f64).sqrt());
        }
        Self { x, y, inv_err }
    }

    fn chi2(&self, theta: &[f64; 3]) -> f64 {
        self.x
            .iter()
            .zip(self.y.iter())
            .zip(self.inv_err.iter())
            .map(|((&x, &y), &w)| {
                let r = (y - gaussian(x, theta[0], theta[1], theta[2])) * w;
                r * r
            })
            .sum()
    }
}

/// Fit a single Gaussian to the histogram.
///
/// Errors:
/// - `InsufficientData` if fewer than [`MIN_NONZERO_BINS`] bins are populated
/// - `FitFailed` if the solver ends on a non-finite or non-positive amplitude/width
pub fn fit_gaussian(hist: &Histogram1D) -> Result<GaussFit, PidError> {
    let nonzero_bins = hist.nonzero_bins();
    if nonzero_bins < MIN_NONZERO_BINS {
        return Err(PidError::InsufficientData {
            nonzero_bins,
            required: MIN_NONZERO_BINS,
        });
    }

    let data = Binned::from_histogram(hist);
    let mut theta = start_values(hist)?;
    let mut chi2 = data.chi2(&theta);
    let mut lambda = LAMBDA_START;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < MAX_ITERATIONS {
        iterations += 1;

        let Some(delta) = damped_step(&data, &theta, lambda) else {
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                break;
            }
            continue;
        };

        let trial = [theta[0] + delta[0], theta[1] + delta[1], theta[2] + delta[2]];
        let chi2_trial = data.chi2(&trial);

        if chi2_trial.is_finite() && chi2_trial <= chi2 {
            let improvement = chi2 - chi2_trial;
            theta = trial;
            chi2 = chi2_trial;
            lambda = (lambda * 0.1).max(1e-12);
            if improvement <= REL_TOLERANCE * (chi2 + REL_TOLERANCE) {
                converged = true;
                break;
            }
        } else {
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                // No downhill step left at any damping: we are at the minimum.
                converged = true;
                break;
            }
        }
    }

    let params = GaussianParams {
        amplitude: theta[0],
        mean: theta[1],
        sigma: theta[2].abs(),
    };
    let axis = hist.axis();
    if !(params.amplitude.is_finite() && params.amplitude > 0.0) {
        return Err(PidError::FitFailed(format!("non-positive amplitude {}", params.amplitude)));
    }
    if !(params.sigma.is_finite() && params.sigma > 0.0) {
        return Err(PidError::FitFailed(format!("degenerate width {}", params.sigma)));
    }
    if !(params.mean.is_finite() && params.mean >= axis.min && params.mean <= axis.max) {
        return Err(PidError::FitFailed(format!(
            "mean {} outside the m2 axis [{}, {}]",
            params.mean, axis.min, axis.max
        )));
    }

    Ok(GaussFit {
        params,
        quality: FitQuality {
            chi2,
            ndf: data.x.len().saturating_sub(3),
            iterations,
            converged,
        },
    })
}

fn start_values(hist: &Histogram1D) -> Result<[f64; 3], PidError> {
    let (mean, rms) = hist
        .mean_and_rms()
        .ok_or_else(|| PidError::InsufficientData {
            nonzero_bins: 0,
            required: MIN_NONZERO_BINS,
        })?;
    let peak = hist.counts().iter().copied().max().unwrap_or(0) as f64;
    Ok([peak, mean, rms.max(hist.bin_width())])
}

/// Solve `[J; √λ·D] δ = [r; 0]` with rows scaled by the bin errors.
fn damped_step(data: &Binned, theta: &[f64; 3], lambda: f64) -> Option<[f64; 3]> {
    let n = data.x.len();
    let mut jac = DMatrix::<f64>::zeros(n + 3, 3);
    let mut rhs = DVector::<f64>::zeros(n + 3);

    for i in 0..n {
        let (g, grad) = gaussian_with_gradient(data.x[i], theta[0], theta[1], theta[2]);
        let w = data.inv_err[i];
        for j in 0..3 {
            jac[(i, j)] = grad[j] * w;
        }
        rhs[i] = (data.y[i] - g) * w;
    }

    // Marquardt scaling: damp each parameter relative to its own curvature.
    let sqrt_lambda = lambda.sqrt();
    for j in 0..3 {
        let norm = (0..n).map(|i| jac[(i, j)] * jac[(i, j)]).sum::<f64>().sqrt();
        jac[(n + j, j)] = sqrt_lambda * norm.max(1e-12);
    }

    let delta = solve_least_squares(&jac, &rhs)?;
    Some([delta[0], delta[1], delta[2]])
}
