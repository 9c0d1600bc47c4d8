//! Gaussian primitives used by the slice fitter.
//!
//! The model is `g(x) = A · exp(-½ ((x - μ) / σ)²)`. Its partial derivatives are
//!
//! - `∂g/∂A = e`
//! - `∂g/∂μ = A · e · (x - μ) / σ²`
//! - `∂g/∂σ = A · e · (x - μ)² / σ³`
//!
//! with `e = exp(-½ ((x - μ) / σ)²)`.

/// Widths below this are treated as degenerate.
pub const SIGMA_EPS: f64 = 1e-12;

/// Evaluate the Gaussian. A degenerate width evaluates to zero everywhere.
pub fn gaussian(x: f64, amplitude: f64, mean: f64, sigma: f64) -> f64 {
    let sigma = sigma.abs();
    if sigma < SIGMA_EPS {
        return 0.0;
    }
    let z = (x - mean) / sigma;
    amplitude * (-0.5 * z * z).exp()
}

/// Value and gradient `(g, [∂A, ∂μ, ∂σ])` at `x`.
pub fn gaussian_with_gradient(x: f64, amplitude: f64, mean: f64, sigma: f64) -> (f64, [f64; 3]) {
    let s = if sigma.abs() < SIGMA_EPS {
        SIGMA_EPS.copysign(sigma)
    } else {
        sigma
    };
    let d = x - mean;
    let e = (-0.5 * (d / s) * (d / s)).exp();
    let g = amplitude * e;
    let s2 = s * s;
    (g, [e, g * d / s2, g * d * d / (s2 * s)])
}
