//! Linear least squares solver.
//!
//! Each Levenberg–Marquardt step of the Gaussian fitter solves a small linear
//! problem of the form:
//!
//! ```text
//! minimize ‖J δ - r‖²
//! ```
//!
//! where the rows of `J` and `r` are already scaled by `1/σ_i` (bin errors) and
//! the damping term is appended as extra rows.
//!
//! Implementation choices:
//! - SVD handles tall systems (hundreds of bins, three parameters) and
//!   rank-deficient Jacobians (e.g. a width collapsed onto a single bin).
//!   Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}
