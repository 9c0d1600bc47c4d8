//! Mathematical utilities: Gaussian primitives and weighted least squares.

pub mod gaussian;
pub mod ols;

pub use gaussian::*;
pub use ols::*;
