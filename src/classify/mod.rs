//! Inference: argmax-with-purity-cut classification and its diagnostics.

pub mod diagnostics;
pub mod engine;

pub use diagnostics::*;
pub use engine::*;
