//! Synthetic truth-labelled event generation.

pub mod sample;

pub use sample::*;
