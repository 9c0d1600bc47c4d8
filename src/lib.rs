//! `tof-pid` library crate.
//!
//! Time-of-flight particle identification: per-momentum-slice Gaussian
//! calibration of the measured mass squared, and density-ratio classification
//! with a purity cut.
//!
//! The binary (`tofpid`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - calibration and classification can be driven from other tools

pub mod app;
pub mod classify;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod hist;
pub mod io;
pub mod math;
pub mod plot;
pub mod report;
