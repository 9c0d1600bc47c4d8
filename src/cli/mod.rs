//! Command-line parsing for the time-of-flight particle identifier.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the fitting/classification code. Every numeric knob can also be
//! supplied through a `TOFPID_*` environment variable (or a `.env` file).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::SpeciesClass;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "tofpid", version, about = "TOF mass-squared calibration and particle identification")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit per-slice m² Gaussians for every species and write a calibration file.
    Calibrate(CalibrateArgs),
    /// Classify candidates against a calibration file and print diagnostics.
    Infer(InferArgs),
    /// Write a synthetic truth-labeled event file.
    Generate(GenerateArgs),
    /// Print the species densities of a calibration file at one momentum.
    Inspect(InspectArgs),
}

/// Species classes shared by `calibrate` and `infer`.
#[derive(Debug, Args, Clone)]
pub struct SpeciesArgs {
    /// Species class as `name=code,code,...`; repeat for each class.
    /// Defaults to protons=2212, kaons=321, pions=13,211,11.
    #[arg(long = "species", value_name = "NAME=CODES", env = "TOFPID_SPECIES", value_delimiter = ';')]
    pub species: Vec<SpeciesClass>,
}

impl SpeciesArgs {
    pub fn classes(&self) -> Vec<SpeciesClass> {
        if self.species.is_empty() {
            SpeciesClass::defaults()
        } else {
            self.species.clone()
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct CalibrateArgs {
    /// Text file listing event CSVs, one per line.
    #[arg(long, value_name = "PATH", env = "TOFPID_FILELIST")]
    pub filelist: PathBuf,

    /// Calibration JSON to write.
    #[arg(short, long, value_name = "JSON", env = "TOFPID_MODEL")]
    pub output: PathBuf,

    /// Number of momentum slices.
    #[arg(long, default_value_t = 50, env = "TOFPID_SLICES")]
    pub slices: usize,

    /// Lower momentum bound (GeV/c).
    #[arg(long, default_value_t = 0.0, env = "TOFPID_P_MIN", allow_negative_numbers = true)]
    pub p_min: f64,

    /// Upper momentum bound (GeV/c).
    #[arg(long, default_value_t = 6.0, env = "TOFPID_P_MAX", allow_negative_numbers = true)]
    pub p_max: f64,

    /// Lower edge of the m² histogram axis.
    #[arg(long = "m2-min", default_value_t = -1.0, env = "TOFPID_M2_MIN", allow_negative_numbers = true)]
    pub m2_min: f64,

    /// Upper edge of the m² histogram axis.
    #[arg(long = "m2-max", default_value_t = 2.0, env = "TOFPID_M2_MAX", allow_negative_numbers = true)]
    pub m2_max: f64,

    /// Number of m² histogram bins.
    #[arg(long = "m2-bins", default_value_t = 400, env = "TOFPID_M2_BINS")]
    pub m2_bins: usize,

    /// Export the raw m² histogram of every slice to CSV.
    #[arg(long, value_name = "CSV")]
    pub histograms: Option<PathBuf>,

    #[command(flatten)]
    pub species: SpeciesArgs,
}

#[derive(Debug, Args, Clone)]
pub struct InferArgs {
    /// Text file listing event CSVs, one per line.
    #[arg(long, value_name = "PATH", env = "TOFPID_FILELIST")]
    pub filelist: PathBuf,

    /// Calibration JSON produced by `tofpid calibrate`.
    #[arg(long, value_name = "JSON", env = "TOFPID_MODEL")]
    pub model: PathBuf,

    /// Minimum confidence for a species label; in (0, 1].
    #[arg(long, default_value_t = 0.9, env = "TOFPID_PURITY_CUT")]
    pub purity_cut: f64,

    /// Export per-candidate labels to CSV.
    #[arg(short, long, value_name = "CSV")]
    pub output: Option<PathBuf>,

    /// Export the diagnostics summary to JSON.
    #[arg(long, value_name = "JSON")]
    pub diagnostics: Option<PathBuf>,

    #[command(flatten)]
    pub species: SpeciesArgs,
}

#[derive(Debug, Args, Clone)]
pub struct GenerateArgs {
    /// Event CSV to write.
    #[arg(short, long, value_name = "CSV")]
    pub output: PathBuf,

    /// Number of candidates.
    #[arg(short = 'n', long, default_value_t = 200_000, env = "TOFPID_EVENTS")]
    pub events: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42, env = "TOFPID_SEED")]
    pub seed: u64,

    /// Lower momentum bound (GeV/c).
    #[arg(long, default_value_t = 0.0, env = "TOFPID_P_MIN", allow_negative_numbers = true)]
    pub p_min: f64,

    /// Upper momentum bound (GeV/c).
    #[arg(long, default_value_t = 6.0, env = "TOFPID_P_MAX", allow_negative_numbers = true)]
    pub p_max: f64,
}

#[derive(Debug, Args, Clone)]
pub struct InspectArgs {
    /// Calibration JSON produced by `tofpid calibrate`.
    #[arg(long, value_name = "JSON", env = "TOFPID_MODEL")]
    pub model: PathBuf,

    /// Momentum (GeV/c) to evaluate the densities at.
    #[arg(long)]
    pub p: f64,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}
