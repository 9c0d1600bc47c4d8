//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and initialises logging
//! - parses CLI arguments
//! - runs calibration or inference
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;
use env_logger::Env;
use log::info;

use crate::cli::{CalibrateArgs, Command, GenerateArgs, InferArgs, InspectArgs};
use crate::domain::{AxisRange, CalibrationConfig, InferenceConfig};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `tofpid` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Calibrate(args) => handle_calibrate(args),
        Command::Infer(args) => handle_infer(args),
        Command::Generate(args) => handle_generate(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

fn handle_calibrate(args: CalibrateArgs) -> Result<(), AppError> {
    let config = calibration_config_from_args(&args);
    let run = pipeline::run_calibration(&config)?;

    println!(
        "{}",
        crate::report::format_calibration_summary(&run.events, &run.fill, &run.model)
    );

    if let Some(path) = &args.histograms {
        crate::io::export::write_slice_histograms_csv(path, &run.models)?;
        info!("wrote slice histograms to {}", path.display());
    }
    Ok(())
}

fn handle_infer(args: InferArgs) -> Result<(), AppError> {
    let config = inference_config_from_args(&args);
    let run = pipeline::run_inference(&config)?;

    println!("{}", crate::report::format_diagnostics(&run.events, &run.report));

    if let Some(path) = &config.export_labels {
        crate::io::export::write_labels_csv(path, &run.events.candidates, &run.decisions, &run.engine)?;
        info!("wrote labels to {}", path.display());
    }
    if let Some(path) = &config.export_diagnostics {
        crate::io::export::write_diagnostics_json(path, &run.report)?;
        info!("wrote diagnostics to {}", path.display());
    }
    Ok(())
}

fn handle_generate(args: GenerateArgs) -> Result<(), AppError> {
    let config = crate::data::sample::SampleConfig {
        n_candidates: args.events,
        seed: args.seed,
        p_min: args.p_min,
        p_max: args.p_max,
    };
    let candidates = crate::data::sample::generate_candidates(&config)?;
    crate::io::ingest::write_events_csv(&args.output, &candidates)?;
    println!(
        "Wrote {} candidates (seed {}) to {}",
        candidates.len(),
        args.seed,
        args.output.display()
    );
    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<(), AppError> {
    let model = crate::io::model_file::read_model_json(&args.model)?;

    let densities = model
        .species
        .iter()
        .map(crate::fit::density::CalibrationDensityFunction::from_entry)
        .collect::<Result<Vec<_>, _>>()?;
    let curves: Vec<crate::plot::DensityCurve<'_>> = model
        .species
        .iter()
        .zip(densities.iter())
        .map(|(entry, density)| crate::plot::DensityCurve {
            name: &entry.name,
            density,
        })
        .collect();

    println!("{}", crate::report::format_model_overview(&model));
    println!("{}", crate::report::format_slice_params(&model, args.p));
    println!(
        "{}",
        crate::plot::render_density_plot(&curves, &model.m2_axis, args.p, args.width, args.height)
    );
    Ok(())
}

pub fn calibration_config_from_args(args: &CalibrateArgs) -> CalibrationConfig {
    CalibrationConfig {
        filelist: args.filelist.clone(),
        output: args.output.clone(),
        p_min: args.p_min,
        p_max: args.p_max,
        n_slices: args.slices,
        m2_axis: AxisRange {
            min: args.m2_min,
            max: args.m2_max,
            bins: args.m2_bins,
        },
        species: args.species.classes(),
    }
}

pub fn inference_config_from_args(args: &InferArgs) -> InferenceConfig {
    InferenceConfig {
        filelist: args.filelist.clone(),
        model: args.model.clone(),
        purity_cut: args.purity_cut,
        species: args.species.classes(),
        export_labels: args.output.clone(),
        export_diagnostics: args.diagnostics.clone(),
    }
}
