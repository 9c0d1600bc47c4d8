//! End-to-end: generate -> calibrate -> persist -> load -> classify.

use std::fs;
use std::path::{Path, PathBuf};

use tof_pid::app::pipeline::{run_calibration, run_inference};
use tof_pid::classify::{BackgroundReason, Label};
use tof_pid::data::sample::{SampleConfig, generate_candidates};
use tof_pid::domain::{AxisRange, CalibrationConfig, InferenceConfig, SliceStatus, SpeciesClass};
use tof_pid::io::export::{write_diagnostics_json, write_slice_histograms_csv};
use tof_pid::io::ingest::write_events_csv;
use tof_pid::io::model_file::read_model_json;

fn work_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tofpid-e2e-{name}-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Writes one synthetic event file plus a file list naming it.
fn write_sample(dir: &Path, file: &str, seed: u64, n: usize) -> PathBuf {
    let candidates = generate_candidates(&SampleConfig {
        n_candidates: n,
        seed,
        p_min: 0.0,
        p_max: 3.0,
    })
    .unwrap();
    write_events_csv(&dir.join(file), &candidates).unwrap();

    let list = dir.join(format!("{file}.list"));
    fs::write(&list, format!("# synthetic\n{file}\n")).unwrap();
    list
}

fn calibration_config(dir: &Path, filelist: PathBuf) -> CalibrationConfig {
    CalibrationConfig {
        filelist,
        output: dir.join("calibration.json"),
        p_min: 0.0,
        p_max: 3.0,
        n_slices: 10,
        m2_axis: AxisRange::default(),
        species: SpeciesClass::defaults(),
    }
}

fn inference_config(dir: &Path, filelist: PathBuf, purity_cut: f64) -> InferenceConfig {
    InferenceConfig {
        filelist,
        model: dir.join("calibration.json"),
        purity_cut,
        species: SpeciesClass::defaults(),
        export_labels: None,
        export_diagnostics: None,
    }
}

#[test]
fn calibrate_then_classify_fresh_sample() {
    let dir = work_dir("full");
    let train = write_sample(&dir, "train.csv", 42, 60_000);
    let test = write_sample(&dir, "test.csv", 7, 20_000);

    let cal = run_calibration(&calibration_config(&dir, train)).unwrap();
    assert_eq!(cal.fill.candidates, 60_000);
    assert!(cal.fill.unrouted > 0, "deuterons belong to no class");

    let model = read_model_json(&dir.join("calibration.json")).unwrap();
    assert_eq!(model.species.len(), 3);
    assert_eq!(model.species[2].key, "13_211_11");
    for entry in &model.species {
        assert_eq!(entry.slices.len(), 10);
        assert!((entry.slices[0].p_lo - 0.0).abs() < 1e-12);
        assert!((entry.slices[9].p_hi - 3.0).abs() < 1e-12);
        let fitted = entry
            .slices
            .iter()
            .filter(|s| s.status == SliceStatus::Fitted)
            .count();
        assert!(fitted >= 8, "{}: only {fitted} slices fitted", entry.name);
    }

    // Proton peak sits near its true mass squared in a well-populated slice.
    let proton_mid = &model.species[0].slices[3];
    assert_eq!(proton_mid.status, SliceStatus::Fitted);
    assert!((proton_mid.mean - 0.88).abs() < 0.02, "mean = {}", proton_mid.mean);

    let inf = run_inference(&inference_config(&dir, test, 0.9)).unwrap();
    assert_eq!(inf.decisions.len(), 20_000);
    assert_eq!(inf.report.candidates, 20_000);
    assert!(inf.report.unknown_truth > 0);
    assert!(inf.report.background > 0);

    let protons = &inf.report.species[0];
    assert!(protons.purity.unwrap() > 0.95, "proton purity {:?}", protons.purity);
    assert!(protons.efficiency.unwrap() > 0.8, "proton efficiency {:?}", protons.efficiency);
    assert_eq!(protons.mismatched, protons.classified - protons.matched);

    // Far outside every peak: no usable density at all.
    let far = inf.engine.evaluate(1.5, 3.5);
    assert_eq!(far.label, Label::Background);
    assert_eq!(far.reason, Some(BackgroundReason::DivisionUnstable));

    // The lower bound of the momentum range belongs to no slice.
    let edge = inf.engine.evaluate(0.0, 0.88);
    assert_eq!(edge.reason, Some(BackgroundReason::DivisionUnstable));
}

#[test]
fn tighter_purity_cut_never_labels_more() {
    let dir = work_dir("purity");
    let train = write_sample(&dir, "train.csv", 11, 30_000);
    let test = write_sample(&dir, "test.csv", 12, 5_000);
    run_calibration(&calibration_config(&dir, train)).unwrap();

    let loose = run_inference(&inference_config(&dir, test.clone(), 0.5)).unwrap();
    let tight = run_inference(&inference_config(&dir, test, 0.99)).unwrap();
    assert!(tight.report.background >= loose.report.background);
    for (t, l) in tight.report.species.iter().zip(&loose.report.species) {
        assert!(t.classified <= l.classified);
    }
}

#[test]
fn missing_species_model_aborts_inference() {
    let dir = work_dir("missing");
    let train = write_sample(&dir, "train.csv", 5, 20_000);
    let test = write_sample(&dir, "test.csv", 6, 1_000);
    run_calibration(&calibration_config(&dir, train)).unwrap();

    let mut config = inference_config(&dir, test, 0.9);
    config.species.push("deuterons=1000010020".parse().unwrap());
    let err = run_inference(&config).unwrap_err();
    assert_eq!(err.exit_code(), 3);
    assert!(err.to_string().contains("1000010020"));
}

#[test]
fn inverted_momentum_range_is_rejected_before_ingest() {
    let dir = work_dir("range");
    let mut config = calibration_config(&dir, dir.join("no-such-list.txt"));
    config.p_min = 4.0;
    config.p_max = 1.0;
    let err = run_calibration(&config).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("malformed momentum range"));
}

#[test]
fn species_absent_from_the_sample_fails_calibration() {
    let dir = work_dir("ghost");
    let train = write_sample(&dir, "train.csv", 21, 20_000);
    let mut config = calibration_config(&dir, train);
    config.output = dir.join("ghost.json");
    config.species.push("ghost=99999".parse().unwrap());

    let err = run_calibration(&config).unwrap_err();
    assert_eq!(err.exit_code(), 3);
    assert!(err.to_string().contains("insufficient data"));
    assert!(!dir.join("ghost.json").exists());
}

#[test]
fn diagnostics_and_histograms_are_exported_per_momentum_slice() {
    let dir = work_dir("exports");
    let train = write_sample(&dir, "train.csv", 31, 30_000);
    let test = write_sample(&dir, "test.csv", 32, 5_000);
    let cal = run_calibration(&calibration_config(&dir, train)).unwrap();

    let hist_path = dir.join("slices.csv");
    write_slice_histograms_csv(&hist_path, &cal.models).unwrap();
    let mut reader = csv::Reader::from_path(&hist_path).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>().unwrap();
    assert_eq!(rows.len(), 3 * 10 * AxisRange::default().bins);
    let proton_counts: u64 = rows
        .iter()
        .filter(|r| &r[1] == "2212")
        .map(|r| r[6].parse::<u64>().unwrap())
        .sum();
    let proton_fills: u64 = cal.models[0]
        .slices()
        .iter()
        .map(|s| s.histogram().entries())
        .sum();
    assert_eq!(proton_counts, proton_fills);

    let inf = run_inference(&inference_config(&dir, test, 0.9)).unwrap();
    assert_eq!(inf.report.momentum_bins.len(), 10);
    let binned: u64 = inf.report.momentum_bins.iter().map(|b| b.candidates).sum();
    assert!(binned <= inf.report.candidates);
    for (i, species) in inf.report.species.iter().enumerate() {
        let matched: u64 = inf.report.momentum_bins.iter().map(|b| b.species[i].matched).sum();
        assert!(matched <= species.matched);
    }

    let json_path = dir.join("diagnostics.json");
    write_diagnostics_json(&json_path, &inf.report).unwrap();
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    let bins = json["momentum_bins"].as_array().unwrap();
    assert_eq!(bins.len(), 10);
    assert_eq!(bins[9]["p_hi"].as_f64(), Some(3.0));
    assert_eq!(bins[0]["species"].as_array().unwrap().len(), 3);
}
