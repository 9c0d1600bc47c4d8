//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the fitting and classification code stays clean and testable
//! - output changes are localized

use crate::classify::DiagnosticsReport;
use crate::domain::{ModelFile, SliceStatus};
use crate::fit::builder::FillStats;
use crate::io::ingest::EventSet;
use crate::report::{SpeciesFitSummary, summarize_model};

/// Dataset + routing + per-species fit outcome of a calibration pass.
pub fn format_calibration_summary(events: &EventSet, fill: &FillStats, model: &ModelFile) -> String {
    let mut out = String::new();

    out.push_str("=== tofpid - TOF mass-squared calibration ===\n");
    out.push_str(&format_dataset(events));
    out.push_str(&format!(
        "Slices: {} over p=({:.3}, {:.3}] GeV/c | m2 axis=[{:.3}, {:.3}] x {} bins\n",
        model.n_slices, model.p_min, model.p_max, model.m2_axis.min, model.m2_axis.max, model.m2_axis.bins
    ));

    out.push_str("\nRouting:\n");
    for (entry, routed) in model.species.iter().zip(&fill.routed) {
        out.push_str(&format!("  {:<12} {:>10}\n", truncate(&entry.name, 12), routed));
    }
    out.push_str(&format!("  {:<12} {:>10}\n", "(no class)", fill.unrouted));

    out.push_str("\nSpecies fits:\n");
    out.push_str(&format_fit_table(&summarize_model(model)));

    out
}

/// Header lines for `inspect`.
pub fn format_model_overview(model: &ModelFile) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Calibration: tool={} created={}\n",
        model.tool,
        model.created.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!(
        "Slices: {} over p=({:.3}, {:.3}] GeV/c\n",
        model.n_slices, model.p_min, model.p_max
    ));
    out.push_str(&format_fit_table(&summarize_model(model)));
    out
}

/// Slice parameters of every species at momentum `p`.
pub fn format_slice_params(model: &ModelFile, p: f64) -> String {
    let mut out = String::new();
    out.push_str(&format!("\nSlice parameters at p={p:.3} GeV/c:\n"));
    for entry in &model.species {
        let line = match entry.slices.iter().find(|s| p > s.p_lo && p <= s.p_hi) {
            None => "outside calibrated range".to_string(),
            Some(s) if s.status == SliceStatus::Degraded => {
                format!("({:.3}, {:.3}] degraded", s.p_lo, s.p_hi)
            }
            Some(s) => format!(
                "({:.3}, {:.3}] A={:.2} mean={:.5} sigma={:.5} chi2/ndf={}",
                s.p_lo,
                s.p_hi,
                s.amplitude,
                s.mean,
                s.sigma,
                if s.ndf > 0 {
                    format!("{:.3}", s.chi2 / s.ndf as f64)
                } else {
                    "-".to_string()
                }
            ),
        };
        out.push_str(&format!("  {:<12} {line}\n", truncate(&entry.name, 12)));
    }
    out
}

/// Inference diagnostics as a table.
pub fn format_diagnostics(events: &EventSet, report: &DiagnosticsReport) -> String {
    let mut out = String::new();

    out.push_str("=== tofpid - TOF particle identification ===\n");
    out.push_str(&format_dataset(events));
    out.push_str(&format!("Purity cut: {:.3}\n\n", report.purity_cut));

    out.push_str(
        format!(
            "{:<12} {:<16} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}\n",
            "species", "codes", "truth", "labeled", "matched", "wrong", "eff", "purity"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<12} {:-<16} {:-<10} {:-<10} {:-<10} {:-<10} {:-<10} {:-<10}\n",
            "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for s in &report.species {
        out.push_str(
            format!(
                "{:<12} {:<16} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}\n",
                truncate(&s.name, 12),
                truncate(&s.key, 16),
                s.truth_total,
                s.classified,
                s.matched,
                s.mismatched,
                fmt_pct(s.efficiency),
                fmt_pct(s.purity),
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out.push_str(&format!(
        "\nBackground: {} of {} candidates ({} with no usable density)\n",
        report.background, report.candidates, report.background_unstable
    ));
    if report.unknown_truth > 0 {
        out.push_str(&format!(
            "Candidates whose true code is in no class: {}\n",
            report.unknown_truth
        ));
    }
    out.push_str(&format_momentum_bins(report));

    out
}

/// Efficiency / purity per species in every momentum bin that saw candidates.
fn format_momentum_bins(report: &DiagnosticsReport) -> String {
    let mut out = String::new();
    let bins: Vec<_> = report.momentum_bins.iter().filter(|b| b.candidates > 0).collect();
    if bins.is_empty() {
        return out;
    }

    out.push_str("\nEfficiency / purity by momentum:\n");
    for bin in bins {
        let mut line = format!(
            "  ({:>6.3}, {:>6.3}] {:>9} cand {:>8} bkg",
            bin.p_lo, bin.p_hi, bin.candidates, bin.background
        );
        for s in &bin.species {
            line.push_str(&format!(
                "  {} {}/{}",
                truncate(&s.name, 12),
                fmt_pct(s.efficiency),
                fmt_pct(s.purity)
            ));
        }
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn format_dataset(events: &EventSet) -> String {
    let s = &events.stats;
    let mut out = format!(
        "Input: {} files | {} rows | {} candidates | {} unmatched | {} malformed\n",
        events.files.len(),
        events.rows_read,
        s.n_candidates,
        events.rows_unmatched,
        events.row_errors.len()
    );
    out.push_str(&format!(
        "Candidates: p=[{:.3}, {:.3}] GeV/c | m2=[{:.3}, {:.3}]\n",
        s.p_min, s.p_max, s.m2_min, s.m2_max
    ));
    out
}

fn format_fit_table(rows: &[SpeciesFitSummary]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<12} {:<16} {:>8} {:>8} {:>10} {:>10} {:>10} {:>16}\n",
            "species", "codes", "fitted", "degraded", "med mean", "med sigma", "chi2/ndf", "fitted p range"
        )
        .trim_end(),
    );
    out.push('\n');

    for r in rows {
        let range = r
            .fitted_range
            .map(|(lo, hi)| format!("({lo:.2}, {hi:.2}]"))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(
            format!(
                "{:<12} {:<16} {:>8} {:>8} {:>10} {:>10} {:>10} {:>16}\n",
                truncate(&r.name, 12),
                truncate(&r.key, 16),
                r.fitted,
                r.degraded,
                fmt_opt(r.median_mean, 4),
                fmt_opt(r.median_sigma, 4),
                fmt_opt(r.mean_chi2_ndf, 3),
                range
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    v.map(|x| format!("{x:.decimals$}"))
        .unwrap_or_else(|| "-".to_string())
}

fn fmt_pct(v: Option<f64>) -> String {
    v.map(|x| format!("{:.2}%", 100.0 * x))
        .unwrap_or_else(|| "-".to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
