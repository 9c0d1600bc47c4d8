//! Event-source ingest and normalization.
//!
//! This module turns a file list of candidate CSVs into a clean in-memory set of
//! `Candidate`s that calibration and inference can iterate as often as needed.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (files in list order, rows in file order)
//! - **Separation of concerns**: no fitting or classification logic here

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use csv::StringRecord;
use log::{debug, info, warn};

use crate::domain::Candidate;
use crate::error::AppError;

const MOMENTUM_COLUMNS: [&str; 4] = ["p", "qp", "momentum", "qp_tof"];
const MASS2_COLUMNS: [&str; 3] = ["mass2", "m2", "mass2_tof"];
const CODE_COLUMNS: [&str; 3] = ["pdg", "mc_pdg", "true_pdg"];
const MATCH_COLUMNS: [&str; 2] = ["match", "tof_match"];

/// Summary stats about the candidates actually kept.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    pub n_candidates: usize,
    pub p_min: f64,
    pub p_max: f64,
    pub m2_min: f64,
    pub m2_max: f64,
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub file: PathBuf,
    pub line: usize,
    pub message: String,
}

/// Ingest output: candidates + stats + bookkeeping.
#[derive(Debug, Clone)]
pub struct EventSet {
    pub candidates: Vec<Candidate>,
    pub stats: DatasetStats,
    pub files: Vec<PathBuf>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    /// Rows dropped because they had no valid time-of-flight match.
    pub rows_unmatched: usize,
}

struct Columns {
    p: usize,
    m2: usize,
    code: usize,
    matched: Option<usize>,
}

/// Read a file list: one path per line, `#` comments and blank lines ignored.
///
/// Relative paths are resolved against the list's own directory.
pub fn read_filelist(path: &Path) -> Result<Vec<PathBuf>, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to open file list '{}': {e}", path.display())))?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));

    let files: Vec<PathBuf> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| {
            let p = PathBuf::from(l);
            if p.is_absolute() { p } else { base.join(p) }
        })
        .collect();

    if files.is_empty() {
        return Err(AppError::new(2, format!("File list '{}' names no event files.", path.display())));
    }
    Ok(files)
}

/// Load every event file named by a file list.
pub fn load_events(filelist: &Path) -> Result<EventSet, AppError> {
    let files = read_filelist(filelist)?;
    load_event_files(&files)
}

/// Load and concatenate candidate CSVs.
pub fn load_event_files(files: &[PathBuf]) -> Result<EventSet, AppError> {
    let mut candidates = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;
    let mut rows_unmatched = 0usize;

    for path in files {
        let before = candidates.len();
        let file = File::open(path)
            .map_err(|e| AppError::new(2, format!("Failed to open event file '{}': {e}", path.display())))?;

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let headers = reader
            .headers()
            .map_err(|e| AppError::new(2, format!("Failed to read headers of '{}': {e}", path.display())))?
            .clone();
        let columns = resolve_columns(&build_header_map(&headers), path)?;

        for (idx, result) in reader.records().enumerate() {
            // +2: records start after the header line and lines are 1-based.
            let line = idx + 2;
            rows_read += 1;

            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    row_errors.push(RowError {
                        file: path.clone(),
                        line,
                        message: format!("CSV parse error: {e}"),
                    });
                    continue;
                }
            };

            match parse_row(&record, &columns) {
                Ok(Some(c)) => candidates.push(c),
                Ok(None) => rows_unmatched += 1,
                Err(message) => row_errors.push(RowError {
                    file: path.clone(),
                    line,
                    message,
                }),
            }
        }

        debug!("{}: {} candidates", path.display(), candidates.len() - before);
    }

    if !row_errors.is_empty() {
        warn!("skipped {} malformed rows", row_errors.len());
    }

    let stats = compute_stats(&candidates)
        .ok_or_else(|| AppError::new(3, "No valid candidates remain after ingest."))?;
    info!(
        "read {} rows from {} files: {} candidates, {} unmatched, {} malformed",
        rows_read,
        files.len(),
        stats.n_candidates,
        rows_unmatched,
        row_errors.len()
    );

    Ok(EventSet {
        candidates,
        stats,
        files: files.to_vec(),
        row_errors,
        rows_read,
        rows_unmatched,
    })
}

/// Write candidates as an event CSV readable by [`load_event_files`].
pub fn write_events_csv(path: &Path, candidates: &[Candidate]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create event file '{}': {e}", path.display())))?;

    writer
        .write_record(["p", "mass2", "pdg", "tof_match"])
        .map_err(|e| AppError::new(2, format!("Failed to write event header: {e}")))?;
    for (i, c) in candidates.iter().enumerate() {
        writer
            .write_record([
                format!("{:.6}", c.p),
                format!("{:.6}", c.m2),
                c.true_code.to_string(),
                (i + 1).to_string(),
            ])
            .map_err(|e| AppError::new(2, format!("Failed to write event row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush event file: {e}")))?;
    Ok(())
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn find_column(header_map: &HashMap<String, usize>, aliases: &[&str]) -> Option<usize> {
    aliases.iter().find_map(|a| header_map.get(*a).copied())
}

fn resolve_columns(header_map: &HashMap<String, usize>, path: &Path) -> Result<Columns, AppError> {
    let missing = |what: &str, aliases: &[&str]| {
        AppError::new(
            2,
            format!(
                "'{}': missing {what} column (expected one of: {})",
                path.display(),
                aliases.join(", ")
            ),
        )
    };

    Ok(Columns {
        p: find_column(header_map, &MOMENTUM_COLUMNS).ok_or_else(|| missing("momentum", &MOMENTUM_COLUMNS))?,
        m2: find_column(header_map, &MASS2_COLUMNS).ok_or_else(|| missing("mass-squared", &MASS2_COLUMNS))?,
        code: find_column(header_map, &CODE_COLUMNS).ok_or_else(|| missing("particle code", &CODE_COLUMNS))?,
        matched: find_column(header_map, &MATCH_COLUMNS),
    })
}

/// `Ok(None)` for rows without a valid match (match index `<= 0`).
fn parse_row(record: &StringRecord, columns: &Columns) -> Result<Option<Candidate>, String> {
    if let Some(idx) = columns.matched {
        let raw = get_required(record, idx, "match")?;
        let matched = parse_f64(raw, "match")?;
        if matched <= 0.0 {
            return Ok(None);
        }
    }

    let p = parse_f64(get_required(record, columns.p, "momentum")?, "momentum")?;
    let m2 = parse_f64(get_required(record, columns.m2, "mass2")?, "mass2")?;
    let true_code = parse_code(get_required(record, columns.code, "pdg")?)?;

    Ok(Some(Candidate { p, m2, true_code }))
}

fn get_required<'a>(record: &'a StringRecord, idx: usize, name: &str) -> Result<&'a str, String> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn parse_f64(s: &str, name: &str) -> Result<f64, String> {
    let v = s
        .parse::<f64>()
        .map_err(|_| format!("Invalid `{name}` value '{s}'"))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("Non-finite `{name}` value '{s}'"))
    }
}

/// Particle codes may be written as floats by tree-to-CSV converters (`211.0`).
fn parse_code(s: &str) -> Result<i32, String> {
    if let Ok(code) = s.parse::<i32>() {
        return Ok(code);
    }
    let v = parse_f64(s, "pdg")?;
    if v.fract() == 0.0 && v >= i32::MIN as f64 && v <= i32::MAX as f64 {
        Ok(v as i32)
    } else {
        Err(format!("Invalid particle code '{s}'"))
    }
}

fn compute_stats(candidates: &[Candidate]) -> Option<DatasetStats> {
    if candidates.is_empty() {
        return None;
    }
    let mut stats = DatasetStats {
        n_candidates: candidates.len(),
        p_min: f64::INFINITY,
        p_max: f64::NEG_INFINITY,
        m2_min: f64::INFINITY,
        m2_max: f64::NEG_INFINITY,
    };
    for c in candidates {
        stats.p_min = stats.p_min.min(c.p);
        stats.p_max = stats.p_max.max(c.p);
        stats.m2_min = stats.m2_min.min(c.m2);
        stats.m2_max = stats.m2_max.max(c.m2);
    }
    Some(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tofpid-ingest-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn loads_rows_skips_unmatched_and_reports_bad_rows() {
        let dir = temp_dir("rows");
        let events = dir.join("events.csv");
        fs::write(
            &events,
            "\u{feff}QP_TOF,Mass2,MC_PDG,tof_match\n\
             1.5,0.88,2212,3\n\
             2.0,0.24,321.0,1\n\
             2.5,0.02,211,-1\n\
             abc,0.02,211,4\n\
             3.0,0.02,211\n",
        )
        .unwrap();
        let list = dir.join("filelist.txt");
        fs::write(&list, "# training\nevents.csv\n\n").unwrap();

        let set = load_events(&list).unwrap();
        assert_eq!(set.rows_read, 5);
        assert_eq!(set.candidates.len(), 2);
        assert_eq!(set.rows_unmatched, 1);
        assert_eq!(set.row_errors.len(), 2);
        assert_eq!(set.row_errors[0].line, 5);
        assert_eq!(set.candidates[1].true_code, 321);
        assert!((set.stats.p_max - 2.0).abs() < 1e-12);
    }

    #[test]
    fn missing_required_column_is_a_schema_error() {
        let dir = temp_dir("schema");
        let events = dir.join("events.csv");
        fs::write(&events, "p,pdg\n1.0,211\n").unwrap();
        let err = load_event_files(&[events]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("mass-squared"));
    }

    #[test]
    fn missing_filelist_is_an_input_error() {
        let err = load_events(Path::new("/definitely/not/here/filelist.txt")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn written_events_read_back() {
        let dir = temp_dir("write");
        let path = dir.join("gen.csv");
        let candidates = vec![
            Candidate { p: 1.25, m2: 0.2437, true_code: 321 },
            Candidate { p: 4.0, m2: -0.05, true_code: -11 },
        ];
        write_events_csv(&path, &candidates).unwrap();
        let set = load_event_files(&[path]).unwrap();
        assert_eq!(set.candidates, candidates);
    }
}
