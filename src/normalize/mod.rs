//! Spreadsheet normalizer.
//!
//! Each raw workbook (`.xls` or `.xlsx`) becomes one value-only CSV grid of its
//! first worksheet under the normalized directory. Cells keep their absolute
//! positions and every row is padded to the same width.

use std::fmt::Display;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use calamine::{open_workbook, Data, Range, Reader, Xls, Xlsx};
use chrono::Timelike;
use thiserror::Error;

use crate::models::{Cell, Sheet};
use crate::sink::csv::{read_records, write_records};
use crate::sink::SinkError;

/// Errors that can occur while normalizing a workbook.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Could not decode {path}: {detail}")]
    Decode { path: PathBuf, detail: String },

    #[error("Workbook has no worksheets: {0}")]
    NoSheets(PathBuf),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Counts from a directory normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Render a calamine value as grid text.
///
/// Integral floats drop the fractional part; dates render `YYYY-MM-DD`, with
/// `HH:MM:SS` appended when a time component is present.
pub fn render_cell(value: &Data) -> Cell {
    match value {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => (!s.is_empty()).then(|| s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(format_float(*f)),
        Data::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) if ndt.hour() == 0 && ndt.minute() == 0 && ndt.second() == 0 => {
                Some(ndt.format("%Y-%m-%d").to_string())
            }
            Some(ndt) => Some(ndt.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Some(format_float(dt.as_f64())),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

/// Convert a calamine range into a grid anchored at A1.
pub fn range_to_grid(range: &Range<Data>) -> Vec<Vec<Cell>> {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };
    let width = start_col as usize + range.width();

    let mut grid: Vec<Vec<Cell>> = vec![vec![None; width]; start_row as usize];
    for row in range.rows() {
        let mut out: Vec<Cell> = vec![None; start_col as usize];
        out.extend(row.iter().map(render_cell));
        out.resize(width, None);
        grid.push(out);
    }
    grid
}

fn first_range<R, RS>(workbook: &mut R, path: &Path) -> Result<Range<Data>, NormalizeError>
where
    RS: std::io::Read + std::io::Seek,
    R: Reader<RS>,
    R::Error: Display,
{
    let name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| NormalizeError::NoSheets(path.to_path_buf()))?;
    workbook
        .worksheet_range(&name)
        .map_err(|e| NormalizeError::Decode {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
}

/// Decode the first worksheet, trying OOXML first and legacy BIFF second
/// regardless of the file extension.
pub fn decode_first_sheet(path: &Path) -> Result<Vec<Vec<Cell>>, NormalizeError> {
    let xlsx_err = match open_workbook::<Xlsx<BufReader<File>>, _>(path) {
        Ok(mut wb) => {
            let range = first_range::<_, BufReader<File>>(&mut wb, path)?;
            return Ok(range_to_grid(&range));
        }
        Err(e) => e.to_string(),
    };
    match open_workbook::<Xls<BufReader<File>>, _>(path) {
        Ok(mut wb) => {
            let range = first_range::<_, BufReader<File>>(&mut wb, path)?;
            Ok(range_to_grid(&range))
        }
        Err(xls_err) => Err(NormalizeError::Decode {
            path: path.to_path_buf(),
            detail: format!("xlsx: {}; xls: {}", xlsx_err, xls_err),
        }),
    }
}

/// Normalized output path for a raw workbook.
pub fn normalized_path(raw: &Path, out_dir: &Path) -> PathBuf {
    let stem = raw
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    out_dir.join(format!("{}.csv", stem))
}

/// Whether a file is a workbook the normalizer should pick up.
pub fn is_workbook(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with("~$") {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xls") || e.eq_ignore_ascii_case("xlsx"))
}

/// Normalize one workbook to `out_path`.
pub fn normalize_file(raw: &Path, out_path: &Path) -> Result<usize, NormalizeError> {
    let grid = decode_first_sheet(raw)?;
    write_records(out_path, &grid)?;
    Ok(grid.len())
}

/// Normalize every workbook in `raw_dir`. Existing outputs are kept unless
/// `force` is set; undecodable files are skipped with a warning.
pub fn normalize_dir(raw_dir: &Path, out_dir: &Path, force: bool) -> Result<NormalizeReport, NormalizeError> {
    fs::create_dir_all(out_dir)?;
    let mut files: Vec<PathBuf> = fs::read_dir(raw_dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_workbook(p))
        .collect();
    files.sort();

    let mut report = NormalizeReport::default();
    for raw in files {
        let out = normalized_path(&raw, out_dir);
        if out.exists() && !force {
            tracing::debug!("Already normalized: {}", out.display());
            report.skipped += 1;
            continue;
        }
        match normalize_file(&raw, &out) {
            Ok(rows) => {
                tracing::info!("Normalized {} ({} rows)", raw.display(), rows);
                report.converted += 1;
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {}", raw.display(), e);
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

/// Read a normalized grid back as a [`Sheet`] named after its file.
pub fn read_sheet(path: &Path) -> Result<Sheet, NormalizeError> {
    let rows = read_records(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Sheet::new(name, rows))
}
