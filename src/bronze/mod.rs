//! Bronze stage: layout extraction from normalized sheets into per-category
//! record tables.

pub mod cell;
pub mod continuation;
pub mod isin;
pub mod key;
pub mod layout;
pub mod listings;
pub mod reference;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::models::{Sheet, Table, GEM_COLUMNS, ISIN_COLUMNS, MAIN_COLUMNS};
use crate::normalize::read_sheet;
use crate::sink::csv::write_table;

pub use key::{KeyRejection, RejectedRow};
pub use layout::LayoutError;

pub const MAIN_BRONZE: &str = "main_bronze.csv";
pub const GEM_BRONZE: &str = "gem_bronze.csv";
pub const ISIN_BRONZE: &str = "isino_bronze.csv";
pub const STOCK_TYPES_BRONZE: &str = "isino_stock_types.csv";
pub const NATIONAL_AGENCIES_BRONZE: &str = "isino_national_agencies.csv";

/// Accepted rows plus the rows dropped by key coercion.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub table: Table,
    pub rejected: Vec<RejectedRow>,
}

/// Outcome of one bronze build.
#[derive(Debug, Default)]
pub struct BronzeReport {
    pub files_processed: usize,
    /// Files skipped because their layout did not match.
    pub files_skipped: Vec<String>,
    pub rows: usize,
    pub rejected: Vec<RejectedRow>,
    pub output: PathBuf,
}

/// Listing report board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Board {
    Main,
    Gem,
}

impl Board {
    /// File name prefix of this board's reports (`Main_2010.csv`).
    pub fn prefix(&self) -> &'static str {
        match self {
            Board::Main => "Main_",
            Board::Gem => "GEM_",
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Board::Main => MAIN_COLUMNS,
            Board::Gem => GEM_COLUMNS,
        }
    }

    pub fn bronze_file(&self) -> &'static str {
        match self {
            Board::Main => MAIN_BRONZE,
            Board::Gem => GEM_BRONZE,
        }
    }

    pub fn extract(&self, sheet: &Sheet) -> Result<Extraction, LayoutError> {
        match self {
            Board::Main => listings::extract_main(sheet),
            Board::Gem => listings::extract_gem(sheet),
        }
    }
}

/// Normalized grids for one board, sorted by name.
pub fn listing_files(normalized_dir: &Path, board: Board) -> anyhow::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(normalized_dir)
        .with_context(|| format!("Failed to read {}", normalized_dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(board.prefix()) && n.ends_with(".csv"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Build the bronze table for one board from every normalized report.
///
/// A file whose layout does not match is skipped with a warning; the rest of
/// the batch still runs.
pub fn build_listings(normalized_dir: &Path, bronze_dir: &Path, board: Board) -> anyhow::Result<BronzeReport> {
    let files = listing_files(normalized_dir, board)?;
    tracing::info!("Found {} {} reports", files.len(), board.prefix().trim_end_matches('_'));

    let mut combined = Table::with_columns(board.columns());
    let mut report = BronzeReport::default();

    for path in &files {
        let sheet = match read_sheet(path) {
            Ok(sheet) => sheet,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", path.display(), e);
                report.files_skipped.push(path.display().to_string());
                continue;
            }
        };
        match board.extract(&sheet) {
            Ok(extraction) => {
                report.files_processed += 1;
                report.rejected.extend(extraction.rejected);
                combined.append(extraction.table)?;
            }
            Err(e) => {
                tracing::warn!("Skipping {}", e);
                report.files_skipped.push(sheet.name);
            }
        }
    }

    if !report.files_skipped.is_empty() {
        tracing::warn!(
            "{} of {} files skipped",
            report.files_skipped.len(),
            files.len()
        );
    }

    report.output = bronze_dir.join(board.bronze_file());
    report.rows = combined.len();
    write_table(&report.output, &combined)
        .with_context(|| format!("Failed to write {}", report.output.display()))?;
    Ok(report)
}

/// Build the ISIN registry from `isino`, `isinsehk` and `secstkorder`.
///
/// `isino` is required. A missing or mismatched `isinsehk` or `secstkorder`
/// is skipped with a warning.
pub fn build_isin(normalized_dir: &Path, bronze_dir: &Path) -> anyhow::Result<BronzeReport> {
    let mut report = BronzeReport::default();

    let isino_sheet = read_sheet(&normalized_dir.join("isino.csv"))?;
    let isino = isin::extract_isino(&isino_sheet)?;
    report.files_processed += 1;

    let isinsehk = match read_sheet(&normalized_dir.join("isinsehk.csv"))
        .map_err(anyhow::Error::from)
        .and_then(|s| isin::extract_isinsehk(&s).map_err(anyhow::Error::from))
    {
        Ok(extraction) => {
            report.files_processed += 1;
            extraction
        }
        Err(e) => {
            tracing::warn!("Skipping isinsehk: {}", e);
            report.files_skipped.push("isinsehk.csv".to_string());
            Extraction {
                table: Table::with_columns(&ISIN_COLUMNS[..ISIN_COLUMNS.len() - 1]),
                rejected: Vec::new(),
            }
        }
    };

    let names = match read_sheet(&normalized_dir.join("secstkorder.csv"))
        .map_err(anyhow::Error::from)
        .and_then(|s| isin::extract_security_names(&s).map_err(anyhow::Error::from))
    {
        Ok(extraction) => {
            report.files_processed += 1;
            extraction.table
        }
        Err(e) => {
            tracing::warn!("Skipping secstkorder: {}", e);
            report.files_skipped.push("secstkorder.csv".to_string());
            Table::with_columns(crate::models::SEC_NAME_COLUMNS)
        }
    };

    tracing::info!(
        "ISIN rows: isino {}, isinsehk {}, security names {}",
        isino.table.len(),
        isinsehk.table.len(),
        names.len()
    );

    let (registry, rejected) = isin::build_registry(isino, isinsehk, &names)?;
    report.rejected = rejected;
    report.rows = registry.len();
    report.output = bronze_dir.join(ISIN_BRONZE);
    write_table(&report.output, &registry)?;
    Ok(report)
}

/// Build the stock type lookup from `isino`.
pub fn build_stock_types(normalized_dir: &Path, bronze_dir: &Path) -> anyhow::Result<usize> {
    let sheet = read_sheet(&normalized_dir.join("isino.csv"))?;
    let table = reference::extract_stock_types(&sheet)?;
    write_table(&bronze_dir.join(STOCK_TYPES_BRONZE), &table)?;
    Ok(table.len())
}

/// Build the national numbering agency lookup from `isino`.
pub fn build_national_agencies(normalized_dir: &Path, bronze_dir: &Path) -> anyhow::Result<usize> {
    let sheet = read_sheet(&normalized_dir.join("isino.csv"))?;
    let table = reference::extract_national_agencies(&sheet)?;
    write_table(&bronze_dir.join(NATIONAL_AGENCIES_BRONZE), &table)?;
    Ok(table.len())
}
