//! Auditor report text processing.
//!
//! Three passes over the downloaded auditor report PDFs:
//! - `extract`: PDF to plain text with Poppler's `pdftotext`
//! - `slice`: drop financial statement blocks, keeping the opinion sections
//! - `flags`: scan for modified-opinion wording into a CSV of dummy variables

pub mod extract;
pub mod flags;
pub mod slice;

use std::path::{Path, PathBuf};

use rusqlite::params_from_iter;
use thiserror::Error;

use crate::sink::SinkError;

pub use extract::{extract_pdfs, ExtractSummary};
pub use flags::{scan_opinions, FlagSummary};
pub use slice::{slice_all, slice_text};

/// SQLite table holding the auditor report index.
pub const AUDITOR_REPORTS_TABLE: &str = "hkex_auditor_reports";

/// Errors that can occur while processing auditor reports.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Source not found: {0}")]
    SourceMissing(PathBuf),

    #[error("No text files in {0}")]
    NoInput(PathBuf),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Distinct non-blank `pdf_path` values of the auditor report index,
/// optionally restricted to `stock_codes`.
pub fn pdf_list(db_path: &Path, stock_codes: &[String]) -> Result<Vec<PathBuf>, ExtractionError> {
    if !db_path.exists() {
        return Err(ExtractionError::SourceMissing(db_path.to_path_buf()));
    }
    let conn = rusqlite::Connection::open(db_path)?;

    let filter = if stock_codes.is_empty() {
        String::new()
    } else {
        format!(
            "stock_code IN ({}) AND ",
            vec!["?"; stock_codes.len()].join(",")
        )
    };
    let sql = format!(
        "SELECT DISTINCT pdf_path FROM {} WHERE {}pdf_path IS NOT NULL AND TRIM(pdf_path) != ''",
        AUDITOR_REPORTS_TABLE, filter
    );

    let mut stmt = conn.prepare(&sql)?;
    let paths = stmt
        .query_map(params_from_iter(stock_codes.iter()), |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(
        "Found {} PDF paths in {}{}",
        paths.len(),
        AUDITOR_REPORTS_TABLE,
        if stock_codes.is_empty() {
            String::new()
        } else {
            format!(" (filtered by {} stock codes)", stock_codes.len())
        }
    );
    Ok(paths.into_iter().map(PathBuf::from).collect())
}

/// File stem of a stored path, accepting either separator.
pub(crate) fn document_stem(path: &Path) -> String {
    let name = path.to_string_lossy();
    let name = name.rsplit(['/', '\\']).next().unwrap_or_default();
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rusqlite::Connection;

    /// Seed an auditor report index with `(stock_code, pdf_path)` rows.
    pub(crate) fn seed_index(db_path: &Path, rows: &[(&str, Option<&str>)]) {
        let conn = Connection::open(db_path).unwrap();
        conn.execute(
            "CREATE TABLE hkex_auditor_reports (stock_code INTEGER, pdf_path TEXT)",
            [],
        )
        .unwrap();
        for (code, path) in rows {
            conn.execute(
                "INSERT INTO hkex_auditor_reports VALUES (?1, ?2)",
                rusqlite::params![code, path],
            )
            .unwrap();
        }
    }

    #[test]
    fn test_pdf_list_filters_blank_and_codes() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("hk.db");
        seed_index(
            &db,
            &[
                ("700", Some("pdfs/A.pdf")),
                ("700", Some("pdfs/A.pdf")),
                ("5", Some("  ")),
                ("5", None),
                ("8001", Some("pdfs/B.pdf")),
            ],
        );

        let all = pdf_list(&db, &[]).unwrap();
        assert_eq!(all.len(), 2);

        let subset = pdf_list(&db, &["8001".to_string()]).unwrap();
        assert_eq!(subset, vec![PathBuf::from("pdfs/B.pdf")]);
    }

    #[test]
    fn test_pdf_list_missing_database() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            pdf_list(&dir.path().join("none.db"), &[]),
            Err(ExtractionError::SourceMissing(_))
        ));
    }

    #[test]
    fn test_document_stem() {
        assert_eq!(document_stem(Path::new("a/b/20240320123.pdf")), "20240320123");
        assert_eq!(document_stem(Path::new("a\\b\\X.pdf")), "X");
    }
}
