//! Modified-opinion flags from extracted report text.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::models::Table;
use crate::sink::csv::{read_table, write_table};

use super::{document_stem, pdf_list, ExtractionError};

pub const FLAGS_FILE: &str = "auditor_opinion_flags.csv";

/// Flag columns with their patterns, matched against lowercased text with
/// whitespace runs collapsed.
static PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("qualified_opinion", r"\bqualified opinion\b"),
        ("adverse_opinion", r"\badverse opinion\b"),
        ("disclaimer_of_opinion", r"\bdisclaimer (of )?opinion\b"),
        ("emphasis_of_matter", r"\bemphasis of matter\b"),
        (
            "going_concern",
            r"material uncertainty (related to|regarding) going concern",
        ),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).unwrap()))
    .collect()
});

static LEADING_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

pub fn flag_columns() -> Vec<&'static str> {
    let mut columns = vec!["document_name", "report_date"];
    columns.extend(PATTERNS.iter().map(|(name, _)| *name));
    columns
}

/// `YYYY-MM-DD` from a leading `YYYYMMDD` in the document name.
pub fn report_date(document: &str) -> Option<String> {
    LEADING_DATE
        .captures(document)
        .map(|c| format!("{}-{}-{}", &c[1], &c[2], &c[3]))
}

/// One 0/1 value per flag column.
pub fn scan_text(text: &str) -> Vec<bool> {
    let text = WHITESPACE.replace_all(text, " ").to_lowercase();
    PATTERNS.iter().map(|(_, re)| re.is_match(&text)).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Rows in the output file after the run.
    pub total: usize,
}

/// Existing flag table, or an empty one when the file is missing, empty or
/// unreadable.
fn load_existing(path: &Path) -> Table {
    let empty = || Table::with_columns(&flag_columns());
    if !path.exists() || path.metadata().map(|m| m.len() == 0).unwrap_or(true) {
        return empty();
    }
    match read_table(path) {
        Ok(table) if table.column_index("document_name").is_some() => table,
        Ok(_) => {
            tracing::warn!("{} has no document_name column, starting over", path.display());
            empty()
        }
        Err(e) => {
            tracing::warn!("Could not read {}: {}, starting over", path.display(), e);
            empty()
        }
    }
}

/// Scan the text of every document in `documents` not already in
/// `output_path`, appending one flag row per document.
pub fn scan_documents(
    documents: &[PathBuf],
    text_dir: &Path,
    output_path: &Path,
) -> Result<FlagSummary, ExtractionError> {
    let mut table = load_existing(output_path);
    let name_col = table.require_column("document_name").map_err(|e| {
        ExtractionError::ExtractionFailed(format!("{}: {}", output_path.display(), e))
    })?;
    let mut seen: HashSet<String> = table
        .column_values(name_col)
        .flatten()
        .map(|name| document_stem(Path::new(name)))
        .collect();

    let mut summary = FlagSummary::default();
    for (idx, document) in documents.iter().enumerate() {
        let stem = document_stem(document);
        if !seen.insert(stem.clone()) {
            summary.skipped += 1;
            continue;
        }

        let txt_path = text_dir.join(format!("{}.txt", stem));
        let text = std::fs::read(&txt_path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();
        if text.is_empty() {
            tracing::warn!("[{}/{}] Text missing for {}", idx + 1, documents.len(), stem);
            summary.failed += 1;
            seen.remove(&stem);
            continue;
        }

        let mut values = vec![Some(stem.clone()), report_date(&stem)];
        values.extend(
            scan_text(&text)
                .into_iter()
                .map(|hit| Some(if hit { "1" } else { "0" }.to_string())),
        );
        let by_name: Vec<(&str, Option<String>)> = flag_columns().into_iter().zip(values).collect();
        let row = table
            .columns()
            .iter()
            .map(|c| {
                by_name
                    .iter()
                    .find(|(name, _)| *name == c.as_str())
                    .and_then(|(_, v)| v.clone())
            })
            .collect();
        table.push_row(row);
        summary.processed += 1;

        if summary.processed % 50 == 0 {
            write_table(output_path, &table)?;
            tracing::info!(
                "Progress: {} processed, {} skipped, {} failed [{}/{}]",
                summary.processed,
                summary.skipped,
                summary.failed,
                idx + 1,
                documents.len()
            );
        }
    }

    write_table(output_path, &table)?;
    summary.total = table.len();
    tracing::info!(
        "Opinion scan complete: {} processed, {} skipped, {} failed, {} rows in {}",
        summary.processed,
        summary.skipped,
        summary.failed,
        summary.total,
        output_path.display()
    );
    Ok(summary)
}

/// Flag every document listed in the auditor report index.
pub fn scan_opinions(
    db_path: &Path,
    stock_codes: &[String],
    text_dir: &Path,
    output_path: &Path,
) -> Result<FlagSummary, ExtractionError> {
    let documents = pdf_list(db_path, stock_codes)?;
    if documents.is_empty() {
        tracing::warn!("No documents found in the auditor report index");
    }
    scan_documents(&documents, text_dir, output_path)
}
