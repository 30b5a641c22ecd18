//! PDF text extraction with `pdftotext`.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{document_stem, pdf_list, ExtractionError};

/// Name of the cache listing text files already produced.
pub const EXTRACT_CACHE_FILE: &str = "extract_auditor_pdfs.cache";

/// Map a finished command to its stdout, or the matching error.
fn handle_cmd_output(
    result: std::io::Result<std::process::Output>,
    tool_name: &str,
    error_prefix: &str,
) -> Result<String, ExtractionError> {
    match result {
        Ok(output) => {
            if output.status.success() {
                Ok(String::from_utf8_lossy(&output.stdout).to_string())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(ExtractionError::ExtractionFailed(format!(
                    "{}: {}",
                    error_prefix,
                    stderr.trim()
                )))
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ExtractionError::ToolNotFound(tool_name.to_string()))
        }
        Err(e) => Err(ExtractionError::Io(e)),
    }
}

/// Extract the text layer of a PDF, keeping the physical layout.
pub fn pdf_to_text(pdf_path: &Path) -> Result<String, ExtractionError> {
    let output = Command::new("pdftotext")
        .arg("-layout")
        .arg(pdf_path)
        .arg("-")
        .output();
    handle_cmd_output(
        output,
        "pdftotext",
        &format!("pdftotext failed on {}", pdf_path.display()),
    )
}

/// Text file name for a stored PDF path.
pub fn text_file_name(pdf_path: &Path) -> String {
    format!("{}.txt", document_stem(pdf_path))
}

/// Entries of the extraction cache. A missing cache is empty.
pub fn read_cache(path: &Path) -> Result<HashSet<String>, ExtractionError> {
    if !path.exists() {
        return Ok(HashSet::new());
    }
    Ok(fs::read_to_string(path)?
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

fn append_cache(path: &Path, name: &str) -> Result<(), ExtractionError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", name)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub total: usize,
    pub extracted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Convert every PDF in `pdf_paths` not yet in the cache.
///
/// Relative PDF paths are resolved against `base_dir`. A missing `pdftotext`
/// aborts the run; any other per-file problem is counted and logged.
pub fn extract_files<F>(
    pdf_paths: &[PathBuf],
    base_dir: &Path,
    text_dir: &Path,
    cache_path: &Path,
    mut convert: F,
) -> Result<ExtractSummary, ExtractionError>
where
    F: FnMut(&Path) -> Result<String, ExtractionError>,
{
    fs::create_dir_all(text_dir)?;
    if let Some(parent) = cache_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let processed = read_cache(cache_path)?;

    let mut summary = ExtractSummary {
        total: pdf_paths.len(),
        ..Default::default()
    };

    for (idx, stored) in pdf_paths.iter().enumerate() {
        let txt_name = text_file_name(stored);
        if processed.contains(&txt_name) {
            summary.skipped += 1;
            continue;
        }

        let pdf_path = if stored.is_absolute() || stored.exists() {
            stored.clone()
        } else {
            base_dir.join(stored)
        };
        if !pdf_path.exists() {
            tracing::warn!("[{}/{}] Missing PDF {}", idx + 1, summary.total, stored.display());
            summary.failed += 1;
            continue;
        }

        let text = match convert(&pdf_path) {
            Ok(text) => text,
            Err(e @ ExtractionError::ToolNotFound(_)) => return Err(e),
            Err(e) => {
                tracing::warn!("[{}/{}] {}", idx + 1, summary.total, e);
                summary.failed += 1;
                continue;
            }
        };

        if let Err(e) = fs::write(text_dir.join(&txt_name), text) {
            tracing::warn!("Failed to save {}: {}", txt_name, e);
            summary.failed += 1;
            continue;
        }
        append_cache(cache_path, &txt_name)?;
        summary.extracted += 1;

        if summary.extracted % 50 == 0 {
            tracing::info!(
                "Progress: {} extracted, {} skipped, {} failed [{}/{}]",
                summary.extracted,
                summary.skipped,
                summary.failed,
                idx + 1,
                summary.total
            );
        }
    }

    tracing::info!(
        "Extraction complete: {} extracted, {} skipped, {} failed",
        summary.extracted,
        summary.skipped,
        summary.failed
    );
    Ok(summary)
}

/// Extract the PDFs listed in the auditor report index with `pdftotext`.
pub fn extract_pdfs(
    db_path: &Path,
    stock_codes: &[String],
    base_dir: &Path,
    text_dir: &Path,
    cache_path: &Path,
) -> Result<ExtractSummary, ExtractionError> {
    let pdf_paths = pdf_list(db_path, stock_codes)?;
    if pdf_paths.is_empty() {
        tracing::warn!("No PDF paths found in the auditor report index");
    }
    extract_files(&pdf_paths, base_dir, text_dir, cache_path, pdf_to_text)
}
