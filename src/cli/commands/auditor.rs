//! Auditor report text commands.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use console::style;

use crate::auditor::extract::EXTRACT_CACHE_FILE;
use crate::auditor::flags::FLAGS_FILE;
use crate::auditor::{extract_pdfs, scan_opinions, slice_all};
use crate::config::{resolve_in_data_dir, Settings};
use crate::sink::lists::read_list;

/// Optional stock code subset read by the extract and flag commands.
const CODES_SUBSET_FILE: &str = "stock_codes_subset.txt";

/// Stock codes to restrict to; empty means every indexed report.
fn stock_codes(settings: &Settings, codes_file: Option<&Path>) -> anyhow::Result<Vec<String>> {
    let path: PathBuf = match codes_file {
        Some(path) => resolve_in_data_dir(settings, path),
        None => {
            let default = settings.data_dir.join(CODES_SUBSET_FILE);
            if !default.exists() {
                return Ok(Vec::new());
            }
            default
        }
    };
    if !path.exists() {
        anyhow::bail!("Stock code file not found: {}", path.display());
    }
    let codes = read_list(&path)?;
    tracing::info!("Restricting to {} stock codes from {}", codes.len(), path.display());
    Ok(codes)
}

/// Convert indexed auditor report PDFs to text.
pub fn cmd_extract_text(settings: &Settings, codes_file: Option<&Path>) -> anyhow::Result<ExitCode> {
    settings.ensure_directories()?;
    let codes = stock_codes(settings, codes_file)?;
    let text_dir = settings.auditor_text_dir();
    let summary = extract_pdfs(
        &settings.database_path,
        &codes,
        Path::new("."),
        &text_dir,
        &settings.processed_dir().join(EXTRACT_CACHE_FILE),
    )?;

    println!(
        "{} Extracted {} of {} reports -> {}",
        style("✓").green(),
        summary.extracted,
        summary.total,
        text_dir.display()
    );
    if summary.skipped > 0 {
        println!(
            "  {} {} already extracted",
            style("→").dim(),
            summary.skipped
        );
    }
    if summary.failed > 0 {
        println!("  {} {} failed", style("✗").red(), summary.failed);
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

/// Slice extracted text down to the opinion sections.
pub fn cmd_slice(settings: &Settings) -> anyhow::Result<ExitCode> {
    let out_dir = settings.auditor_sliced_dir();
    let files = slice_all(&settings.auditor_text_dir(), &out_dir)?;
    println!(
        "{} Sliced {} files -> {}",
        style("✓").green(),
        files,
        out_dir.display()
    );
    Ok(ExitCode::SUCCESS)
}

/// Scan extracted text for modified-opinion wording.
pub fn cmd_flags(settings: &Settings, codes_file: Option<&Path>) -> anyhow::Result<ExitCode> {
    settings.ensure_directories()?;
    let codes = stock_codes(settings, codes_file)?;
    let output = settings.processed_dir().join(FLAGS_FILE);
    let summary = scan_opinions(
        &settings.database_path,
        &codes,
        &settings.auditor_text_dir(),
        &output,
    )?;

    println!(
        "{} Flagged {} reports ({} rows) -> {}",
        style("✓").green(),
        summary.processed,
        summary.total,
        output.display()
    );
    if summary.skipped > 0 {
        println!(
            "  {} {} already flagged",
            style("→").dim(),
            summary.skipped
        );
    }
    if summary.failed > 0 {
        println!(
            "  {} {} had no extracted text",
            style("!").yellow(),
            summary.failed
        );
    }
    Ok(ExitCode::SUCCESS)
}
