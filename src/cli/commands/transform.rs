//! Init, normalize, bronze and silver commands.

use console::style;

use crate::bronze::{self, BronzeReport};
use crate::config::Settings;
use crate::normalize;
use crate::silver;

use super::{BoardArg, BronzeTarget};

/// Create the data directory layout.
pub fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    println!(
        "{} Initialized data directory {}",
        style("✓").green(),
        settings.data_dir.display()
    );
    println!(
        "  {} Database: {}",
        style("→").dim(),
        settings.database_path.display()
    );
    Ok(())
}

/// Normalize every raw workbook.
pub fn cmd_normalize(settings: &Settings, force: bool) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let report = normalize::normalize_dir(&settings.raw_dir(), &settings.normalized_dir(), force)?;

    println!(
        "{} Normalized {} workbooks",
        style("✓").green(),
        report.converted
    );
    if report.skipped > 0 {
        println!(
            "  {} {} already normalized (use --force to redo)",
            style("→").dim(),
            report.skipped
        );
    }
    if report.failed > 0 {
        println!(
            "  {} {} could not be decoded",
            style("!").yellow(),
            report.failed
        );
    }
    Ok(())
}

fn print_bronze(name: &str, report: &BronzeReport) {
    println!(
        "{} {}: {} rows from {} files -> {}",
        style("✓").green(),
        name,
        report.rows,
        report.files_processed,
        report.output.display()
    );
    if !report.files_skipped.is_empty() {
        println!(
            "  {} skipped (layout not found): {}",
            style("!").yellow(),
            report.files_skipped.join(", ")
        );
    }
    if !report.rejected.is_empty() {
        println!(
            "  {} {} rows rejected by key coercion",
            style("!").yellow(),
            report.rejected.len()
        );
    }
}

/// Build the selected bronze tables.
pub fn cmd_bronze(settings: &Settings, target: BronzeTarget) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let normalized = settings.normalized_dir();
    let bronze_dir = settings.bronze_dir();

    if matches!(target, BronzeTarget::Isin | BronzeTarget::All) {
        print_bronze("ISIN registry", &bronze::build_isin(&normalized, &bronze_dir)?);
    }
    if matches!(target, BronzeTarget::StockTypes | BronzeTarget::All) {
        let rows = bronze::build_stock_types(&normalized, &bronze_dir)?;
        println!("{} Stock types: {} rows", style("✓").green(), rows);
    }
    if matches!(target, BronzeTarget::NationalAgencies | BronzeTarget::All) {
        let rows = bronze::build_national_agencies(&normalized, &bronze_dir)?;
        println!("{} National agencies: {} rows", style("✓").green(), rows);
    }
    let boards = match target {
        BronzeTarget::Main => BoardArg::Main.boards(),
        BronzeTarget::Gem => BoardArg::Gem.boards(),
        BronzeTarget::All => BoardArg::All.boards(),
        _ => Vec::new(),
    };
    for board in boards {
        let report = bronze::build_listings(&normalized, &bronze_dir, board)?;
        print_bronze(&format!("{:?} listings", board), &report);
    }
    Ok(())
}

/// Build the selected silver tables.
pub fn cmd_silver(settings: &Settings, board: BoardArg) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    for board in board.boards() {
        let report = silver::build_silver(&settings.bronze_dir(), &settings.silver_dir(), board)?;
        println!(
            "{} {:?} silver: {} of {} rows joined -> {}",
            style("✓").green(),
            board,
            report.rows,
            report.input_rows,
            report.output.display()
        );
        if report.join.excluded > 0 {
            println!(
                "  {} {} rows had no ISIN registry match",
                style("!").yellow(),
                report.join.excluded
            );
        }
        if let Some(tranche) = &report.tranche {
            if !tranche.ambiguous.is_empty() || !tranche.orphaned.is_empty() {
                println!(
                    "  {} tranche rows: {} ambiguous matches, {} orphaned",
                    style("!").yellow(),
                    tranche.ambiguous.len(),
                    tranche.orphaned.len()
                );
            }
        }
    }
    Ok(())
}
