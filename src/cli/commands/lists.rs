//! Key list commands.

use console::style;

use crate::config::Settings;
use crate::fetch::press::PRESS_SUMMARY_FILE;
use crate::sink::lists::{
    build_query_list, export_key_list, update_ignore_list, IGNORE_LIST_FILE, ISIN_LIST_FILE,
    PENDING_LIST_FILE, STOCK_CODE_LIST_FILE, STOCK_ID_LIST_FILE,
};

use super::KeyList;

impl KeyList {
    /// Export script and output file name.
    fn files(self) -> (&'static str, &'static str) {
        match self {
            KeyList::Isin => ("isin_export.sql", ISIN_LIST_FILE),
            KeyList::StockCode => ("stock_code_export.sql", STOCK_CODE_LIST_FILE),
            KeyList::StockId => ("stock_id_export.sql", STOCK_ID_LIST_FILE),
        }
    }
}

/// Compute the pending press-release id list.
pub fn cmd_build(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let lists = settings.lists_dir();
    let output = lists.join(PENDING_LIST_FILE);
    let stats = build_query_list(
        &lists.join(STOCK_ID_LIST_FILE),
        &lists.join(IGNORE_LIST_FILE),
        &settings.press_dir(),
        &output,
    )?;

    println!(
        "{} {} pending ids -> {}",
        style("✓").green(),
        stats.pending,
        output.display()
    );
    println!(
        "  {} {} total, {} ignored, {} already downloaded",
        style("→").dim(),
        stats.full,
        stats.ignored,
        stats.existing
    );
    Ok(())
}

/// Add ids saved in the last press run to the ignore list.
pub fn cmd_update_ignore(settings: &Settings) -> anyhow::Result<()> {
    let summary = settings.press_dir().join(PRESS_SUMMARY_FILE);
    if !summary.exists() {
        println!(
            "{} No press summary at {}",
            style("!").yellow(),
            summary.display()
        );
        return Ok(());
    }
    let ignore = settings.lists_dir().join(IGNORE_LIST_FILE);
    let added = update_ignore_list(&ignore, &summary)?;
    println!(
        "{} Added {} ids to {}",
        style("✓").green(),
        added,
        ignore.display()
    );
    Ok(())
}

/// Export a sorted unique key list from the database.
pub fn cmd_export(settings: &Settings, list: KeyList) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let (script, file) = list.files();
    let output = settings.lists_dir().join(file);
    let rows = export_key_list(&settings.database_path, &settings.sql_file(script), &output)?;
    println!(
        "{} {} keys -> {}",
        style("✓").green(),
        rows,
        output.display()
    );
    Ok(())
}
