//! SQLite load, script and export commands.

use std::path::{Path, PathBuf};

use console::style;

use crate::config::{resolve_in_data_dir, OutputFormat, Settings};
use crate::sink::{export, sqlite};

/// A script path as given, or the same name under the SQL directory.
fn resolve_sql(settings: &Settings, file: &Path) -> PathBuf {
    if file.exists() {
        return file.to_path_buf();
    }
    let candidate = settings.sql_dir.join(file);
    if candidate.exists() {
        candidate
    } else {
        file.to_path_buf()
    }
}

/// Replace a table with the contents of a CSV file.
pub fn cmd_load_csv(settings: &Settings, file: &Path, table: &str) -> anyhow::Result<()> {
    let csv_path = resolve_in_data_dir(settings, file);
    let rows = sqlite::load_csv(&settings.database_path, &csv_path, table)?;
    println!(
        "{} Loaded {} rows into {} ({})",
        style("✓").green(),
        rows,
        table,
        settings.database_path.display()
    );
    Ok(())
}

/// Execute a multi-statement script.
pub fn cmd_sql_run(settings: &Settings, file: &Path) -> anyhow::Result<()> {
    let sql_path = resolve_sql(settings, file);
    sqlite::run_sql_file(&settings.database_path, &sql_path)?;
    println!("{} Executed {}", style("✓").green(), sql_path.display());
    Ok(())
}

/// Export every query of a script.
pub fn cmd_export(
    settings: &Settings,
    file: &Path,
    format: Option<OutputFormat>,
    output_dir: Option<&Path>,
    output_file: Option<&Path>,
) -> anyhow::Result<()> {
    let sql_path = resolve_sql(settings, file);
    let format = format.unwrap_or(settings.output_format);
    let output_dir = output_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| settings.processed_dir());
    std::fs::create_dir_all(&output_dir)?;

    let files = export::export_sql_file(
        &settings.database_path,
        &sql_path,
        format,
        &output_dir,
        output_file,
    )?;
    for file in &files {
        println!(
            "{} {} rows -> {}",
            style("✓").green(),
            file.rows,
            file.path.display()
        );
    }
    Ok(())
}
