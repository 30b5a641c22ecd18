//! WRDS loader command.

use std::process::ExitCode;

use console::style;

use crate::config::Settings;
use crate::wrds::{default_loaders, run_loader};

/// Run the default loaders, or only the one writing `table`.
pub async fn cmd_wrds(settings: &Settings, table: Option<&str>) -> anyhow::Result<ExitCode> {
    let loaders: Vec<_> = default_loaders(settings)
        .into_iter()
        .filter(|l| table.is_none_or(|t| l.table == t))
        .collect();
    if loaders.is_empty() {
        anyhow::bail!("No WRDS loader writes table {}", table.unwrap_or_default());
    }

    let mut failed = 0;
    for loader in &loaders {
        println!(
            "{} {} -> {}",
            style("→").cyan(),
            loader.sql_file.display(),
            loader.table
        );
        match run_loader(&settings.database_path, settings.wrds.as_ref(), loader).await {
            Ok(rows) => println!(
                "{} Loaded {} rows into {}",
                style("✓").green(),
                rows,
                loader.table
            ),
            Err(e) => {
                failed += 1;
                println!("{} {}: {}", style("✗").red(), loader.table, e);
            }
        }
    }

    Ok(if failed > 0 {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}
