//! Full pipeline command.

use std::process::ExitCode;

use console::style;

use crate::config::Settings;
use crate::pipeline::{any_failed, format_summary, run_pipeline, RunOptions, StageStatus};

/// Run every stage and print the summary table.
pub async fn cmd_run(settings: &Settings, offline: bool, skip_wrds: bool) -> anyhow::Result<ExitCode> {
    println!(
        "{} Running pipeline in {}",
        style("→").cyan(),
        settings.data_dir.display()
    );

    let outcomes = run_pipeline(settings, RunOptions { offline, skip_wrds }).await?;

    println!();
    print!("{}", format_summary(&outcomes));
    println!();

    for outcome in &outcomes {
        if let StageStatus::Failed(error) = &outcome.status {
            println!("{} {}: {}", style("✗").red(), outcome.name, error);
        }
    }

    if any_failed(&outcomes) {
        let failed = outcomes.iter().filter(|o| o.is_failed()).count();
        println!(
            "{} Pipeline finished with {} failed stages",
            style("!").yellow(),
            failed
        );
        Ok(ExitCode::from(1))
    } else {
        println!("{} Pipeline finished", style("✓").green());
        Ok(ExitCode::SUCCESS)
    }
}
