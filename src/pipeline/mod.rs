//! Full pipeline runner.
//!
//! Stages run strictly in order. A failing stage is recorded and the run
//! moves on, so one broken source never blocks the stages after it; the
//! summary decides the exit status.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};

use crate::bronze::{self, Board};
use crate::config::Settings;
use crate::fetch::{self, FetchReport, HttpClient};
use crate::normalize;
use crate::silver;
use crate::sink::lists::{export_key_list, ISIN_LIST_FILE, STOCK_CODE_LIST_FILE};
use crate::sink::sqlite::load_csv;
use crate::wrds;

/// CSV files loaded into SQLite after the silver stage, with their tables.
pub const CSV_LOADS: &[(&str, &str)] = &[
    ("silver/gem_silver.csv", "hkex_gem"),
    ("silver/main_silver.csv", "hkex_main"),
    ("bronze/isino_stock_types.csv", "desc_hkex_stock_types"),
    ("bronze/isino_national_agencies.csv", "desc_hkex_national_agencies"),
    ("raw/auditor_reports.csv", "hkex_auditor_reports"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Success,
    Failed(String),
    Skipped(&'static str),
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageStatus::Success => f.write_str("success"),
            StageStatus::Failed(_) => f.write_str("failed"),
            StageStatus::Skipped(_) => f.write_str("skipped"),
        }
    }
}

/// Result of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub name: String,
    pub status: StageStatus,
    pub rows: usize,
    pub elapsed: Duration,
}

impl StageOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, StageStatus::Failed(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Skip every stage that needs the network.
    pub offline: bool,
    pub skip_wrds: bool,
}

/// Collects stage outcomes in run order.
#[derive(Debug, Default)]
pub struct Pipeline {
    outcomes: Vec<StageOutcome>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one stage, recording its row count or failure.
    pub async fn stage<F>(&mut self, name: &str, work: F)
    where
        F: Future<Output = anyhow::Result<usize>>,
    {
        tracing::info!("Stage: {}", name);
        let start = Instant::now();
        let result = work.await;
        let elapsed = start.elapsed();

        let (status, rows) = match result {
            Ok(rows) => {
                tracing::info!("Done: {} ({} rows, {:.1}s)", name, rows, elapsed.as_secs_f64());
                (StageStatus::Success, rows)
            }
            Err(e) => {
                tracing::error!("Failed: {}: {:#}", name, e);
                (StageStatus::Failed(format!("{:#}", e)), 0)
            }
        };
        self.outcomes.push(StageOutcome {
            name: name.to_string(),
            status,
            rows,
            elapsed,
        });
    }

    pub fn skip(&mut self, name: &str, reason: &'static str) {
        tracing::info!("Skipping {}: {}", name, reason);
        self.outcomes.push(StageOutcome {
            name: name.to_string(),
            status: StageStatus::Skipped(reason),
            rows: 0,
            elapsed: Duration::ZERO,
        });
    }

    pub fn outcomes(&self) -> &[StageOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<StageOutcome> {
        self.outcomes
    }
}

/// Turn a download report into a stage result: the files available locally,
/// or an error when any download failed.
fn fetch_result(what: &str, report: FetchReport) -> anyhow::Result<usize> {
    if report.failed > 0 {
        bail!(
            "{} of {} {} downloads failed",
            report.failed,
            report.failed + report.available(),
            what
        );
    }
    Ok(report.available())
}

async fn fetch_stages(pipeline: &mut Pipeline, settings: &Settings) {
    let client = match HttpClient::from_settings(settings) {
        Ok(client) => client,
        Err(e) => {
            for name in ["ISIN download", "Listings download", "Auditor report index", "Auditor PDFs"] {
                pipeline
                    .stage(name, async { Err(anyhow::anyhow!("HTTP client unavailable: {}", e)) })
                    .await;
            }
            return;
        }
    };
    let raw_dir = settings.raw_dir();
    let pdf_dir = settings.auditor_pdf_dir();

    pipeline
        .stage("ISIN download", async {
            fetch_result("ISIN", fetch::isin::fetch_isin_files(&client, &raw_dir).await)
        })
        .await;

    pipeline
        .stage("Listings download", async {
            let main = fetch::listings::fetch_board(&client, &raw_dir, Board::Main).await;
            let gem = fetch::listings::fetch_board(&client, &raw_dir, Board::Gem).await;
            Ok(fetch_result("Main listing", main)? + fetch_result("GEM listing", gem)?)
        })
        .await;

    pipeline
        .stage("Auditor report index", async {
            Ok(fetch::auditor::fetch_index(&client, &raw_dir, &pdf_dir).await?)
        })
        .await;

    pipeline
        .stage("Auditor PDFs", async {
            let links = fetch::pdfs::list_pdf_links(&client).await?;
            let result =
                fetch::pdfs::download_pdfs(&client, links, &pdf_dir, settings.max_workers, None).await;
            if result.failed > 0 {
                bail!("{} of {} PDF downloads failed", result.failed, result.total());
            }
            Ok(result.downloaded + result.skipped)
        })
        .await;
}

async fn transform_stages(pipeline: &mut Pipeline, settings: &Settings) {
    let raw = settings.raw_dir();
    let normalized = settings.normalized_dir();
    let bronze_dir = settings.bronze_dir();
    let silver_dir = settings.silver_dir();

    pipeline
        .stage("Normalize", async {
            let report = normalize::normalize_dir(&raw, &normalized, false)?;
            Ok(report.converted + report.skipped)
        })
        .await;
    pipeline
        .stage("ISIN bronze", async {
            Ok(bronze::build_isin(&normalized, &bronze_dir)?.rows)
        })
        .await;
    pipeline
        .stage("Stock types", async {
            bronze::build_stock_types(&normalized, &bronze_dir)
        })
        .await;
    pipeline
        .stage("National agencies", async {
            bronze::build_national_agencies(&normalized, &bronze_dir)
        })
        .await;
    for board in [Board::Main, Board::Gem] {
        let name = match board {
            Board::Main => "Main bronze",
            Board::Gem => "GEM bronze",
        };
        pipeline
            .stage(name, async {
                Ok(bronze::build_listings(&normalized, &bronze_dir, board)?.rows)
            })
            .await;
    }
    for board in [Board::Main, Board::Gem] {
        let name = match board {
            Board::Main => "Main silver",
            Board::Gem => "GEM silver",
        };
        pipeline
            .stage(name, async {
                Ok(silver::build_silver(&bronze_dir, &silver_dir, board)?.rows)
            })
            .await;
    }
}

/// Run every stage in order and return the outcomes.
pub async fn run_pipeline(settings: &Settings, options: RunOptions) -> anyhow::Result<Vec<StageOutcome>> {
    settings
        .ensure_directories()
        .context("Failed to create data directories")?;
    let mut pipeline = Pipeline::new();

    if options.offline {
        for name in ["ISIN download", "Listings download", "Auditor report index", "Auditor PDFs"] {
            pipeline.skip(name, "offline");
        }
    } else {
        fetch_stages(&mut pipeline, settings).await;
    }

    transform_stages(&mut pipeline, settings).await;

    for (csv, table) in CSV_LOADS {
        let csv_path = settings.data_dir.join(csv);
        pipeline
            .stage(&format!("CSV loader: {}", table), async {
                Ok(load_csv(&settings.database_path, &csv_path, table)?)
            })
            .await;
    }

    let lists_dir = settings.lists_dir();
    pipeline
        .stage("ISIN export", async {
            Ok(export_key_list(
                &settings.database_path,
                &settings.sql_file("isin_export.sql"),
                &lists_dir.join(ISIN_LIST_FILE),
            )?)
        })
        .await;
    pipeline
        .stage("Stock code export", async {
            Ok(export_key_list(
                &settings.database_path,
                &settings.sql_file("stock_code_export.sql"),
                &lists_dir.join(STOCK_CODE_LIST_FILE),
            )?)
        })
        .await;

    for loader in wrds::default_loaders(settings) {
        let name = format!("WRDS loader: {}", loader.table);
        if options.offline {
            pipeline.skip(&name, "offline");
        } else if options.skip_wrds {
            pipeline.skip(&name, "--skip-wrds");
        } else {
            pipeline
                .stage(&name, async {
                    Ok(wrds::run_loader(&settings.database_path, settings.wrds.as_ref(), &loader).await?)
                })
                .await;
        }
    }

    Ok(pipeline.into_outcomes())
}

/// Plain-text summary table.
pub fn format_summary(outcomes: &[StageOutcome]) -> String {
    let width = outcomes
        .iter()
        .map(|o| o.name.len())
        .max()
        .unwrap_or(0)
        .max("Stage".len());

    let mut out = format!(
        "{:<width$}  {:<8}  {:>8}  {:>9}\n",
        "Stage",
        "Status",
        "Rows",
        "Elapsed",
        width = width
    );
    for o in outcomes {
        out.push_str(&format!(
            "{:<width$}  {:<8}  {:>8}  {:>8.1}s\n",
            o.name,
            o.status.to_string(),
            o.rows,
            o.elapsed.as_secs_f64(),
            width = width
        ));
    }
    out
}

pub fn any_failed(outcomes: &[StageOutcome]) -> bool {
    outcomes.iter().any(StageOutcome::is_failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_stage_does_not_stop_later_stages() {
        let mut pipeline = Pipeline::new();
        pipeline.stage("first", async { Ok(3) }).await;
        pipeline
            .stage("second", async { Err(anyhow::anyhow!("boom")) })
            .await;
        pipeline.stage("third", async { Ok(1) }).await;
        pipeline.skip("fourth", "offline");

        let outcomes = pipeline.outcomes();
        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[0].rows, 3);
        assert_eq!(outcomes[1].status, StageStatus::Failed("boom".to_string()));
        assert_eq!(outcomes[2].status, StageStatus::Success);
        assert_eq!(outcomes[3].status, StageStatus::Skipped("offline"));
        assert!(any_failed(outcomes));
    }

    #[test]
    fn test_fetch_result() {
        let ok = FetchReport {
            downloaded: 1,
            skipped: 2,
            ..Default::default()
        };
        assert_eq!(fetch_result("ISIN", ok).unwrap(), 3);
        let failed = FetchReport {
            failed: 1,
            ..ok
        };
        assert!(fetch_result("ISIN", failed).is_err());
    }

    #[test]
    fn test_format_summary() {
        let outcomes = vec![StageOutcome {
            name: "Main bronze".to_string(),
            status: StageStatus::Success,
            rows: 42,
            elapsed: Duration::from_millis(1500),
        }];
        let summary = format_summary(&outcomes);
        let lines: Vec<&str> = summary.lines().collect();
        assert!(lines[0].starts_with("Stage"));
        assert_eq!(lines[1], "Main bronze  success         42       1.5s");
        assert!(!any_failed(&outcomes));
    }

    #[tokio::test]
    async fn test_offline_run_on_empty_data_dir_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::with_data_dir(dir.path().join("data"));
        settings.sql_dir = dir.path().join("sql");
        let outcomes = run_pipeline(
            &settings,
            RunOptions {
                offline: true,
                skip_wrds: false,
            },
        )
        .await
        .unwrap();

        let names: Vec<&str> = outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names[0], "ISIN download");
        assert_eq!(names[4], "Normalize");
        assert_eq!(names.last(), Some(&"WRDS loader: funda_q_isin"));
        assert_eq!(outcomes.len(), 4 + 8 + 5 + 2 + 4);

        // Normalizing an empty raw directory succeeds; later stages lack input.
        assert_eq!(outcomes[4].status, StageStatus::Success);
        assert!(outcomes[5].is_failed());
        assert!(outcomes.iter().any(|o| o.name == "CSV loader: hkex_gem" && o.is_failed()));
        assert!(any_failed(&outcomes));
    }
}
