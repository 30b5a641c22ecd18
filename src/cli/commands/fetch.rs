//! Download commands.

use std::path::Path;
use std::process::ExitCode;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use crate::config::{resolve_in_data_dir, Settings};
use crate::fetch::pdfs::{download_pdfs, list_pdf_links, PdfEvent};
use crate::fetch::press::{fetch_press_releases, PressQuery, PressStatus, PRESS_SUMMARY_FILE};
use crate::fetch::stock_ids::{fetch_stock_ids, read_codes, MAPPING_FILE, PARTIAL_MAPPING_FILE};
use crate::fetch::{self, FetchReport, HttpClient};
use crate::sink::lists::{read_list, PENDING_LIST_FILE, STOCK_CODE_LIST_FILE};

use super::BoardArg;

fn exit_for(failed: usize) -> ExitCode {
    if failed > 0 {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

fn print_report(what: &str, report: &FetchReport) {
    println!(
        "{} {}: {} downloaded, {} unchanged, {} already present",
        style("✓").green(),
        what,
        report.downloaded,
        report.not_modified,
        report.skipped
    );
    if report.missing > 0 {
        println!(
            "  {} {} not published",
            style("→").dim(),
            report.missing
        );
    }
    if report.failed > 0 {
        println!("  {} {} failed", style("✗").red(), report.failed);
    }
}

/// Download the yearly new listing reports.
pub async fn cmd_listings(settings: &Settings, board: BoardArg) -> anyhow::Result<ExitCode> {
    settings.ensure_directories()?;
    let client = HttpClient::from_settings(settings)?;
    let mut failed = 0;
    for board in board.boards() {
        println!(
            "{} Fetching {:?} listing reports",
            style("→").cyan(),
            board
        );
        let report = fetch::listings::fetch_board(&client, &settings.raw_dir(), board).await;
        print_report(&format!("{:?} listings", board), &report);
        failed += report.failed;
    }
    Ok(exit_for(failed))
}

/// Refresh the ISIN registry workbooks.
pub async fn cmd_isin(settings: &Settings) -> anyhow::Result<ExitCode> {
    settings.ensure_directories()?;
    let client = HttpClient::from_settings(settings)?;
    let report = fetch::isin::fetch_isin_files(&client, &settings.raw_dir()).await;
    print_report("ISIN registry", &report);
    Ok(exit_for(report.failed))
}

/// Scrape the auditor report index page.
pub async fn cmd_auditor_index(settings: &Settings) -> anyhow::Result<ExitCode> {
    settings.ensure_directories()?;
    let client = HttpClient::from_settings(settings)?;
    let rows =
        fetch::auditor::fetch_index(&client, &settings.raw_dir(), &settings.auditor_pdf_dir()).await?;
    println!(
        "{} Indexed {} auditor reports -> {}",
        style("✓").green(),
        rows,
        settings
            .raw_dir()
            .join(fetch::auditor::AUDITOR_INDEX_FILE)
            .display()
    );
    Ok(ExitCode::SUCCESS)
}

/// Download every auditor report PDF linked from the index page.
pub async fn cmd_pdfs(settings: &Settings) -> anyhow::Result<ExitCode> {
    settings.ensure_directories()?;
    let client = HttpClient::from_settings(settings)?;
    let links = list_pdf_links(&client).await?;

    println!(
        "{} Starting {} download workers ({} PDFs)",
        style("→").cyan(),
        settings.max_workers,
        links.len()
    );

    let pb = ProgressBar::new(links.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let (event_tx, mut event_rx) = mpsc::channel::<PdfEvent>(100);
    let pb_events = pb.clone();
    let event_handler = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                PdfEvent::Downloaded { name, .. } | PdfEvent::Skipped { name, .. } => {
                    pb_events.set_message(name);
                }
                PdfEvent::Failed { url, error, .. } => {
                    pb_events.println(format!(
                        "{} Failed to download {}: {}",
                        style("✗").red(),
                        url,
                        error
                    ));
                }
            }
            pb_events.inc(1);
        }
    });

    let result = download_pdfs(
        &client,
        links,
        &settings.auditor_pdf_dir(),
        settings.max_workers,
        Some(event_tx),
    )
    .await;

    if let Err(e) = event_handler.await {
        tracing::warn!("Event handler task failed: {}", e);
    }
    pb.finish_and_clear();

    println!(
        "{} Downloaded {} PDFs",
        style("✓").green(),
        result.downloaded
    );
    if result.skipped > 0 {
        println!(
            "  {} {} already on disk",
            style("→").dim(),
            result.skipped
        );
    }
    if result.failed > 0 {
        println!("  {} {} failed", style("✗").red(), result.failed);
    }
    Ok(exit_for(result.failed))
}

/// Map stock codes to HKEXnews stock ids.
pub async fn cmd_stock_ids(settings: &Settings, codes: Option<&Path>) -> anyhow::Result<ExitCode> {
    settings.ensure_directories()?;
    let codes_path = match codes {
        Some(path) => resolve_in_data_dir(settings, path),
        None => settings.lists_dir().join(STOCK_CODE_LIST_FILE),
    };
    let codes = read_codes(&codes_path)?;
    if codes.is_empty() {
        println!(
            "{} No stock codes in {}",
            style("!").yellow(),
            codes_path.display()
        );
        println!(
            "  {} Run 'hkex lists export stock-code' first",
            style("→").dim()
        );
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "{} Looking up {} stock codes with {} workers",
        style("→").cyan(),
        codes.len(),
        settings.max_workers
    );

    let client = HttpClient::from_settings(settings)?;
    let processed = settings.processed_dir();
    let outcome = fetch_stock_ids(
        &client,
        codes,
        settings.max_workers,
        &processed.join(MAPPING_FILE),
        &processed.join(PARTIAL_MAPPING_FILE),
    )
    .await?;

    if outcome.interrupted {
        println!(
            "{} Interrupted, {} mappings saved to {}",
            style("!").yellow(),
            outcome.rows,
            outcome.path.display()
        );
        return Ok(ExitCode::from(130));
    }
    println!(
        "{} Mapped {} stock ids -> {}",
        style("✓").green(),
        outcome.rows,
        outcome.path.display()
    );
    if outcome.failed > 0 {
        println!("  {} {} lookups failed", style("✗").red(), outcome.failed);
    }
    Ok(exit_for(outcome.failed))
}

/// Fetch press releases for a list of stock ids.
pub async fn cmd_press(
    settings: &Settings,
    ids: Option<&Path>,
    from: Option<String>,
    to: Option<String>,
    row_range: Option<u32>,
) -> anyhow::Result<ExitCode> {
    settings.ensure_directories()?;
    let ids_path = match ids {
        Some(path) => resolve_in_data_dir(settings, path),
        None => settings.lists_dir().join(PENDING_LIST_FILE),
    };
    let stock_ids = read_list(&ids_path)?;
    if stock_ids.is_empty() {
        println!(
            "{} No stock ids in {}",
            style("!").yellow(),
            ids_path.display()
        );
        println!(
            "  {} Run 'hkex lists build' to compute the pending list",
            style("→").dim()
        );
        return Ok(ExitCode::SUCCESS);
    }

    let mut query = PressQuery::default();
    if let Some(from) = from {
        query.from_date = from;
    }
    if let Some(to) = to {
        query.to_date = to;
    }
    if let Some(row_range) = row_range {
        query.row_range = row_range;
    }

    println!(
        "{} Fetching press releases for {} stock ids ({} to {})",
        style("→").cyan(),
        stock_ids.len(),
        query.from_date,
        query.to_date
    );

    let client = HttpClient::from_settings(settings)?;
    let press_dir = settings.press_dir();
    let summary_path = press_dir.join(PRESS_SUMMARY_FILE);
    let outcomes = fetch_press_releases(&client, &stock_ids, &press_dir, &query, &summary_path).await?;

    let count = |status: PressStatus| outcomes.iter().filter(|o| o.status == status).count();
    let failed = count(PressStatus::Failed);
    println!(
        "{} Saved press releases for {} stock ids",
        style("✓").green(),
        count(PressStatus::Saved)
    );
    let empty = count(PressStatus::Empty);
    if empty > 0 {
        println!("  {} {} with no results", style("→").dim(), empty);
    }
    if failed > 0 {
        println!("  {} {} failed", style("✗").red(), failed);
    }
    println!(
        "  {} Summary: {}",
        style("→").dim(),
        summary_path.display()
    );
    Ok(exit_for(failed))
}
