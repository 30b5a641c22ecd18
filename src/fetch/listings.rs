//! New listing report downloads.
//!
//! Report URLs changed naming scheme several times, so each year has an
//! ordered list of candidates. The first one that exists wins.

use std::path::{Path, PathBuf};

use crate::bronze::Board;

use super::isin::save_bytes;
use super::{FetchError, FetchReport, HttpClient};

pub const MAIN_BASE: &str =
    "https://www2.hkexnews.hk/-/media/HKEXnews/Homepage/New-Listings/New-Listing-Information/New-Listing-Report/Main/";
pub const GEM_BASE: &str =
    "https://www2.hkexnews.hk/-/media/HKEXnews/Homepage/New-Listings/New-Listing-Information/New-Listing-Report/GEM/";

/// Scan stops after this many consecutive years without a report.
pub const MAX_CONSECUTIVE_MISSING: usize = 3;

pub const LAST_YEAR: u16 = 2029;

pub fn first_year(board: Board) -> u16 {
    match board {
        Board::Main => 1994,
        Board::Gem => 1999,
    }
}

/// Years with no published report that do not count as misses.
pub fn is_known_gap(board: Board, year: u16) -> bool {
    board == Board::Gem && year == 2023
}

/// Candidate URLs for one board and year, in the order they are tried.
pub fn candidates(board: Board, year: u16) -> Vec<String> {
    let mut urls = Vec::new();
    match board {
        Board::Main => {
            if (2020..=2025).contains(&year) {
                urls.push(format!("{}NLR{}_Eng.xlsx", MAIN_BASE, year));
            }
            if (2012..=2019).contains(&year) {
                urls.push(format!("{}NLR{}_Eng.xls", MAIN_BASE, year));
            }
            if (1994..=2011).contains(&year) {
                urls.push(format!("{}{}.XLS", MAIN_BASE, year));
                urls.push(format!("{}{}.xls", MAIN_BASE, year));
            }
        }
        Board::Gem => {
            if (1999..=2021).contains(&year) {
                let short = year % 100;
                urls.push(format!("{}e_newlistings{:02}.xls", GEM_BASE, short));
                urls.push(format!("{}e_newlistings{:02}.XLS", GEM_BASE, short));
            }
            if year == 2022 {
                urls.push(format!("{}e_newlistings.xls", GEM_BASE));
                urls.push(format!("{}e_newlistings.XLS", GEM_BASE));
            }
            if (2024..=2025).contains(&year) {
                urls.push(format!("{}e_newlistings{}.xlsx", GEM_BASE, year));
            }
        }
    }
    urls
}

/// Local path for a candidate: `raw/Main_2010.xls`, extension lowercased.
pub fn target_path(raw_dir: &Path, board: Board, year: u16, url: &str) -> PathBuf {
    let ext = url
        .rsplit('.')
        .next()
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "xls".to_string());
    raw_dir.join(format!("{}{}.{}", board.prefix(), year, ext))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Exists,
    Downloaded,
    Missing,
}

async fn try_candidate(client: &HttpClient, url: &str, path: &Path) -> Result<Probe, FetchError> {
    if path.exists() {
        tracing::debug!("Already exists: {}", path.display());
        return Ok(Probe::Exists);
    }

    let head = client.head(url).await?;
    if !head.is_success() {
        tracing::debug!("Not found: {}", url);
        return Ok(Probe::Missing);
    }

    let response = client.get(url, None, None).await?;
    if !response.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: response.status.as_u16(),
        });
    }
    let bytes = response.bytes().await?;
    save_bytes(path, &bytes)?;
    tracing::info!("Downloaded {}", path.display());
    Ok(Probe::Downloaded)
}

/// Download every available report for `board` into `raw_dir`.
pub async fn fetch_board(client: &HttpClient, raw_dir: &Path, board: Board) -> FetchReport {
    let mut report = FetchReport::default();
    let mut consecutive_missing = 0;

    for year in first_year(board)..=LAST_YEAR {
        if is_known_gap(board, year) {
            continue;
        }

        let mut found = false;
        for url in candidates(board, year) {
            let path = target_path(raw_dir, board, year, &url);
            match try_candidate(client, &url, &path).await {
                Ok(Probe::Exists) => {
                    report.skipped += 1;
                    found = true;
                }
                Ok(Probe::Downloaded) => {
                    report.downloaded += 1;
                    found = true;
                }
                Ok(Probe::Missing) => {}
                Err(e) => {
                    tracing::warn!("Failed to download {}: {}", url, e);
                    report.failed += 1;
                }
            }
            if found {
                break;
            }
        }

        if found {
            consecutive_missing = 0;
        } else {
            consecutive_missing += 1;
            report.missing += 1;
            if consecutive_missing >= MAX_CONSECUTIVE_MISSING {
                tracing::info!(
                    "{} consecutive years without a {} report, stopping at {}",
                    consecutive_missing,
                    board.prefix().trim_end_matches('_'),
                    year
                );
                break;
            }
        }
    }

    report
}
