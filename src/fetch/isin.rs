//! ISIN registry downloads with conditional requests.

use std::io::Write;
use std::path::Path;

use crate::sink::csv::write_atomic;

use super::freshness::{self, Freshness};
use super::{FetchError, FetchReport, HttpClient};

/// Registry workbooks, saved as `raw/<name>.xls`.
pub const ISIN_SOURCES: &[(&str, &str)] = &[
    (
        "isino",
        "https://www.hkex.com.hk/-/media/HKEX-Market/Services/Trading/Securities/Securities-Lists/ISINs-assigned-by-Other-Numbering-Agencies/isino.xls",
    ),
    (
        "isinsehk",
        "https://www.hkex.com.hk/-/media/HKEX-Market/Services/Trading/Securities/Securities-Lists/ISINs-assigned-by-HKEX/isinsehk.xls",
    ),
    (
        "secstkorder",
        "https://www.hkex.com.hk/-/media/HKEX-Market/Services/Trading/Securities/Securities-Lists/Securities-Using-Standard-Transfer-Form-(including-GEM)-By-Stock-Code-Order/secstkorder.xls",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    Downloaded(usize),
    NotModified,
}

/// Write `bytes` to `path` atomically.
pub(crate) fn save_bytes(path: &Path, bytes: &[u8]) -> Result<(), FetchError> {
    write_atomic(path, |tmp| {
        tmp.write_all(bytes)?;
        Ok(())
    })?;
    Ok(())
}

/// Refresh one file. Validators are only sent when the file is present, so a
/// deleted file is always fetched again.
pub async fn refresh_file(client: &HttpClient, url: &str, path: &Path) -> Result<Refresh, FetchError> {
    let cached = if path.exists() {
        freshness::load(path)
    } else {
        Freshness::default()
    };

    let response = client
        .get(url, cached.etag.as_deref(), cached.last_modified.as_deref())
        .await?;

    if response.is_not_modified() {
        return Ok(Refresh::NotModified);
    }
    if !response.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: response.status.as_u16(),
        });
    }

    let validators = Freshness {
        etag: response.etag().map(str::to_string),
        last_modified: response.last_modified().map(str::to_string),
    };
    let bytes = response.bytes().await?;
    save_bytes(path, &bytes)?;
    freshness::save(path, &validators)?;
    Ok(Refresh::Downloaded(bytes.len()))
}

/// Refresh every registry workbook under `raw_dir`.
pub async fn fetch_isin_files(client: &HttpClient, raw_dir: &Path) -> FetchReport {
    let mut report = FetchReport::default();
    for (name, url) in ISIN_SOURCES {
        let path = raw_dir.join(format!("{}.xls", name));
        match refresh_file(client, url, &path).await {
            Ok(Refresh::Downloaded(size)) => {
                tracing::info!("Downloaded {} ({} bytes)", path.display(), size);
                report.downloaded += 1;
            }
            Ok(Refresh::NotModified) => {
                tracing::info!("{} up to date", name);
                report.not_modified += 1;
            }
            Err(e) => {
                tracing::warn!("Download failed for {}: {}", name, e);
                report.failed += 1;
            }
        }
    }
    report
}
