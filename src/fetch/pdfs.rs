//! Auditor PDF downloads.
//!
//! A fixed number of worker tasks claim links from a shared queue. Files
//! already on disk are skipped, so an interrupted run resumes where it left
//! off. Progress is reported over an optional event channel.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use url::Url;

use super::auditor::{file_name_from_link, pdf_links, AUDITOR_REPORTS_URL};
use super::isin::save_bytes;
use super::{FetchError, HttpClient};

/// Events emitted while downloading.
#[derive(Debug, Clone)]
pub enum PdfEvent {
    Downloaded { worker_id: usize, name: String },
    Skipped { worker_id: usize, name: String },
    Failed { worker_id: usize, url: String, error: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PdfDownloadResult {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PdfDownloadResult {
    pub fn total(&self) -> usize {
        self.downloaded + self.skipped + self.failed
    }
}

/// Local path for a PDF link.
pub fn pdf_target(pdf_dir: &Path, url: &Url) -> Option<PathBuf> {
    file_name_from_link(url.path()).map(|name| pdf_dir.join(name))
}

async fn download_one(client: &HttpClient, url: &Url, path: &Path) -> Result<(), FetchError> {
    let response = client.get(url.as_str(), None, None).await?;
    if !response.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: response.status.as_u16(),
        });
    }
    let bytes = response.bytes().await?;
    save_bytes(path, &bytes)
}

/// Download `links` into `pdf_dir` with `workers` concurrent tasks.
pub async fn download_pdfs(
    client: &HttpClient,
    links: Vec<Url>,
    pdf_dir: &Path,
    workers: usize,
    event_tx: Option<mpsc::Sender<PdfEvent>>,
) -> PdfDownloadResult {
    let queue = Arc::new(Mutex::new(VecDeque::from(links)));
    let downloaded = Arc::new(AtomicUsize::new(0));
    let skipped = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers.max(1) {
        let client = client.clone();
        let queue = queue.clone();
        let pdf_dir = pdf_dir.to_path_buf();
        let downloaded = downloaded.clone();
        let skipped = skipped.clone();
        let failed = failed.clone();
        let event_tx = event_tx.clone();

        handles.push(tokio::spawn(async move {
            loop {
                let Some(url) = queue.lock().await.pop_front() else {
                    break;
                };

                let event = match pdf_target(&pdf_dir, &url) {
                    None => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        PdfEvent::Failed {
                            worker_id,
                            url: url.to_string(),
                            error: "link has no file name".to_string(),
                        }
                    }
                    Some(path) if path.exists() => {
                        skipped.fetch_add(1, Ordering::Relaxed);
                        PdfEvent::Skipped {
                            worker_id,
                            name: path.display().to_string(),
                        }
                    }
                    Some(path) => match download_one(&client, &url, &path).await {
                        Ok(()) => {
                            downloaded.fetch_add(1, Ordering::Relaxed);
                            PdfEvent::Downloaded {
                                worker_id,
                                name: path.display().to_string(),
                            }
                        }
                        Err(e) => {
                            tracing::warn!("Failed to download {}: {}", url, e);
                            failed.fetch_add(1, Ordering::Relaxed);
                            PdfEvent::Failed {
                                worker_id,
                                url: url.to_string(),
                                error: e.to_string(),
                            }
                        }
                    },
                };

                if let Some(tx) = &event_tx {
                    let _ = tx.send(event).await;
                }
            }
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }

    PdfDownloadResult {
        downloaded: downloaded.load(Ordering::Relaxed),
        skipped: skipped.load(Ordering::Relaxed),
        failed: failed.load(Ordering::Relaxed),
    }
}

/// Collect the PDF links from the auditor index page.
pub async fn list_pdf_links(client: &HttpClient) -> Result<Vec<Url>, FetchError> {
    let html = client.get_text(AUDITOR_REPORTS_URL).await?;
    let links = pdf_links(&html, AUDITOR_REPORTS_URL)?;
    if links.is_empty() {
        return Err(FetchError::InvalidResponse {
            url: AUDITOR_REPORTS_URL.to_string(),
            detail: "no PDF links found".to_string(),
        });
    }
    tracing::info!("Found {} PDF links", links.len());
    Ok(links)
}
