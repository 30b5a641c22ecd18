//! Source acquisition: listing reports, ISIN registry, auditor reports,
//! stock ids and press releases.

pub mod auditor;
pub mod client;
pub mod freshness;
pub mod isin;
pub mod listings;
pub mod pdfs;
pub mod press;
pub mod rate_limiter;
pub mod retry;
pub mod stock_ids;

pub use client::{HeadResponse, HttpClient, HttpResponse};
pub use rate_limiter::{RateLimitConfig, RateLimiter};

use thiserror::Error;

use crate::sink::SinkError;

/// Errors that can occur while fetching.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid response from {url}: {detail}")]
    InvalidResponse { url: String, detail: String },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Rate limiting and transport failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => matches!(status, 429 | 503),
            FetchError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

/// Per-file counts from a download batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub downloaded: usize,
    /// Server answered 304.
    pub not_modified: usize,
    /// Already on disk.
    pub skipped: usize,
    /// No candidate existed.
    pub missing: usize,
    pub failed: usize,
}

impl FetchReport {
    /// Files now present locally.
    pub fn available(&self) -> usize {
        self.downloaded + self.not_modified + self.skipped
    }
}
