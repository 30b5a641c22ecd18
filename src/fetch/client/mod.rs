//! HTTP client with conditional request support.

mod response;

pub use response::{HeadResponse, HttpResponse};

use std::time::Duration;

use reqwest::{Client, RequestBuilder};

use super::rate_limiter::RateLimiter;
use super::FetchError;
use crate::config::Settings;
use response::collect_headers;

/// Referer sent to the HKEXnews search APIs.
pub const SEARCH_REFERER: &str = "https://www1.hkexnews.hk/search/titlesearch.xhtml?lang=en";

/// HTTP client with adaptive per-domain rate limiting.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    request_delay: Duration,
    referer: Option<String>,
    cookie: Option<String>,
    rate_limiter: RateLimiter,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(user_agent: &str, timeout: Duration, request_delay: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            request_delay,
            referer: None,
            cookie: None,
            rate_limiter: RateLimiter::new(),
        })
    }

    /// Client configured from settings (user agent, timeout, delay, cookie).
    pub fn from_settings(settings: &Settings) -> Result<Self, FetchError> {
        let mut client = Self::new(
            &settings.user_agent,
            Duration::from_secs(settings.request_timeout),
            Duration::from_millis(settings.request_delay_ms),
        )?;
        client.cookie = settings.cookie.clone();
        Ok(client)
    }

    /// Set the Referer header for requests.
    pub fn with_referer(mut self, referer: &str) -> Self {
        self.referer = Some(referer.to_string());
        self
    }

    async fn send(&self, url: &str, request: RequestBuilder) -> Result<reqwest::Response, FetchError> {
        let domain = self.rate_limiter.acquire(url).await;

        let mut request = request;
        if let Some(referer) = &self.referer {
            request = request.header("Referer", referer);
        }

        let response = request.send().await?;
        if let Some(domain) = domain {
            self.rate_limiter
                .report_status(&domain, response.status().as_u16())
                .await;
        }

        tokio::time::sleep(self.request_delay).await;
        Ok(response)
    }

    /// Make a GET request with optional conditional headers.
    pub async fn get(
        &self,
        url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> Result<HttpResponse, FetchError> {
        let mut request = self.client.get(url);
        if let Some(etag) = etag {
            request = request.header("If-None-Match", etag);
        }
        if let Some(lm) = last_modified {
            request = request.header("If-Modified-Since", lm);
        }

        let response = self.send(url, request).await?;
        Ok(HttpResponse {
            status: response.status(),
            headers: collect_headers(&response),
            response,
        })
    }

    /// GET an XHR-style search endpoint with query parameters. The session
    /// cookie, when configured, is forwarded.
    pub async fn get_api(&self, url: &str, params: &[(&str, &str)]) -> Result<HttpResponse, FetchError> {
        let mut request = self
            .client
            .get(url)
            .query(params)
            .header("x-requested-with", "XMLHttpRequest");
        if let Some(cookie) = &self.cookie {
            request = request.header("Cookie", cookie);
        }

        let response = self.send(url, request).await?;
        Ok(HttpResponse {
            status: response.status(),
            headers: collect_headers(&response),
            response,
        })
    }

    /// Get page content as text, failing on a non-success status.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.get(url, None, None).await?;
        if !response.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    /// Make a HEAD request to check headers without downloading content.
    pub async fn head(&self, url: &str) -> Result<HeadResponse, FetchError> {
        let response = self.send(url, self.client.head(url)).await?;
        Ok(HeadResponse {
            status: response.status(),
            headers: collect_headers(&response),
        })
    }
}
