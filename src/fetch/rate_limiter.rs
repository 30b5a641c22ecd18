//! Adaptive per-domain rate limiter.
//!
//! Tracks request timing per domain and adapts delays based on responses.
//! Backs off on 429/503, gradually recovers on success.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

/// Rate limiter tuning.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Delay between requests to one domain when not backing off.
    pub base_delay: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub recovery_multiplier: f64,
    /// Consecutive successes needed before the delay shrinks.
    pub recovery_threshold: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(250),
            min_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            recovery_multiplier: 0.75,
            recovery_threshold: 5,
        }
    }
}

#[derive(Debug, Clone)]
struct DomainState {
    current_delay: Duration,
    last_request: Option<Instant>,
    consecutive_successes: u32,
    in_backoff: bool,
    total_requests: u64,
    rate_limit_hits: u64,
}

impl DomainState {
    fn new(base_delay: Duration) -> Self {
        Self {
            current_delay: base_delay,
            last_request: None,
            consecutive_successes: 0,
            in_backoff: false,
            total_requests: 0,
            rate_limit_hits: 0,
        }
    }

    fn time_until_ready(&self) -> Duration {
        match self.last_request {
            Some(last) => self.current_delay.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }

    fn scale(&mut self, factor: f64, max: Duration) {
        let next = Duration::from_secs_f64(self.current_delay.as_secs_f64() * factor);
        self.current_delay = next.min(max);
    }
}

/// Adaptive rate limiter shared by every clone of an [`HttpClient`](super::HttpClient).
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    domains: Arc<RwLock<HashMap<String, DomainState>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
    }

    pub fn with_config(config: RateLimitConfig) -> Self {
        Self {
            config,
            domains: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Extract domain from URL.
    pub fn extract_domain(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|s| s.to_string()))
    }

    /// Wait until the domain is ready, then mark request as started.
    pub async fn acquire(&self, url: &str) -> Option<String> {
        let domain = Self::extract_domain(url)?;

        let wait_time = {
            let domains = self.domains.read().await;
            domains
                .get(&domain)
                .map(|s| s.time_until_ready())
                .unwrap_or(Duration::ZERO)
        };

        if wait_time > Duration::ZERO {
            debug!("Rate limiting {}: waiting {:?}", domain, wait_time);
            tokio::time::sleep(wait_time).await;
        }

        {
            let mut domains = self.domains.write().await;
            let state = domains
                .entry(domain.clone())
                .or_insert_with(|| DomainState::new(self.config.base_delay));
            state.last_request = Some(Instant::now());
            state.total_requests += 1;
        }

        Some(domain)
    }

    /// Feed a response status back into the domain state.
    pub async fn report_status(&self, domain: &str, status: u16) {
        match status {
            429 | 503 => self.report_rate_limit(domain, status).await,
            500..=599 => self.report_server_error(domain).await,
            200..=399 => self.report_success(domain).await,
            _ => {}
        }
    }

    /// Report a successful request - may decrease delay.
    pub async fn report_success(&self, domain: &str) {
        let mut domains = self.domains.write().await;
        if let Some(state) = domains.get_mut(domain) {
            state.consecutive_successes += 1;

            if state.in_backoff && state.consecutive_successes >= self.config.recovery_threshold {
                state.scale(self.config.recovery_multiplier, self.config.max_delay);
                state.current_delay = state.current_delay.max(self.config.min_delay);

                if state.current_delay <= self.config.base_delay {
                    state.in_backoff = false;
                    state.current_delay = self.config.base_delay;
                    info!("Domain {} recovered from rate limit backoff", domain);
                } else {
                    debug!("Domain {} delay reduced to {:?}", domain, state.current_delay);
                }

                state.consecutive_successes = 0;
            }
        }
    }

    /// Report a rate limit hit (429 or 503) - increases delay.
    pub async fn report_rate_limit(&self, domain: &str, status_code: u16) {
        let mut domains = self.domains.write().await;
        if let Some(state) = domains.get_mut(domain) {
            state.rate_limit_hits += 1;
            state.consecutive_successes = 0;
            state.in_backoff = true;
            state.scale(self.config.backoff_multiplier, self.config.max_delay);

            warn!(
                "Rate limited by {} (HTTP {}, {} of {} requests), backing off to {:?}",
                domain, status_code, state.rate_limit_hits, state.total_requests, state.current_delay
            );
        }
    }

    /// Report a server error (5xx other than 503) - mild backoff.
    pub async fn report_server_error(&self, domain: &str) {
        let mut domains = self.domains.write().await;
        if let Some(state) = domains.get_mut(domain) {
            state.scale(1.5, self.config.max_delay);
            debug!(
                "Server error for {}, delay increased to {:?}",
                domain, state.current_delay
            );
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> RateLimitConfig {
        RateLimitConfig {
            base_delay: Duration::from_millis(10),
            min_delay: Duration::from_millis(1),
            backoff_multiplier: 2.0,
            recovery_multiplier: 0.25,
            recovery_threshold: 2,
            ..Default::default()
        }
    }

    async fn state(limiter: &RateLimiter, domain: &str) -> DomainState {
        limiter.domains.read().await[domain].clone()
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            RateLimiter::extract_domain("https://www1.hkexnews.hk/search/prefix.do?lang=EN"),
            Some("www1.hkexnews.hk".to_string())
        );
        assert_eq!(RateLimiter::extract_domain("not a url"), None);
    }

    #[tokio::test]
    async fn test_backoff_on_rate_limit() {
        let limiter = RateLimiter::with_config(fast_config());
        limiter.acquire("https://www.hkex.com.hk/isino.xls").await;
        limiter.report_status("www.hkex.com.hk", 429).await;

        let domain = state(&limiter, "www.hkex.com.hk").await;
        assert!(domain.current_delay >= Duration::from_millis(19));
        assert!(domain.in_backoff);
        assert_eq!(domain.rate_limit_hits, 1);
        assert_eq!(domain.total_requests, 1);
    }

    #[tokio::test]
    async fn test_recovers_after_successes() {
        let limiter = RateLimiter::with_config(fast_config());
        limiter.acquire("https://www.hkex.com.hk/a").await;
        limiter.report_status("www.hkex.com.hk", 503).await;
        limiter.report_status("www.hkex.com.hk", 200).await;
        limiter.report_status("www.hkex.com.hk", 304).await;

        let domain = state(&limiter, "www.hkex.com.hk").await;
        assert!(!domain.in_backoff);
        assert_eq!(domain.current_delay, Duration::from_millis(10));
    }
}
