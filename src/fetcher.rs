//! HTTP fetching with retry, backoff and header rotation
//!
//! Each `Fetcher` owns one `FetcherSession`: a pooled client plus the header
//! set sent with every request. Rotation never touches shared state; it builds
//! a new header map that replaces the session's map.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_TYPE, ORIGIN, REFERER,
    UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::HttpConfig;
use crate::error::PipelineError;

const DEFAULT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
const BLOCKED_ACCEPT: &str = "*/*";
const BLOCKED_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";
const BLOCKED_REFERER: &str = "https://www.google.com/";
const BLOCKED_ORIGIN: &str = "https://www.google.com";

/// A successfully fetched page. Immutable once produced.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub source_url: String,
    pub http_status: u16,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl FetchResult {
    /// Body decoded as UTF-8, with invalid sequences replaced
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Why headers are being rotated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationReason {
    /// The server answered 403: switch to a looser, referred browser profile
    Blocked,
    /// Timeout, connection failure or a retryable status: switch User-Agent only
    Transient,
}

/// Build the next header set from the current one.
///
/// Pure apart from drawing the User-Agent from `rng`. An empty pool leaves the
/// current User-Agent in place.
pub fn rotate_headers<R: Rng + ?Sized>(
    current: &HeaderMap,
    reason: RotationReason,
    user_agents: &[String],
    rng: &mut R,
) -> HeaderMap {
    let mut headers = current.clone();

    if let Some(agent) = user_agents.choose(rng) {
        if let Ok(value) = HeaderValue::from_str(agent) {
            headers.insert(USER_AGENT, value);
        }
    }

    if reason == RotationReason::Blocked {
        headers.insert(ACCEPT, HeaderValue::from_static(BLOCKED_ACCEPT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(BLOCKED_ACCEPT_LANGUAGE));
        headers.insert(REFERER, HeaderValue::from_static(BLOCKED_REFERER));
        headers.insert(ORIGIN, HeaderValue::from_static(BLOCKED_ORIGIN));
    }

    headers
}

/// Browser-like headers for the first attempt
pub fn initial_headers<R: Rng + ?Sized>(user_agents: &[String], rng: &mut R) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    rotate_headers(&headers, RotationReason::Transient, user_agents, rng)
}

/// Connection pool and current request headers, owned by one `Fetcher`
pub struct FetcherSession {
    client: reqwest::Client,
    headers: HeaderMap,
    rng: StdRng,
}

impl FetcherSession {
    fn new(config: &HttpConfig, mut rng: StdRng) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .context("Failed to build HTTP client")?;

        let headers = initial_headers(&config.user_agents, &mut rng);
        Ok(Self {
            client,
            headers,
            rng,
        })
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn rotate(&mut self, reason: RotationReason, user_agents: &[String]) {
        self.headers = rotate_headers(&self.headers, reason, user_agents, &mut self.rng);
    }
}

/// Fetches pages with the configured retry policy.
pub struct Fetcher {
    config: HttpConfig,
    session: FetcherSession,
}

impl Fetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Self::with_rng(config, StdRng::from_rng(&mut rand::rng()))
    }

    /// Deterministic User-Agent choices, for tests and reproducible runs
    pub fn with_seed(config: &HttpConfig, seed: u64) -> Result<Self> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &HttpConfig, rng: StdRng) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            session: FetcherSession::new(config, rng)?,
        })
    }

    pub fn session(&self) -> &FetcherSession {
        &self.session
    }

    /// Fetch `url`, retrying per the configured policy.
    ///
    /// - 403 rotates to the blocked-profile headers and retries without backoff
    /// - timeouts, connection errors, 408, 429 and 5xx back off, then rotate the User-Agent
    /// - any other non-2xx status fails immediately
    ///
    /// Every attempt after the first is preceded by a random jitter sleep.
    pub async fn fetch(&mut self, url: &str) -> Result<FetchResult, PipelineError> {
        let target = validate_url(url)?;
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_failure = String::from("no attempt made");

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let jitter = self.jitter();
                if !jitter.is_zero() {
                    sleep(jitter).await;
                }
            }

            debug!("Fetching {} (attempt {}/{})", url, attempt + 1, max_attempts);

            let response = self
                .session
                .client
                .get(target.clone())
                .headers(self.session.headers.clone())
                .send()
                .await;

            let failure = match response {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        match self.read_success(url, response).await {
                            Ok(result) => {
                                info!("Fetched {} ({} bytes)", url, result.body.len());
                                return Ok(result);
                            }
                            Err(e) => format!("{:#}", e),
                        }
                    } else if status == StatusCode::FORBIDDEN {
                        warn!("{} returned 403, rotating headers", url);
                        last_failure = format!("HTTP {}", status);
                        self.session.rotate(RotationReason::Blocked, &self.config.user_agents);
                        continue;
                    } else if is_retryable_status(status) {
                        format!("HTTP {}", status)
                    } else {
                        warn!("{} returned {}, not retrying", url, status);
                        return Err(PipelineError::fetch(url, format!("HTTP {}", status)));
                    }
                }
                Err(e) => describe_request_error(&e),
            };

            warn!("Attempt {} for {} failed: {}", attempt + 1, url, failure);
            last_failure = failure;

            if attempt + 1 < max_attempts {
                let delay = self.config.calculate_backoff_delay(attempt + 1);
                if !delay.is_zero() {
                    debug!("Backing off {:?} before retrying {}", delay, url);
                    sleep(delay).await;
                }
                self.session.rotate(RotationReason::Transient, &self.config.user_agents);
            }
        }

        Err(PipelineError::fetch(
            url,
            format!("{} after {} attempts", last_failure, max_attempts),
        ))
    }

    async fn read_success(&self, url: &str, response: reqwest::Response) -> Result<FetchResult> {
        let http_status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = read_response_body_capped(response, self.config.max_body_bytes).await?;

        Ok(FetchResult {
            source_url: url.to_string(),
            http_status,
            body,
            content_type,
            fetched_at: Utc::now(),
        })
    }

    fn jitter(&mut self) -> Duration {
        let (min, max) = (self.config.jitter_min_ms, self.config.jitter_max_ms);
        if max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(self.session.rng.random_range(min..=max))
    }
}

/// Accept only absolute http(s) URLs with a host
pub fn validate_url(url: &str) -> Result<Url, PipelineError> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| PipelineError::invalid_input(format!("malformed URL '{}': {}", url, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(PipelineError::invalid_input(format!(
            "unsupported URL scheme '{}' in '{}'",
            parsed.scheme(),
            url
        )));
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err(PipelineError::invalid_input(format!("URL has no host: '{}'", url))),
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

fn describe_request_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        format!("request failed: {}", error)
    }
}

/// Read a response body, stopping once `max_bytes` have been collected
async fn read_response_body_capped(response: reqwest::Response, max_bytes: usize) -> Result<Vec<u8>> {
    use futures::StreamExt;

    let mut body = Vec::with_capacity(max_bytes.min(256 * 1024));
    let mut stream = response.bytes_stream();
    let mut total = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Stream read error")?;
        let remaining = max_bytes.saturating_sub(total);
        if remaining == 0 {
            debug!("HTTP response truncated at {} bytes (limit: {})", total, max_bytes);
            break;
        }
        let take = chunk.len().min(remaining);
        body.extend_from_slice(&chunk[..take]);
        total += take;
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agents() -> Vec<String> {
        vec!["agent-one".to_string(), "agent-two".to_string(), "agent-three".to_string()]
    }

    // ==========================================================================
    // Tests for header rotation
    // ==========================================================================

    #[test]
    fn test_initial_headers() {
        let mut rng = StdRng::seed_from_u64(7);
        let headers = initial_headers(&agents(), &mut rng);

        assert_eq!(headers[ACCEPT], DEFAULT_ACCEPT);
        assert_eq!(headers[ACCEPT_LANGUAGE], DEFAULT_ACCEPT_LANGUAGE);
        let agent = headers[USER_AGENT].to_str().unwrap();
        assert!(agents().iter().any(|a| a == agent));
        assert!(headers.get(REFERER).is_none());
    }

    #[test]
    fn test_blocked_rotation_switches_profile() {
        let mut rng = StdRng::seed_from_u64(7);
        let current = initial_headers(&agents(), &mut rng);
        let rotated = rotate_headers(&current, RotationReason::Blocked, &agents(), &mut rng);

        assert_eq!(rotated[ACCEPT], BLOCKED_ACCEPT);
        assert_eq!(rotated[ACCEPT_LANGUAGE], BLOCKED_ACCEPT_LANGUAGE);
        assert_eq!(rotated[REFERER], BLOCKED_REFERER);
        assert_eq!(rotated[ORIGIN], BLOCKED_ORIGIN);
        // The input map is left untouched
        assert!(current.get(REFERER).is_none());
    }

    #[test]
    fn test_transient_rotation_only_changes_user_agent() {
        let mut rng = StdRng::seed_from_u64(11);
        let current = initial_headers(&agents(), &mut rng);
        let rotated = rotate_headers(&current, RotationReason::Transient, &agents(), &mut rng);

        assert_eq!(rotated[ACCEPT], current[ACCEPT]);
        assert_eq!(rotated.len(), current.len());
        assert!(rotated.get(REFERER).is_none());
    }

    #[test]
    fn test_rotation_is_deterministic_for_a_seed() {
        let current = HeaderMap::new();
        let a = rotate_headers(&current, RotationReason::Transient, &agents(), &mut StdRng::seed_from_u64(3));
        let b = rotate_headers(&current, RotationReason::Transient, &agents(), &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
    }

    #[test]
    fn test_rotation_with_empty_pool_keeps_agent() {
        let mut current = HeaderMap::new();
        current.insert(USER_AGENT, HeaderValue::from_static("kept"));
        let rotated = rotate_headers(&current, RotationReason::Transient, &[], &mut StdRng::seed_from_u64(1));
        assert_eq!(rotated[USER_AGENT], "kept");
    }

    // ==========================================================================
    // Tests for URL validation and status classification
    // ==========================================================================

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/news").is_ok());
        assert!(validate_url("  http://example.com  ").is_ok());

        for bad in ["", "http://", "example.com/news", "ftp://example.com/file", "not a url"] {
            let err = validate_url(bad).unwrap_err();
            assert!(err.is_invalid_input(), "{:?} should be invalid input", bad);
        }
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::REQUEST_TIMEOUT));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::FORBIDDEN));
    }

    #[test]
    fn test_fetch_result_text_is_lossy() {
        let result = FetchResult {
            source_url: "https://example.com".to_string(),
            http_status: 200,
            body: vec![b'o', b'k', 0xff],
            content_type: None,
            fetched_at: Utc::now(),
        };
        assert_eq!(result.text(), "ok\u{fffd}");
    }

    #[tokio::test]
    async fn test_invalid_url_fails_before_network() {
        let mut fetcher = Fetcher::with_seed(&HttpConfig::default(), 1).unwrap();
        let err = fetcher.fetch("http://").await.unwrap_err();
        assert!(err.is_invalid_input());
    }
}
