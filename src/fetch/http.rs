//! HTTP client capability and its reqwest implementation
//!
//! The guided crawl only sees the [`HttpClient`] trait, so production
//! fetching, recorded replays and test doubles are interchangeable.

use crate::config::{FetchConfig, UserAgentConfig};
use crate::FetchError;
use async_trait::async_trait;
use reqwest::{header, redirect::Policy, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

/// A single HTTP response, without transport-level redirect following
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub code: u16,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.code, 301 | 302 | 303 | 307 | 308)
    }

    /// Server-side failures are worth retrying; client errors are not
    pub fn is_transient_failure(&self) -> bool {
        self.code >= 500 || self.code == 429
    }
}

/// Capability to issue HTTP requests for a crawl
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issues a GET for `uri` without following redirects
    ///
    /// Throttled requests are spaced by the client's throttle policy.
    async fn request(&self, uri: &Url, should_throttle: bool) -> Result<HttpResponse, FetchError>;

    /// Delay to wait after `attempts_made` failed attempts
    ///
    /// Non-decreasing in `attempts_made` and plateaus after a few attempts.
    fn retry_delay(&self, attempts_made: u32) -> Duration;
}

/// Looks up a delay in a schedule, repeating the last entry once exhausted
pub fn scheduled_delay(schedule: &[Duration], attempts_made: u32) -> Duration {
    let idx = (attempts_made as usize).min(schedule.len().saturating_sub(1));
    schedule.get(idx).copied().unwrap_or(Duration::ZERO)
}

/// Builds a reqwest client with the configured identity and timeouts
///
/// Redirects are not followed by the transport; the crawl follows
/// `Location` itself so every hop is deduplicated.
pub fn build_http_client(
    fetch: &FetchConfig,
    user_agent: &UserAgentConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(fetch.request_timeout_secs))
        .connect_timeout(Duration::from_secs(fetch.connect_timeout_secs))
        .redirect(Policy::none()) // Handle redirects manually
        .gzip(true)
        .brotli(true)
        .build()
}

/// Production [`HttpClient`] backed by reqwest
pub struct ReqwestHttpClient {
    client: Client,
    throttle_interval: Duration,
    retry_delays: Vec<Duration>,
    last_throttled: Mutex<Option<Instant>>,
}

impl ReqwestHttpClient {
    pub fn new(fetch: &FetchConfig, user_agent: &UserAgentConfig) -> Result<Self, FetchError> {
        let client =
            build_http_client(fetch, user_agent).map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self {
            client,
            throttle_interval: Duration::from_millis(fetch.throttle_interval_ms),
            retry_delays: fetch.retry_delays(),
            last_throttled: Mutex::new(None),
        })
    }

    /// Waits until the throttle interval since the last throttled request passed
    async fn throttle(&self) {
        let mut last = self.last_throttled.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.throttle_interval;
            let now = Instant::now();
            if ready_at > now {
                tracing::trace!("Throttling for {:?}", ready_at - now);
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn request(&self, uri: &Url, should_throttle: bool) -> Result<HttpResponse, FetchError> {
        if should_throttle {
            self.throttle().await;
        }

        tracing::debug!("GET {}", uri);
        let response = self
            .client
            .get(uri.clone())
            .send()
            .await
            .map_err(|e| classify_reqwest_error(uri, &e))?;

        let code = response.status().as_u16();
        let content_type = header_string(response.headers(), header::CONTENT_TYPE);
        let location = header_string(response.headers(), header::LOCATION);
        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(uri, &e))?;

        Ok(HttpResponse {
            code,
            content_type,
            location,
            body,
        })
    }

    fn retry_delay(&self, attempts_made: u32) -> Duration {
        scheduled_delay(&self.retry_delays, attempts_made)
    }
}

fn header_string(headers: &header::HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

/// Classifies a transport error as transient or terminal
fn classify_reqwest_error(uri: &Url, e: &reqwest::Error) -> FetchError {
    let (message, transient) = if e.is_timeout() {
        ("Request timeout".to_string(), true)
    } else if e.is_connect() {
        (format!("Connection failed: {}", e), true)
    } else if e.is_body() || e.is_decode() {
        (format!("Body error: {}", e), true)
    } else {
        (e.to_string(), false)
    };

    FetchError::Transport {
        url: uri.to_string(),
        message,
        transient,
    }
}
