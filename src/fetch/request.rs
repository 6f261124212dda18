//! Deduplicated page fetching with manual redirects and bounded retries
//!
//! # Request Flow
//!
//! 1. If the canonical URI was already fetched in this crawl, answer from the
//!    crawl's record and count a duplicate instead of issuing a request
//! 2. Issue the request, retrying transient failures up to the attempt cap,
//!    sleeping `retry_delay(attempt)` between attempts
//! 3. Follow `Location` manually (up to `max_redirects` hops), recording every
//!    hop and detecting loops
//! 4. Any remaining non-2xx status is terminal

use crate::fetch::{CrawlContext, HttpResponse};
use crate::title::LinkTitle;
use crate::url::{to_canonical_link, Link};
use crate::FetchError;
use std::sync::Arc;
use url::Url;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The link that was asked for
    pub requested: Link,
    /// Where the redirect chain ended
    pub final_link: Link,
    pub code: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchedPage {
    /// Returns true if the page declares HTML, or looks like HTML under any
    /// other non-feed content type
    pub fn is_html(&self) -> bool {
        if let Some(content_type) = &self.content_type {
            let content_type = content_type.to_ascii_lowercase();
            if content_type.contains("text/html") || content_type.contains("xhtml") {
                return true;
            }
            if content_type.contains("rss")
                || content_type.contains("atom")
                || content_type.contains("feed+json")
            {
                return false;
            }
        }

        let head = self.body.trim_start().to_ascii_lowercase();
        head.starts_with("<!doctype html") || head.starts_with("<html")
    }
}

/// Fetches a page at most once per canonical URI for the crawl's lifetime
///
/// # Arguments
///
/// * `ctx` - The crawl's context
/// * `link` - The link to fetch
/// * `should_throttle` - Whether the client should space this request
/// * `max_attempts` - Attempt cap for transient failures (at least 1 attempt is made)
pub async fn request_page(
    ctx: &mut CrawlContext,
    link: &Link,
    should_throttle: bool,
    max_attempts: u32,
) -> Result<Arc<FetchedPage>, FetchError> {
    if let Some(page) = ctx.pages.get(&link.curi) {
        ctx.counters.duplicate_fetches += 1;
        tracing::debug!("Duplicate fetch of {} answered from crawl record", link.url);
        return Ok(page.clone());
    }

    if ctx.fetched_curis.contains(&link.curi) {
        ctx.counters.duplicate_fetches += 1;
        tracing::debug!("Duplicate fetch of previously failed {}", link.url);
        return Err(FetchError::PreviouslyFailed {
            url: link.url.to_string(),
        });
    }

    let mut current = link.clone();
    let mut chain: Vec<Link> = Vec::new();

    loop {
        // A hop into a page this crawl already has needs no request
        if !chain.is_empty() {
            if let Some(page) = ctx.pages.get(&current.curi).cloned() {
                ctx.counters.duplicate_fetches += 1;
                tracing::debug!("Redirect from {} lands on fetched {}", link.url, current.url);
                for hop in &chain {
                    ctx.pages.insert(hop.curi.clone(), page.clone());
                }
                return Ok(page);
            }
        }

        ctx.fetched_curis.insert(current.curi.clone());
        let response =
            request_with_retries(ctx, &current.url, should_throttle, max_attempts).await?;

        if response.is_redirect() {
            let next = response
                .location
                .as_deref()
                .and_then(|location| to_canonical_link(location, Some(&current.url)))
                .ok_or_else(|| FetchError::BadRedirect {
                    url: current.url.to_string(),
                    location: response.location.clone(),
                })?;

            if next.url == current.url || chain.iter().any(|hop| hop.url == next.url) {
                return Err(FetchError::RedirectLoop {
                    url: link.url.to_string(),
                });
            }
            if chain.len() as u32 >= ctx.settings.max_redirects {
                return Err(FetchError::RedirectLimit {
                    url: link.url.to_string(),
                });
            }

            tracing::debug!("Redirect {} -> {}", current.url, next.url);
            chain.push(std::mem::replace(&mut current, next));
            continue;
        }

        if !response.is_success() {
            return Err(FetchError::Status {
                url: current.url.to_string(),
                code: response.code,
            });
        }

        let page = Arc::new(FetchedPage {
            requested: link.clone(),
            final_link: current.clone(),
            code: response.code,
            content_type: response.content_type,
            body: response.body,
        });

        ctx.pages.insert(current.curi.clone(), page.clone());
        for hop in &chain {
            ctx.pages.insert(hop.curi.clone(), page.clone());
        }
        return Ok(page);
    }
}

/// Issues one request, retrying transient failures
async fn request_with_retries(
    ctx: &mut CrawlContext,
    uri: &Url,
    should_throttle: bool,
    max_attempts: u32,
) -> Result<HttpResponse, FetchError> {
    let client = ctx.http_client.clone();
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        ctx.counters.requests_made += 1;
        let result = client.request(uri, should_throttle).await;
        attempt += 1;

        let retryable = match &result {
            Ok(response) => response.is_transient_failure(),
            Err(e) => e.is_transient(),
        };
        if !retryable || attempt >= max_attempts {
            return result;
        }

        let delay = client.retry_delay(attempt - 1);
        tracing::warn!(
            "Transient failure fetching {} (attempt {}/{}), retrying in {:?}",
            uri,
            attempt,
            max_attempts,
            delay
        );
        tokio::time::sleep(delay).await;
    }
}

/// Renders a page through the crawl's browser client
pub async fn render_page(
    ctx: &mut CrawlContext,
    link: &Link,
    known_entry_titles: &[LinkTitle],
    find_load_more_button: Option<&crate::fetch::FindLoadMoreButton>,
) -> Result<String, FetchError> {
    let client = ctx.puppeteer_client.clone().ok_or(FetchError::NoBrowser)?;
    ctx.counters.puppeteer_requests_made += 1;
    tracing::info!("Rendering {} in browser", link.url);
    client
        .fetch(&link.url, known_entry_titles, find_load_more_button)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{CrawlSettings, HttpClient};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serves canned responses and counts requests per exact URL
    struct ScriptedClient {
        responses: HashMap<String, Vec<HttpResponse>>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<(&str, Vec<HttpResponse>)>) -> Self {
            Self {
                responses: responses
                    .into_iter()
                    .map(|(url, r)| (url.to_string(), r))
                    .collect(),
                calls: Mutex::new(HashMap::new()),
            }
        }

        fn calls(&self, url: &str) -> usize {
            self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedClient {
        async fn request(&self, uri: &Url, _: bool) -> Result<HttpResponse, FetchError> {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(uri.to_string()).or_insert(0);
            *n += 1;
            let scripted = self.responses.get(uri.as_str()).ok_or(FetchError::NotRecorded {
                url: uri.to_string(),
            })?;
            Ok(scripted[(*n - 1).min(scripted.len() - 1)].clone())
        }

        fn retry_delay(&self, _: u32) -> Duration {
            Duration::from_millis(1)
        }
    }

    fn ok(body: &str) -> HttpResponse {
        HttpResponse {
            code: 200,
            content_type: Some("text/html".to_string()),
            location: None,
            body: body.to_string(),
        }
    }

    fn status(code: u16) -> HttpResponse {
        HttpResponse {
            code,
            content_type: None,
            location: None,
            body: String::new(),
        }
    }

    fn redirect(location: &str) -> HttpResponse {
        HttpResponse {
            code: 301,
            content_type: None,
            location: Some(location.to_string()),
            body: String::new(),
        }
    }

    fn link(raw: &str) -> Link {
        to_canonical_link(raw, None).unwrap()
    }

    fn context(client: Arc<ScriptedClient>) -> CrawlContext {
        CrawlContext::new(client, CrawlSettings::default())
    }

    #[tokio::test]
    async fn test_second_fetch_is_counted_not_requested() {
        let client = Arc::new(ScriptedClient::new(vec![(
            "https://blog.example/a",
            vec![ok("a")],
        )]));
        let mut ctx = context(client.clone());

        request_page(&mut ctx, &link("https://blog.example/a"), false, 1)
            .await
            .unwrap();
        let again = request_page(&mut ctx, &link("http://blog.example/a/"), false, 1)
            .await
            .unwrap();

        assert_eq!(again.body, "a");
        assert_eq!(client.calls("https://blog.example/a"), 1);
        assert_eq!(ctx.counters.requests_made, 1);
        assert_eq!(ctx.counters.duplicate_fetches, 1);
    }

    #[tokio::test]
    async fn test_follows_redirects_and_records_hops() {
        let client = Arc::new(ScriptedClient::new(vec![
            ("https://blog.example/old", vec![redirect("/new")]),
            ("https://blog.example/new", vec![ok("new")]),
        ]));
        let mut ctx = context(client.clone());

        let page = request_page(&mut ctx, &link("https://blog.example/old"), false, 1)
            .await
            .unwrap();
        assert_eq!(page.final_link.as_str(), "https://blog.example/new");
        assert_eq!(page.requested.as_str(), "https://blog.example/old");

        request_page(&mut ctx, &link("https://blog.example/new"), false, 1)
            .await
            .unwrap();
        assert_eq!(client.calls("https://blog.example/new"), 1);
        assert_eq!(ctx.counters.duplicate_fetches, 1);
    }

    #[tokio::test]
    async fn test_scheme_upgrade_redirect_is_followed() {
        let client = Arc::new(ScriptedClient::new(vec![
            ("http://blog.example/", vec![redirect("https://blog.example/")]),
            ("https://blog.example/", vec![ok("home")]),
        ]));
        let mut ctx = context(client);

        let page = request_page(&mut ctx, &link("http://blog.example/"), false, 1)
            .await
            .unwrap();
        assert_eq!(page.body, "home");
    }

    #[tokio::test]
    async fn test_redirect_loop_detected() {
        let client = Arc::new(ScriptedClient::new(vec![
            ("https://blog.example/a", vec![redirect("/b")]),
            ("https://blog.example/b", vec![redirect("/a")]),
        ]));
        let mut ctx = context(client);

        let err = request_page(&mut ctx, &link("https://blog.example/a"), false, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::RedirectLoop { .. }));
    }

    #[tokio::test]
    async fn test_redirect_limit() {
        let mut responses = Vec::new();
        let urls: Vec<String> = (0..15).map(|i| format!("https://blog.example/{}", i)).collect();
        for i in 0..14 {
            responses.push((urls[i].as_str(), vec![redirect(&format!("/{}", i + 1))]));
        }
        let client = Arc::new(ScriptedClient::new(responses));
        let mut ctx = context(client);

        let err = request_page(&mut ctx, &link("https://blog.example/0"), false, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::RedirectLimit { .. }));
    }

    #[tokio::test]
    async fn test_transient_failure_retried() {
        let client = Arc::new(ScriptedClient::new(vec![(
            "https://blog.example/",
            vec![status(503), status(502), ok("up")],
        )]));
        let mut ctx = context(client.clone());

        let page = request_page(&mut ctx, &link("https://blog.example/"), false, 3)
            .await
            .unwrap();
        assert_eq!(page.body, "up");
        assert_eq!(client.calls("https://blog.example/"), 3);
        assert_eq!(ctx.counters.requests_made, 3);
    }

    #[tokio::test]
    async fn test_retries_bounded_by_attempt_cap() {
        let client = Arc::new(ScriptedClient::new(vec![(
            "https://blog.example/",
            vec![status(503)],
        )]));
        let mut ctx = context(client.clone());

        let err = request_page(&mut ctx, &link("https://blog.example/"), false, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { code: 503, .. }));
        assert_eq!(client.calls("https://blog.example/"), 2);
    }

    #[tokio::test]
    async fn test_client_error_not_retried_and_remembered() {
        let client = Arc::new(ScriptedClient::new(vec![(
            "https://blog.example/gone",
            vec![status(404)],
        )]));
        let mut ctx = context(client.clone());

        let err = request_page(&mut ctx, &link("https://blog.example/gone"), false, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { code: 404, .. }));

        let err = request_page(&mut ctx, &link("https://blog.example/gone"), false, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::PreviouslyFailed { .. }));
        assert_eq!(client.calls("https://blog.example/gone"), 1);
        assert_eq!(ctx.counters.duplicate_fetches, 1);
    }

    #[tokio::test]
    async fn test_render_without_browser() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let mut ctx = context(client);
        let err = render_page(&mut ctx, &link("https://blog.example/"), &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NoBrowser));
    }

    #[test]
    fn test_is_html() {
        let page = |content_type: Option<&str>, body: &str| FetchedPage {
            requested: link("https://blog.example/"),
            final_link: link("https://blog.example/"),
            code: 200,
            content_type: content_type.map(str::to_string),
            body: body.to_string(),
        };
        assert!(page(Some("text/html; charset=utf-8"), "").is_html());
        assert!(!page(Some("application/rss+xml"), "").is_html());
        assert!(page(None, "  <!DOCTYPE html><html></html>").is_html());
        assert!(!page(None, "<?xml version=\"1.0\"?><rss/>").is_html());
        assert!(page(Some("text/plain"), "<html><body></body></html>").is_html());
        assert!(page(Some("application/octet-stream"), "<!doctype html><html>").is_html());
        assert!(!page(Some("text/plain"), "just words").is_html());
        assert!(!page(Some("application/atom+xml"), "<html>").is_html());
    }
}
