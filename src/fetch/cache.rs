//! Recording and replaying fetch clients
//!
//! Responses are stored under `(scope id, exact request URL)`. The URL is
//! matched byte for byte, never through its canonical form, so a replay
//! reproduces exactly the requests a recorded crawl made.

use crate::fetch::{FindLoadMoreButton, HttpClient, HttpResponse, PuppeteerClient};
use crate::title::LinkTitle;
use crate::{FetchError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use url::Url;

type CacheKey = (String, String);

/// A recorded HTTP fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedFetch {
    pub scope: String,
    pub url: String,
    pub response: HttpResponse,
}

/// A recorded browser render
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRender {
    pub scope: String,
    pub url: String,
    pub body: String,
}

/// Serialized form of a [`FetchCache`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchCacheSnapshot {
    #[serde(default)]
    pub fetches: Vec<CachedFetch>,
    #[serde(default)]
    pub renders: Vec<CachedRender>,
}

/// Shared store behind the caching clients
#[derive(Debug, Default)]
pub struct FetchCache {
    fetches: Mutex<HashMap<CacheKey, HttpResponse>>,
    renders: Mutex<HashMap<CacheKey, String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl FetchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: FetchCacheSnapshot) -> Self {
        let cache = Self::new();
        {
            let mut fetches = lock(&cache.fetches);
            for fetch in snapshot.fetches {
                fetches.insert((fetch.scope, fetch.url), fetch.response);
            }
        }
        {
            let mut renders = lock(&cache.renders);
            for render in snapshot.renders {
                renders.insert((render.scope, render.url), render.body);
            }
        }
        cache
    }

    /// Returns all records sorted by scope and URL
    pub fn snapshot(&self) -> FetchCacheSnapshot {
        let mut fetches: Vec<CachedFetch> = lock(&self.fetches)
            .iter()
            .map(|((scope, url), response)| CachedFetch {
                scope: scope.clone(),
                url: url.clone(),
                response: response.clone(),
            })
            .collect();
        fetches.sort_by(|a, b| (&a.scope, &a.url).cmp(&(&b.scope, &b.url)));

        let mut renders: Vec<CachedRender> = lock(&self.renders)
            .iter()
            .map(|((scope, url), body)| CachedRender {
                scope: scope.clone(),
                url: url.clone(),
                body: body.clone(),
            })
            .collect();
        renders.sort_by(|a, b| (&a.scope, &a.url).cmp(&(&b.scope, &b.url)));

        FetchCacheSnapshot { fetches, renders }
    }

    /// Loads a cache previously written by [`FetchCache::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: FetchCacheSnapshot = serde_json::from_str(&content)?;
        tracing::info!(
            "Loaded {} fetches and {} renders from {}",
            snapshot.fetches.len(),
            snapshot.renders.len(),
            path.display()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn fetch_count(&self) -> usize {
        lock(&self.fetches).len()
    }

    pub fn render_count(&self) -> usize {
        lock(&self.renders).len()
    }

    fn get_fetch(&self, key: &CacheKey) -> Option<HttpResponse> {
        lock(&self.fetches).get(key).cloned()
    }

    fn put_fetch(&self, key: CacheKey, response: HttpResponse) {
        lock(&self.fetches).insert(key, response);
    }

    fn get_render(&self, key: &CacheKey) -> Option<String> {
        lock(&self.renders).get(key).cloned()
    }

    fn put_render(&self, key: CacheKey, body: String) {
        lock(&self.renders).insert(key, body);
    }
}

/// Whether a caching client may reach its inner client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Serve hits from the cache, fetch and store misses
    Record,
    /// Serve only from the cache; misses are errors
    Replay,
}

/// [`HttpClient`] that records responses or replays them
pub struct CachingHttpClient {
    cache: Arc<FetchCache>,
    scope: String,
    inner: Option<Arc<dyn HttpClient>>,
}

impl CachingHttpClient {
    pub fn recording(
        inner: Arc<dyn HttpClient>,
        cache: Arc<FetchCache>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            scope: scope.into(),
            inner: Some(inner),
        }
    }

    pub fn replaying(cache: Arc<FetchCache>, scope: impl Into<String>) -> Self {
        Self {
            cache,
            scope: scope.into(),
            inner: None,
        }
    }

    pub fn mode(&self) -> CacheMode {
        if self.inner.is_some() {
            CacheMode::Record
        } else {
            CacheMode::Replay
        }
    }
}

#[async_trait]
impl HttpClient for CachingHttpClient {
    async fn request(&self, uri: &Url, should_throttle: bool) -> std::result::Result<HttpResponse, FetchError> {
        let key = (self.scope.clone(), uri.as_str().to_string());
        if let Some(response) = self.cache.get_fetch(&key) {
            tracing::trace!("Cache hit for {}", uri);
            return Ok(response);
        }

        let inner = self.inner.as_ref().ok_or_else(|| FetchError::NotRecorded {
            url: uri.to_string(),
        })?;
        let response = inner.request(uri, should_throttle).await?;
        self.cache.put_fetch(key, response.clone());
        Ok(response)
    }

    fn retry_delay(&self, attempts_made: u32) -> Duration {
        match &self.inner {
            Some(inner) => inner.retry_delay(attempts_made),
            None => Duration::ZERO,
        }
    }
}

/// [`PuppeteerClient`] that records rendered pages or replays them
pub struct CachingPuppeteerClient {
    cache: Arc<FetchCache>,
    scope: String,
    inner: Option<Arc<dyn PuppeteerClient>>,
}

impl CachingPuppeteerClient {
    pub fn recording(
        inner: Arc<dyn PuppeteerClient>,
        cache: Arc<FetchCache>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            scope: scope.into(),
            inner: Some(inner),
        }
    }

    pub fn replaying(cache: Arc<FetchCache>, scope: impl Into<String>) -> Self {
        Self {
            cache,
            scope: scope.into(),
            inner: None,
        }
    }
}

#[async_trait]
impl PuppeteerClient for CachingPuppeteerClient {
    async fn fetch(
        &self,
        uri: &Url,
        known_entry_titles: &[LinkTitle],
        find_load_more_button: Option<&FindLoadMoreButton>,
    ) -> std::result::Result<String, FetchError> {
        let key = (self.scope.clone(), uri.as_str().to_string());
        if let Some(body) = self.cache.get_render(&key) {
            return Ok(body);
        }

        let inner = self.inner.as_ref().ok_or_else(|| FetchError::NotRecorded {
            url: uri.to_string(),
        })?;
        let body = inner
            .fetch(uri, known_entry_titles, find_load_more_button)
            .await?;
        self.cache.put_render(key, body.clone());
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HttpClient for CountingClient {
        async fn request(&self, uri: &Url, _: bool) -> std::result::Result<HttpResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HttpResponse {
                code: 200,
                content_type: Some("text/html".to_string()),
                location: None,
                body: format!("body of {}", uri),
            })
        }

        fn retry_delay(&self, attempts_made: u32) -> Duration {
            Duration::from_millis(10 * (attempts_made as u64 + 1))
        }
    }

    fn counting() -> Arc<CountingClient> {
        Arc::new(CountingClient {
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_record_then_replay() {
        let inner = counting();
        let cache = Arc::new(FetchCache::new());
        let recorder = CachingHttpClient::recording(inner.clone(), cache.clone(), "blog-1");
        let uri = Url::parse("https://blog.example/post?a=1").unwrap();

        let recorded = recorder.request(&uri, false).await.unwrap();
        recorder.request(&uri, false).await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

        let replayer = CachingHttpClient::replaying(cache, "blog-1");
        assert_eq!(replayer.mode(), CacheMode::Replay);
        assert_eq!(replayer.request(&uri, false).await.unwrap(), recorded);
    }

    #[tokio::test]
    async fn test_replay_matches_exact_url_and_scope() {
        let cache = Arc::new(FetchCache::new());
        let recorder = CachingHttpClient::recording(counting(), cache.clone(), "blog-1");
        recorder
            .request(&Url::parse("https://blog.example/post").unwrap(), false)
            .await
            .unwrap();

        let replayer = CachingHttpClient::replaying(cache.clone(), "blog-1");
        let err = replayer
            .request(&Url::parse("http://blog.example/post").unwrap(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NotRecorded { .. }));

        let other_scope = CachingHttpClient::replaying(cache, "blog-2");
        assert!(other_scope
            .request(&Url::parse("https://blog.example/post").unwrap(), false)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fetches.json");

        let cache = Arc::new(FetchCache::new());
        let recorder = CachingHttpClient::recording(counting(), cache.clone(), "scope");
        let uri = Url::parse("https://blog.example/").unwrap();
        recorder.request(&uri, false).await.unwrap();
        cache.save(&path).unwrap();

        let loaded = Arc::new(FetchCache::load(&path).unwrap());
        assert_eq!(loaded.fetch_count(), 1);
        assert_eq!(loaded.snapshot(), cache.snapshot());

        let replayer = CachingHttpClient::replaying(loaded, "scope");
        let response = replayer.request(&uri, false).await.unwrap();
        assert_eq!(response.body, "body of https://blog.example/");
    }

    #[test]
    fn test_retry_delay_delegates_when_recording() {
        let cache = Arc::new(FetchCache::new());
        let recorder = CachingHttpClient::recording(counting(), cache.clone(), "scope");
        assert_eq!(recorder.retry_delay(1), Duration::from_millis(20));
        let replayer = CachingHttpClient::replaying(cache, "scope");
        assert_eq!(replayer.retry_delay(1), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_render_replay_miss() {
        let client = CachingPuppeteerClient::replaying(Arc::new(FetchCache::new()), "scope");
        let uri = Url::parse("https://blog.example/archive").unwrap();
        let err = client.fetch(&uri, &[], None).await.unwrap_err();
        assert!(matches!(err, FetchError::NotRecorded { .. }));
    }
}
