//! Feed discovery from an arbitrary input string

use crate::crawler::parse_html;
use crate::feed::{looks_like_feed, parse_feed, FeedParseError, ParsedFeed};
use crate::fetch::{request_page, CrawlContext, FetchedPage};
use crate::url::{to_canonical_link, CanonicalEqualityConfig, CanonicalUriSet, Link};
use crate::FetchError;
use serde::Serialize;
use std::sync::Arc;

/// A feed that was fetched and parsed
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredFetchedFeed {
    pub title: Option<String>,
    /// The feed link as discovered
    pub url: Link,
    /// Where the feed was served from after redirects
    pub final_url: Link,
    #[serde(skip)]
    pub content: String,
    pub parsed: ParsedFeed,
}

/// The HTML page discovery started from
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredStartPage {
    pub url: Link,
    pub final_url: Link,
    #[serde(skip)]
    pub content: String,
}

/// A candidate feed when a page exposes several
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredFeedLink {
    pub title: Option<String>,
    pub link: Link,
    pub feed_type: Option<String>,
}

/// Outcome of [`discover_feeds_at_url`]
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DiscoverFeedsResult {
    /// The input does not parse as a URL
    NotAUrl,
    /// Transport or HTTP failure reaching a candidate
    CouldNotReach {
        #[serde(serialize_with = "serialize_display")]
        error: FetchError,
    },
    /// The page was fetched but exposes no feed
    NoFeeds,
    /// A feed was found but did not parse
    BadFeed {
        #[serde(serialize_with = "serialize_display")]
        error: FeedParseError,
    },
    /// The page exposes more than one feed; the caller must pick
    MultipleFeeds { feeds: Vec<DiscoveredFeedLink> },
    SingleFeed {
        feed: DiscoveredFetchedFeed,
        /// Populated when the input was an HTML page rather than the feed
        start_page: Option<DiscoveredStartPage>,
    },
}

fn serialize_display<T: std::fmt::Display, S: serde::Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Path fragments that mark an `<a href>` as a likely feed
const FEED_PATH_HINTS: &[&str] = &[
    "/feed", "/rss", ".rss", ".atom", "atom.xml", "rss.xml", "feed.xml", "index.xml",
];

/// Resolves an input string into zero, one or many feeds
///
/// # Discovery Steps
///
/// 1. Prepend `https://` to scheme-less input and resolve it to a link
/// 2. Fetch it, retrying transient failures up to `max_attempts`
/// 3. If the response is itself a feed, parse it; there is no start page
/// 4. Otherwise collect `<link rel=alternate>` feeds, dropping comment feeds
///    when another feed exists, and fall back to feed-looking anchors
/// 5. Exactly one candidate is fetched and parsed; more are returned as-is
///
/// # Arguments
///
/// * `input` - A URL or host as typed by a user
/// * `max_attempts` - Attempt cap for transient failures
/// * `ctx` - The crawl context; discovery fetches count toward its record
pub async fn discover_feeds_at_url(
    input: &str,
    max_attempts: u32,
    ctx: &mut CrawlContext,
) -> DiscoverFeedsResult {
    let Some(start_link) = input_to_link(input) else {
        tracing::info!("Discovery input {:?} is not a URL", input);
        return DiscoverFeedsResult::NotAUrl;
    };

    tracing::info!("Discovering feeds at {}", start_link.url);
    let start = match request_page(ctx, &start_link, false, max_attempts).await {
        Ok(page) => page,
        Err(error) => {
            tracing::info!("Could not reach {}: {}", start_link.url, error);
            return DiscoverFeedsResult::CouldNotReach { error };
        }
    };

    if !start.is_html() && looks_like_feed(start.content_type.as_deref(), &start.body) {
        tracing::info!("{} is a feed itself", start_link.url);
        return parse_fetched_feed(&start_link, &start, None);
    }

    let mut candidates = feed_candidates(&start);
    match candidates.len() {
        0 => {
            tracing::info!("No feeds found at {}", start.final_link.url);
            DiscoverFeedsResult::NoFeeds
        }
        1 => {
            let candidate = candidates.remove(0);
            let start_page = DiscoveredStartPage {
                url: start_link.clone(),
                final_url: start.final_link.clone(),
                content: start.body.clone(),
            };
            tracing::info!("Found single feed {}", candidate.link.url);

            let feed_page = match request_page(ctx, &candidate.link, false, max_attempts).await {
                Ok(page) => page,
                Err(error) => return DiscoverFeedsResult::CouldNotReach { error },
            };
            parse_fetched_feed(&candidate.link, &feed_page, Some(start_page))
        }
        n => {
            tracing::info!("Found {} feeds at {}", n, start.final_link.url);
            DiscoverFeedsResult::MultipleFeeds { feeds: candidates }
        }
    }
}

fn input_to_link(input: &str) -> Option<Link> {
    let input = input.trim();
    if input.is_empty() || input.chars().any(char::is_whitespace) {
        return None;
    }

    let with_scheme = if input.contains("://") {
        input.to_string()
    } else if let Some((scheme, rest)) = input.split_once(':') {
        // `mailto:x` is an opaque URI; `localhost:8080` is a host with a port
        if scheme.chars().all(|c| c.is_ascii_alphabetic())
            && !rest.starts_with(|c: char| c.is_ascii_digit())
        {
            return None;
        }
        format!("https://{}", input)
    } else {
        format!("https://{}", input)
    };
    let link = to_canonical_link(&with_scheme, None)?;
    // A bare word like "hello" is a host without a dot, not a blog
    if link.url.host_str().map_or(true, |host| !host.contains('.'))
        && link.url.host_str() != Some("localhost")
        && !matches!(link.url.host(), Some(url::Host::Ipv4(_)) | Some(url::Host::Ipv6(_)))
    {
        return None;
    }
    Some(link)
}

fn feed_candidates(page: &FetchedPage) -> Vec<DiscoveredFeedLink> {
    let parsed = parse_html(&page.body, &page.final_link.url);

    let has_non_comment = parsed
        .feed_links
        .iter()
        .any(|feed_link| !feed_link.is_comment_feed());
    let mut candidates: Vec<DiscoveredFeedLink> = parsed
        .feed_links
        .iter()
        .filter(|feed_link| !has_non_comment || !feed_link.is_comment_feed())
        .map(|feed_link| DiscoveredFeedLink {
            title: feed_link.title.clone(),
            link: feed_link.link.clone(),
            feed_type: Some(feed_link.feed_type.clone()),
        })
        .collect();

    if candidates.is_empty() {
        candidates = parsed
            .links
            .iter()
            .filter(|page_link| {
                let path = page_link.link.curi.path().to_ascii_lowercase();
                page_link.link.curi.host() == page.final_link.curi.host()
                    && FEED_PATH_HINTS.iter().any(|hint| path.contains(hint))
                    && !path.contains("/comments/")
            })
            .map(|page_link| DiscoveredFeedLink {
                title: Some(page_link.text.clone()).filter(|text| !text.is_empty()),
                link: page_link.link.clone(),
                feed_type: None,
            })
            .collect();
    }

    let mut seen = CanonicalUriSet::new(CanonicalEqualityConfig::default());
    candidates.retain(|candidate| seen.insert(candidate.link.curi.clone()));
    candidates
}

fn parse_fetched_feed(
    link: &Link,
    page: &Arc<FetchedPage>,
    start_page: Option<DiscoveredStartPage>,
) -> DiscoverFeedsResult {
    match parse_feed(&page.body, &page.final_link.url) {
        Ok(parsed) => DiscoverFeedsResult::SingleFeed {
            feed: DiscoveredFetchedFeed {
                title: parsed.title.clone(),
                url: link.clone(),
                final_url: page.final_link.clone(),
                content: page.body.clone(),
                parsed,
            },
            start_page,
        },
        Err(error) => {
            tracing::info!("Feed {} failed to parse: {}", link.url, error);
            DiscoverFeedsResult::BadFeed { error }
        }
    }
}
