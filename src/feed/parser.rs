//! Feed parsing into ordered entry links

use crate::title::{LinkTitle, LinkTitleSource};
use crate::url::{to_canonical_link, CanonicalEqualityConfig, CanonicalUriSet, Link};
use chrono::{DateTime, Utc};
use scraper::Html;
use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Feed bytes could not be turned into entries
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedParseError {
    #[error("Invalid feed at {url}: {message}")]
    Invalid { url: String, message: String },
}

/// A feed reduced to what the crawl and diff need
#[derive(Debug, Clone, Serialize)]
pub struct ParsedFeed {
    pub title: Option<String>,
    /// The blog's home page as declared by the feed
    pub root_link: Option<Link>,
    /// Entry links, newest first, each carrying the entry title
    pub entry_links: Vec<Link>,
    pub generator: Option<String>,
}

impl ParsedFeed {
    pub fn entry_titles(&self) -> Vec<LinkTitle> {
        self.entry_links
            .iter()
            .filter_map(|link| link.title.clone())
            .collect()
    }
}

/// Parses an RSS, Atom or JSON feed
///
/// Relative entry links resolve against `feed_url`. Entries are deduplicated
/// by canonical URI, keeping the first occurrence. A feed whose entries are
/// all dated and strictly oldest-first is reversed.
///
/// # Arguments
///
/// * `content` - The feed body
/// * `feed_url` - The URL the feed was finally fetched from
///
/// # Returns
///
/// * `Ok(ParsedFeed)` - Entries newest first
/// * `Err(FeedParseError)` - The body is not a feed
pub fn parse_feed(content: &str, feed_url: &Url) -> Result<ParsedFeed, FeedParseError> {
    let feed = feed_rs::parser::parse(content.as_bytes()).map_err(|e| FeedParseError::Invalid {
        url: feed_url.to_string(),
        message: e.to_string(),
    })?;

    let mut seen = CanonicalUriSet::new(CanonicalEqualityConfig::default());
    let mut entries: Vec<(Link, Option<DateTime<Utc>>)> = Vec::new();

    for entry in &feed.entries {
        let Some(href) = select_entry_link(entry) else {
            tracing::debug!("Feed entry {} has no usable link", entry.id);
            continue;
        };
        let Some(mut link) = to_canonical_link(&href, Some(feed_url)) else {
            tracing::debug!("Feed entry link {} is not a canonical link", href);
            continue;
        };
        if !seen.insert(link.curi.clone()) {
            continue;
        }

        let title = entry
            .title
            .as_ref()
            .and_then(|text| LinkTitle::non_empty(&strip_html(&text.content), LinkTitleSource::Feed));
        link.title = title;

        entries.push((link, entry.published.or(entry.updated)));
    }

    if is_oldest_first(&entries) {
        tracing::debug!("Feed {} is oldest-first, reversing", feed_url);
        entries.reverse();
    }

    let feed_curi = to_canonical_link(feed_url.as_str(), None).map(|link| link.curi);
    let root_link = feed
        .links
        .iter()
        .filter(|link| link.rel.as_deref() != Some("self"))
        .filter_map(|link| to_canonical_link(&link.href, Some(feed_url)))
        .find(|link| Some(&link.curi) != feed_curi.as_ref());

    Ok(ParsedFeed {
        title: feed.title.map(|text| strip_html(&text.content)),
        root_link,
        entry_links: entries.into_iter().map(|(link, _)| link).collect(),
        generator: feed.generator.map(|generator| generator.content),
    })
}

/// Picks an entry's permalink: alternate link, then any link, then an http id
fn select_entry_link(entry: &feed_rs::model::Entry) -> Option<String> {
    let non_empty = |link: &&feed_rs::model::Link| !link.href.trim().is_empty();

    entry
        .links
        .iter()
        .filter(non_empty)
        .find(|link| {
            link.rel
                .as_deref()
                .map_or(true, |rel| rel.eq_ignore_ascii_case("alternate"))
        })
        .or_else(|| entry.links.iter().find(non_empty))
        .map(|link| link.href.trim().to_string())
        .or_else(|| {
            let id = entry.id.trim();
            (id.starts_with("http://") || id.starts_with("https://")).then(|| id.to_string())
        })
}

fn is_oldest_first(entries: &[(Link, Option<DateTime<Utc>>)]) -> bool {
    if entries.len() < 2 {
        return false;
    }
    let dates: Option<Vec<DateTime<Utc>>> = entries.iter().map(|(_, date)| *date).collect();
    match dates {
        Some(dates) => dates.windows(2).all(|w| w[0] < w[1]),
        None => false,
    }
}

fn strip_html(value: &str) -> String {
    if !value.contains('<') {
        return value.trim().to_string();
    }
    let fragment = Html::parse_fragment(value);
    fragment
        .root_element()
        .text()
        .collect::<String>()
        .trim()
        .to_string()
}

/// Returns true if a response looks like a feed rather than a page
pub fn looks_like_feed(content_type: Option<&str>, body: &str) -> bool {
    if let Some(content_type) = content_type {
        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains("html") {
            return false;
        }
        if content_type.contains("rss")
            || content_type.contains("atom")
            || content_type.contains("feed+json")
        {
            return true;
        }
    }

    let head: String = body.trim_start().chars().take(1024).collect::<String>().to_ascii_lowercase();
    if head.starts_with("<rss") || head.starts_with("<feed") || head.starts_with("<rdf:rdf") {
        return true;
    }
    if head.starts_with("<?xml") {
        return head.contains("<rss") || head.contains("<feed") || head.contains("<rdf:rdf");
    }
    head.starts_with('{') && head.contains("jsonfeed.org")
}
