//! HTML parser for extracting post links and page metadata
//!
//! This module handles parsing HTML content to extract:
//! - Anchors together with their structural path, used to group archive lists
//! - The page title (`og:title`, then `<title>`)
//! - Alternate feed links and `rel=next` pagination links

use crate::url::{to_canonical_link, Link};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// An anchor found on a page
#[derive(Debug, Clone)]
pub struct PageLink {
    pub link: Link,
    /// Anchor text with whitespace collapsed
    pub text: String,
    /// Structural path of the anchor: tag and class chain from the root
    pub xpath: String,
    pub rel: Option<String>,
}

/// A `<link rel="alternate">` pointing at a feed
#[derive(Debug, Clone)]
pub struct AlternateFeedLink {
    pub link: Link,
    pub title: Option<String>,
    /// The declared MIME type
    pub feed_type: String,
}

impl AlternateFeedLink {
    /// Returns true for per-post or site-wide comment feeds
    pub fn is_comment_feed(&self) -> bool {
        let title = self
            .title
            .as_deref()
            .unwrap_or_default()
            .to_ascii_lowercase();
        let path = self.link.curi.path().to_ascii_lowercase();
        title.contains("comment") || path.contains("/comments/")
    }
}

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    pub title: Option<String>,
    /// All http(s) anchors in document order
    pub links: Vec<PageLink>,
    /// `<link rel="next">` from the head
    pub next_link: Option<Link>,
    pub feed_links: Vec<AlternateFeedLink>,
}

const FEED_TYPES: &[&str] = &[
    "application/rss+xml",
    "application/atom+xml",
    "application/feed+json",
    "application/json",
];

/// Parses HTML content and extracts links and metadata
///
/// Relative links resolve against `<base href>` when present, otherwise
/// against `base_url`.
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only references
///
/// # Example
///
/// ```
/// use blog_archive::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].link.as_str(), "https://example.com/page");
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);
    let base_url = document_base(&document, base_url);

    ParsedPage {
        title: extract_page_title(&document),
        links: extract_links(&document, &base_url),
        next_link: extract_head_link(&document, &base_url, "next"),
        feed_links: extract_feed_links(&document, &base_url),
    }
}

fn document_base(document: &Html, base_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|element| element.value().attr("href"))
                .and_then(|href| base_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| base_url.clone())
}

/// Extracts the page title, preferring `og:title` over `<title>`
pub fn extract_page_title(document: &Html) -> Option<String> {
    let og_title = Selector::parse("meta[property='og:title'][content]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|element| element.value().attr("content"))
                .map(collapse_whitespace)
        })
        .filter(|s| !s.is_empty());
    if og_title.is_some() {
        return og_title;
    }

    let title_selector = Selector::parse("title").ok()?;
    document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<PageLink> {
    let mut links = Vec::new();

    let Ok(a_selector) = Selector::parse("a[href]") else {
        return links;
    };

    for element in document.select(&a_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(link) = to_canonical_link(href, Some(base_url)) else {
            continue;
        };

        links.push(PageLink {
            link,
            text: collapse_whitespace(&element.text().collect::<String>()),
            xpath: structural_path(&element),
            rel: element.value().attr("rel").map(|rel| rel.to_ascii_lowercase()),
        });
    }

    links
}

fn extract_head_link(document: &Html, base_url: &Url, rel: &str) -> Option<Link> {
    let selector = Selector::parse("link[rel][href]").ok()?;
    document
        .select(&selector)
        .filter(|element| {
            element
                .value()
                .attr("rel")
                .map_or(false, |value| {
                    value
                        .split_ascii_whitespace()
                        .any(|token| token.eq_ignore_ascii_case(rel))
                })
        })
        .find_map(|element| to_canonical_link(element.value().attr("href")?, Some(base_url)))
}

fn extract_feed_links(document: &Html, base_url: &Url) -> Vec<AlternateFeedLink> {
    let Ok(selector) = Selector::parse("link[rel][href][type]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| {
            let value = element.value();
            let is_alternate = value
                .attr("rel")?
                .split_ascii_whitespace()
                .any(|token| token.eq_ignore_ascii_case("alternate"));
            let feed_type = value.attr("type")?.trim().to_ascii_lowercase();
            if !is_alternate || !FEED_TYPES.contains(&feed_type.as_str()) {
                return None;
            }

            Some(AlternateFeedLink {
                link: to_canonical_link(value.attr("href")?, Some(base_url))?,
                title: value
                    .attr("title")
                    .map(collapse_whitespace)
                    .filter(|title| !title.is_empty()),
                feed_type,
            })
        })
        .collect()
}

/// Builds the tag/class chain from the root to `element`
///
/// Classes containing digits are left out; they are usually per-post ids
/// that would split one list into many groups.
fn structural_path(element: &ElementRef) -> String {
    let mut segments: Vec<String> = element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .map(|ancestor| path_segment(&ancestor))
        .collect();
    segments.reverse();
    segments.push(path_segment(element));
    segments.join("/")
}

fn path_segment(element: &ElementRef) -> String {
    let value = element.value();
    let mut classes: Vec<&str> = value
        .classes()
        .filter(|class| !class.chars().any(|c| c.is_ascii_digit()))
        .collect();
    classes.sort_unstable();

    if classes.is_empty() {
        value.name().to_string()
    } else {
        format!("{}.{}", value.name(), classes.join("."))
    }
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
