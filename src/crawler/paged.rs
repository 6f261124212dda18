//! Paginated blog walking
//!
//! Page 1 is the main page. A link group qualifies when its first links are
//! the newest feed entries; the walk then follows next-page links and keeps
//! collecting the group with the same structural path.

use crate::crawler::archives::{feed_order, group_links, GroupOrder, LinkGroup};
use crate::crawler::html::{PageLink, ParsedPage};
use crate::crawler::{parse_html, HistoricalError};
use crate::fetch::{request_page, CrawlContext};
use crate::url::{canonical_uri_equal, CanonicalEqualityConfig, CanonicalUriSet, Link};
use regex::Regex;
use std::sync::OnceLock;

/// How the next page was located
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NextPageKind {
    /// `/page/N` or `/p/N` path segment
    Path,
    /// `?page=N` style query parameter
    Query,
    /// `rel=next` or "Older posts" style anchor
    Next,
}

impl NextPageKind {
    pub fn pattern(&self) -> &'static str {
        match self {
            Self::Path => "paged_path",
            Self::Query => "paged_query",
            Self::Next => "paged_next",
        }
    }
}

/// Links collected across all pages, newest first
#[derive(Debug, Clone)]
pub(crate) struct PagedMatch {
    pub links: Vec<PageLink>,
    pub kind: NextPageKind,
    pub pages: u32,
}

const PAGE_QUERY_KEYS: &[&str] = &["page", "paged", "p"];

fn page_path_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^(.*?)/(?:page|p)/(\d+)/?$").expect("valid regex"))
}

fn older_text_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(
            r"(?i)^[\s«‹←<»›→>]*(?:older|next|earlier|previous\s+(?:posts|entries|articles)|more\s+posts)(?:\s+(?:posts|entries|articles|page))?[\s«‹←<»›→>]*$",
        )
        .expect("valid regex")
    })
}

/// Splits a path into its pagination prefix and page number
fn split_page_path(path: &str) -> (&str, Option<u32>) {
    match page_path_regex().captures(path) {
        Some(captures) => {
            let prefix = captures.get(1).map_or("", |m| m.as_str());
            let number = captures.get(2).and_then(|m| m.as_str().parse().ok());
            (prefix, number)
        }
        None => (path.trim_end_matches('/'), None),
    }
}

fn same_host(a: &Link, b: &Link, config: &CanonicalEqualityConfig) -> bool {
    a.curi.host() == b.curi.host()
        || (config.same_hosts.contains(a.curi.host()) && config.same_hosts.contains(b.curi.host()))
}

fn query_page_number(link: &Link) -> Option<u32> {
    link.url
        .query_pairs()
        .find(|(key, _)| PAGE_QUERY_KEYS.contains(&key.as_ref()))
        .and_then(|(_, value)| value.parse().ok())
}

/// Finds the link to page `page_number + 1`
///
/// Numbered path links win over numbered query links, which win over
/// `rel=next` and finally over "Older posts" style anchor text.
pub(crate) fn find_next_page(
    page: &ParsedPage,
    current: &Link,
    page_number: u32,
    config: &CanonicalEqualityConfig,
) -> Option<(Link, NextPageKind)> {
    let wanted = page_number + 1;
    let candidates = || {
        page.links
            .iter()
            .filter(|page_link| same_host(&page_link.link, current, config))
    };

    let (current_prefix, _) = split_page_path(current.curi.path());
    if let Some(found) = candidates().find(|page_link| {
        split_page_path(page_link.link.curi.path()) == (current_prefix, Some(wanted))
    }) {
        return Some((found.link.clone(), NextPageKind::Path));
    }

    let current_path = current.curi.path().trim_end_matches('/');
    if let Some(found) = candidates().find(|page_link| {
        page_link.link.curi.path().trim_end_matches('/') == current_path
            && query_page_number(&page_link.link) == Some(wanted)
    }) {
        return Some((found.link.clone(), NextPageKind::Query));
    }

    let rel_next = candidates()
        .find(|page_link| {
            page_link
                .rel
                .as_deref()
                .is_some_and(|rel| rel.split_whitespace().any(|token| token.eq_ignore_ascii_case("next")))
        })
        .map(|page_link| page_link.link.clone())
        .or_else(|| {
            page.next_link
                .clone()
                .filter(|link| same_host(link, current, config))
        });
    if let Some(link) = rel_next {
        return Some((link, NextPageKind::Next));
    }

    candidates()
        .find(|page_link| older_text_regex().is_match(&page_link.text))
        .map(|page_link| (page_link.link.clone(), NextPageKind::Next))
}

/// Picks the page-1 group whose leading links match the most feed entries
fn first_page_group(
    groups: Vec<LinkGroup>,
    feed_entries: &[Link],
    config: &CanonicalEqualityConfig,
) -> Option<LinkGroup> {
    let mut best: Option<(usize, LinkGroup)> = None;

    for group in groups {
        let prefix = group
            .links
            .iter()
            .zip(feed_entries)
            .take_while(|(page_link, entry)| {
                canonical_uri_equal(&page_link.link.curi, &entry.curi, config)
            })
            .count();
        if prefix == 0 {
            continue;
        }

        // Earlier groups win ties
        let better = best.as_ref().map_or(true, |(best_prefix, best_group)| {
            (prefix, group.links.len()) > (*best_prefix, best_group.links.len())
        });
        if better {
            best = Some((prefix, group));
        }
    }

    best.map(|(_, group)| group)
}

/// Walks a paginated blog from its main page
///
/// # Arguments
///
/// * `ctx` - The crawl context; every page counts against the page budget
/// * `main_link` - The main page's final link
/// * `main_page` - The parsed main page
/// * `feed_entries` - Feed entry links, newest first
///
/// # Returns
///
/// * `Ok(Some(_))` - A walk that lists every feed entry in order
/// * `Ok(None)` - No pagination, or the pages do not agree with the feed
/// * `Err(_)` - The walk could not complete
pub(crate) async fn crawl_paged(
    ctx: &mut CrawlContext,
    main_link: &Link,
    main_page: &ParsedPage,
    feed_entries: &[Link],
) -> Result<Option<PagedMatch>, HistoricalError> {
    let config = ctx.equality_config().clone();
    let Some(group) = first_page_group(group_links(&main_page.links, &config), feed_entries, &config)
    else {
        tracing::debug!("No group on {} starts with the feed's entries", main_link.url);
        return Ok(None);
    };
    let Some((mut next, kind)) = find_next_page(main_page, main_link, 1, &config) else {
        tracing::debug!("No next page link on {}", main_link.url);
        return Ok(None);
    };

    tracing::info!(
        "Walking pages from {} along {} ({})",
        main_link.url,
        group.xpath,
        kind.pattern()
    );

    let xpath = group.xpath;
    let mut collected = CanonicalUriSet::from_curis(
        group.links.iter().map(|page_link| page_link.link.curi.clone()),
        config.clone(),
    );
    let mut links = group.links;
    let mut visited = CanonicalUriSet::new(config.clone());
    visited.insert(main_link.curi.clone());
    let mut page_number = 1;

    loop {
        if !visited.insert(next.curi.clone()) {
            tracing::debug!("Pagination returns to visited page {}", next.url);
            break;
        }
        if ctx.counters.requests_made >= ctx.settings.max_pages {
            tracing::warn!(
                "Page budget of {} exhausted at {}",
                ctx.settings.max_pages,
                next.url
            );
            return Err(HistoricalError::PageBudgetExhausted {
                max_pages: ctx.settings.max_pages,
            });
        }

        let attempts = ctx.settings.transient_retry_attempts;
        let fetched = request_page(ctx, &next, true, attempts).await.map_err(|e| {
            HistoricalError::PageUnreachable {
                url: next.url.to_string(),
                message: e.to_string(),
            }
        })?;
        if !fetched.is_html() {
            tracing::debug!("Page {} is not HTML, stopping", next.url);
            break;
        }
        page_number += 1;

        let parsed = parse_html(&fetched.body, &fetched.final_link.url);
        let Some(page_group) = group_links(&parsed.links, &config)
            .into_iter()
            .find(|candidate| candidate.xpath == xpath)
        else {
            tracing::debug!("Page {} has no links along {}", next.url, xpath);
            break;
        };

        let before = links.len();
        links.extend(
            page_group
                .links
                .into_iter()
                .filter(|page_link| collected.insert(page_link.link.curi.clone())),
        );
        if links.len() == before {
            tracing::debug!("Page {} adds no new links, stopping", next.url);
            break;
        }
        ctx.report_progress("paged", links.len());

        match find_next_page(&parsed, &fetched.final_link, page_number, &config) {
            Some((link, _)) => next = link,
            None => break,
        }
    }

    let walked = LinkGroup {
        xpath,
        links,
    };
    if feed_order(&walked, feed_entries, &config) != Some(GroupOrder::NewestFirst) {
        tracing::info!(
            "Paged links from {} do not list the feed's entries in order",
            main_link.url
        );
        return Ok(None);
    }

    Ok(Some(PagedMatch {
        links: walked.links,
        kind,
        pages: page_number,
    }))
}
