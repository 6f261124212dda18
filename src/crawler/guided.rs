//! Feed-guided historical crawl
//!
//! # Crawl Stages
//!
//! 1. Abort early for hosts that need manual handling
//! 2. Derive the blog's equality config and re-key the crawl's record
//! 3. Look for an archive list on the main page and a few archive-looking pages
//! 4. Walk pagination from the main page when no archive beats the feed
//! 5. Fall back to a browser render when neither finds anything
//! 6. Resolve a title for every link found

use crate::crawler::archives::{archive_candidate_links, find_archives_group};
use crate::crawler::html::PageLink;
use crate::crawler::paged::crawl_paged;
use crate::crawler::{
    check_hardcoded, extract_page_title, parse_html, FeedResult, GuidedCrawlResult,
    HistoricalCrawlResult, HistoricalError, HistoricalLink, HistoricalOutcome, TitleMatchCounts,
};
use crate::feed::{DiscoveredFetchedFeed, DiscoveredStartPage};
use crate::fetch::{default_load_more_button, render_page, request_page, CrawlContext, FindLoadMoreButton};
use crate::title::{match_titles, LinkTitle, LinkTitleSource};
use crate::url::{to_canonical_link, www_twin, CanonicalEqualityConfig, CanonicalUriMap, Link};
use scraper::Html;
use std::collections::BTreeSet;

/// Archive-looking links followed from the main page
const MAX_ARCHIVE_CANDIDATES: usize = 3;

/// A link list and where it came from
struct FoundLinks {
    page_link: Link,
    links: Vec<PageLink>,
    pattern: String,
}

/// Crawls a blog's full post history, guided by its feed
///
/// Never fails outright: every way the crawl can end is an outcome in the
/// returned result, alongside the feed summary and the equality config the
/// crawl settled on.
///
/// # Arguments
///
/// * `start_page` - The HTML page feed discovery started from, if any
/// * `feed` - The blog's feed; its entries, newest first, guide the crawl
/// * `ctx` - The crawl context; counters and the fetch record carry over
pub async fn guided_crawl(
    start_page: Option<&DiscoveredStartPage>,
    feed: &DiscoveredFetchedFeed,
    ctx: &mut CrawlContext,
) -> GuidedCrawlResult {
    let mut feed_result = FeedResult {
        url: feed.url.url.to_string(),
        final_url: feed.final_url.url.to_string(),
        title: feed.parsed.title.clone(),
        entry_count: feed.parsed.entry_links.len(),
        title_matches: TitleMatchCounts::default(),
    };

    let hosts = blog_hosts(start_page, feed);
    if let Some(error) = check_hardcoded(hosts.iter().map(String::as_str), &ctx.settings.manual_hosts)
    {
        return GuidedCrawlResult {
            feed_result,
            outcome: HistoricalOutcome::Hardcoded(error),
            equality_config: ctx.equality_config().clone(),
        };
    }

    let equality_config = derive_equality_config(start_page, feed);
    tracing::debug!("Equality config for {}: {:?}", feed.final_url.url, equality_config);
    ctx.update_equality_config(&equality_config);

    let outcome = if feed.parsed.entry_links.is_empty() {
        tracing::info!("Feed {} has no entries", feed.final_url.url);
        HistoricalOutcome::NotFound(Some(HistoricalError::FeedHasNoEntries))
    } else {
        match crawl_history(start_page, feed, ctx, &mut feed_result.title_matches).await {
            Ok(Some(result)) => HistoricalOutcome::Found(result),
            Ok(None) => HistoricalOutcome::NotFound(Some(HistoricalError::NoArchiveMechanism)),
            Err(error) => HistoricalOutcome::NotFound(Some(error)),
        }
    };

    match &outcome {
        HistoricalOutcome::Found(result) => tracing::info!(
            "Found {} posts for {} ({}) with {} requests",
            result.links.len(),
            result.blog_link.url,
            result.pattern,
            ctx.counters.requests_made
        ),
        HistoricalOutcome::NotFound(error) => tracing::info!(
            "No history for {}: {}",
            feed.final_url.url,
            error
                .as_ref()
                .map_or_else(|| "unknown".to_string(), ToString::to_string)
        ),
        HistoricalOutcome::Hardcoded(_) => {}
    }

    GuidedCrawlResult {
        feed_result,
        outcome,
        equality_config,
    }
}

/// Every host that identifies the blog
fn blog_hosts(start_page: Option<&DiscoveredStartPage>, feed: &DiscoveredFetchedFeed) -> Vec<String> {
    let mut hosts: Vec<String> = Vec::new();
    let links = start_page
        .into_iter()
        .flat_map(|start| [&start.url, &start.final_url])
        .chain([&feed.url, &feed.final_url])
        .chain(feed.parsed.root_link.as_ref());

    for link in links {
        let host = link.curi.host().to_string();
        if !hosts.contains(&host) {
            hosts.push(host);
        }
    }
    hosts
}

/// Derives which hosts are aliases and whether Tumblr paths fold
///
/// The feed's own host is left out, since feeds are often served by a
/// third party.
pub(crate) fn derive_equality_config(
    start_page: Option<&DiscoveredStartPage>,
    feed: &DiscoveredFetchedFeed,
) -> CanonicalEqualityConfig {
    let mut same_hosts = BTreeSet::new();
    let links = start_page
        .into_iter()
        .flat_map(|start| [&start.url, &start.final_url])
        .chain(feed.parsed.root_link.as_ref());
    for link in links {
        let host = link.curi.host().to_string();
        if let Some(twin) = www_twin(&host) {
            same_hosts.insert(twin);
        }
        same_hosts.insert(host);
    }

    let tumblr_generator = feed
        .parsed
        .generator
        .as_deref()
        .is_some_and(|generator| generator.to_ascii_lowercase().contains("tumblr"));
    let tumblr_host = same_hosts
        .iter()
        .map(String::as_str)
        .chain([feed.final_url.curi.host()])
        .any(|host| host.ends_with(".tumblr.com"));

    CanonicalEqualityConfig {
        same_hosts,
        expect_tumblr_paths: tumblr_generator || tumblr_host,
    }
}

async fn crawl_history(
    start_page: Option<&DiscoveredStartPage>,
    feed: &DiscoveredFetchedFeed,
    ctx: &mut CrawlContext,
    title_matches: &mut TitleMatchCounts,
) -> Result<Option<HistoricalCrawlResult>, HistoricalError> {
    let entries = &feed.parsed.entry_links;
    let config = ctx.equality_config().clone();
    let attempts = ctx.settings.transient_retry_attempts;
    let mut extra = Vec::new();

    let (main_link, main_body) = fetch_main_page(start_page, feed, ctx).await?;
    let blog_link = feed
        .parsed
        .root_link
        .clone()
        .unwrap_or_else(|| main_link.clone());
    let main_page = parse_html(&main_body, &main_link.url);

    // Archives
    ctx.report_progress("archives", 0);
    let mut archives = find_archives_group(&main_page, entries, &config).map(|found| FoundLinks {
        page_link: main_link.clone(),
        links: found.links,
        pattern: "archives".to_string(),
    });
    for candidate in archive_candidate_links(&main_page, &main_link, &config, MAX_ARCHIVE_CANDIDATES) {
        if ctx.counters.requests_made >= ctx.settings.max_pages {
            tracing::debug!("Page budget reached, skipping archive candidates");
            break;
        }

        let page = match request_page(ctx, &candidate, true, attempts).await {
            Ok(page) if page.is_html() => page,
            Ok(_) => continue,
            Err(e) => {
                tracing::info!("Skipping archive candidate {}: {}", candidate.url, e);
                continue;
            }
        };
        let parsed = parse_html(&page.body, &page.final_link.url);
        if let Some(found) = find_archives_group(&parsed, entries, &config) {
            if archives
                .as_ref()
                .map_or(true, |current| found.links.len() > current.links.len())
            {
                archives = Some(FoundLinks {
                    page_link: page.final_link.clone(),
                    links: found.links,
                    pattern: "archives".to_string(),
                });
            }
        }
    }
    let archives_count = archives.as_ref().map_or(0, |found| found.links.len());
    ctx.report_progress("archives", archives_count);

    // Paged; an archive listing only the feed's entries may be a recent posts widget
    let mut paged = None;
    if archives_count <= entries.len() {
        match crawl_paged(ctx, &main_link, &main_page, entries).await {
            Ok(Some(found)) => {
                extra.push(format!("paged: {} pages", found.pages));
                paged = Some(FoundLinks {
                    page_link: main_link.clone(),
                    links: found.links,
                    pattern: found.kind.pattern().to_string(),
                });
            }
            Ok(None) => {}
            Err(e) if archives.is_some() => extra.push(format!("paged: {}", e)),
            Err(e) => return Err(e),
        }
    }

    let best = match (archives, paged) {
        (Some(archives), Some(paged)) if paged.links.len() > archives.links.len() => Some(paged),
        (Some(archives), _) => Some(archives),
        (None, paged) => paged,
    };
    let best = match best {
        Some(best) => Some(best),
        None => render_archives(ctx, &main_link, feed, &mut extra).await,
    };
    let Some(found) = best else {
        return Ok(None);
    };

    ctx.report_progress("titles", found.links.len());
    let links = resolve_titles(ctx, found.links, feed, title_matches).await;

    extra.push(format!(
        "requests: {}, duplicates: {}, title fetches: {}, renders: {}",
        ctx.counters.requests_made,
        ctx.counters.duplicate_fetches,
        ctx.counters.title_requests_made,
        ctx.counters.puppeteer_requests_made
    ));

    Ok(Some(HistoricalCrawlResult {
        blog_link,
        main_link: found.page_link,
        links,
        pattern: found.pattern,
        extra,
    }))
}

/// Returns the main page's final link and body
async fn fetch_main_page(
    start_page: Option<&DiscoveredStartPage>,
    feed: &DiscoveredFetchedFeed,
    ctx: &mut CrawlContext,
) -> Result<(Link, String), HistoricalError> {
    if let Some(start) = start_page {
        return Ok((start.final_url.clone(), start.content.clone()));
    }

    let link = match &feed.parsed.root_link {
        Some(root) => root.clone(),
        None => to_canonical_link("/", Some(&feed.final_url.url)).ok_or_else(|| {
            HistoricalError::StartPageUnreachable(format!(
                "no main page for feed {}",
                feed.final_url.url
            ))
        })?,
    };

    let attempts = ctx.settings.transient_retry_attempts;
    let page = request_page(ctx, &link, false, attempts)
        .await
        .map_err(|e| HistoricalError::StartPageUnreachable(e.to_string()))?;
    if !page.is_html() {
        return Err(HistoricalError::StartPageUnreachable(format!(
            "{} is not an HTML page",
            page.final_link.url
        )));
    }
    Ok((page.final_link.clone(), page.body.clone()))
}

/// Looks for an archive list in the browser-rendered main page
async fn render_archives(
    ctx: &mut CrawlContext,
    main_link: &Link,
    feed: &DiscoveredFetchedFeed,
    extra: &mut Vec<String>,
) -> Option<FoundLinks> {
    ctx.puppeteer_client.as_ref()?;

    let titles = feed.parsed.entry_titles();
    let finder: &FindLoadMoreButton = &default_load_more_button;
    ctx.report_progress("rendered", 0);
    let body = match render_page(ctx, main_link, &titles, Some(finder)).await {
        Ok(body) => body,
        Err(e) => {
            tracing::info!("Rendering {} failed: {}", main_link.url, e);
            extra.push(format!("rendered: {}", e));
            return None;
        }
    };

    let parsed = parse_html(&body, &main_link.url);
    let found = find_archives_group(&parsed, &feed.parsed.entry_links, ctx.equality_config())?;
    Some(FoundLinks {
        page_link: main_link.clone(),
        links: found.links,
        pattern: "archives_rendered".to_string(),
    })
}

/// Picks a title for every link
///
/// Feed titles win, then anchor text, then the linked page's title while the
/// title fetch budget lasts, then the URL's last path segment.
async fn resolve_titles(
    ctx: &mut CrawlContext,
    links: Vec<PageLink>,
    feed: &DiscoveredFetchedFeed,
    title_matches: &mut TitleMatchCounts,
) -> Vec<HistoricalLink> {
    let mut feed_titles: CanonicalUriMap<LinkTitle> = CanonicalUriMap::new(ctx.equality_config().clone());
    for entry in &feed.parsed.entry_links {
        if let Some(title) = &entry.title {
            feed_titles.insert(entry.curi.clone(), title.clone());
        }
    }

    let mut resolved = Vec::with_capacity(links.len());
    for page_link in links {
        let anchor = LinkTitle::non_empty(&page_link.text, LinkTitleSource::AnchorText);
        let title = if let Some(feed_title) = feed_titles.get(&page_link.link.curi) {
            if let Some(anchor) = &anchor {
                title_matches.record(match_titles(anchor, feed_title));
            }
            feed_title.clone()
        } else if let Some(anchor) = anchor {
            anchor
        } else {
            match fetch_page_title(ctx, &page_link.link).await {
                Some(title) => title,
                None => url_title(&page_link.link),
            }
        };

        resolved.push(HistoricalLink {
            link: page_link.link,
            title,
        });
    }
    resolved
}

async fn fetch_page_title(ctx: &mut CrawlContext, link: &Link) -> Option<LinkTitle> {
    if ctx.counters.title_requests_made >= ctx.settings.max_title_fetches {
        return None;
    }
    ctx.counters.title_requests_made += 1;

    let attempts = ctx.settings.transient_retry_attempts;
    match request_page(ctx, link, true, attempts).await {
        Ok(page) if page.is_html() => {
            let document = Html::parse_document(&page.body);
            extract_page_title(&document)
                .and_then(|title| LinkTitle::non_empty(&title, LinkTitleSource::PageTitle))
        }
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("Could not fetch title of {}: {}", link.url, e);
            None
        }
    }
}

/// Title guessed from the last path segment
fn url_title(link: &Link) -> LinkTitle {
    let segment = link
        .curi
        .path()
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .map(|segment| segment.trim_end_matches(".html").replace(['-', '_'], " "))
        .unwrap_or_else(|| link.curi.host().to_string());
    LinkTitle::new(segment, LinkTitleSource::Url)
}
