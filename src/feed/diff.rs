//! Incremental diff of a fresh feed against a stored archive

use crate::feed::ParsedFeed;
use crate::url::{to_canonical_link, CanonicalEqualityConfig, CanonicalUri, CanonicalUriSet, Link};
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedDiffError {
    /// The feed cannot be anchored against the known archive
    #[error("Feed entries could not be matched against known posts")]
    NoMatch,
}

/// Returns the feed entries published after the newest known post
///
/// # Anchoring
///
/// `known_curis` is treated as a set, so its order does not matter. The
/// anchor is the first feed entry that is known, discarded or listed in
/// `missing_from_feed_urls`. Every entry before it is new, except discarded
/// ones. The call fails closed with [`FeedDiffError::NoMatch`] when no feed
/// entry can anchor.
///
/// # Arguments
///
/// * `parsed_feed` - The freshly fetched feed, newest first
/// * `feed_final_url` - Base for resolving relative exception URLs
/// * `known_curis` - The stored archive, in any order
/// * `discarded_urls` - Entries deliberately excluded from the archive
/// * `missing_from_feed_urls` - Known posts that are not expected in the feed
/// * `config` - The blog's equality config
///
/// # Returns
///
/// New entry links in feed order.
pub fn extract_new_posts_from_feed(
    parsed_feed: &ParsedFeed,
    feed_final_url: &Url,
    known_curis: &[CanonicalUri],
    discarded_urls: &[String],
    missing_from_feed_urls: &[String],
    config: &CanonicalEqualityConfig,
) -> Result<Vec<Link>, FeedDiffError> {
    let entries = &parsed_feed.entry_links;
    if entries.is_empty() {
        tracing::warn!("Feed {} has no entries, nothing to diff", feed_final_url);
        return Ok(Vec::new());
    }

    let discarded = curi_set(discarded_urls, feed_final_url, config);
    let missing = curi_set(missing_from_feed_urls, feed_final_url, config);
    let known = CanonicalUriSet::from_curis(known_curis.iter().cloned(), config.clone());
    let is_anchor = |curi: &CanonicalUri| {
        known.contains(curi) || discarded.contains(curi) || missing.contains(curi)
    };

    let Some(anchor) = entries.iter().position(|link| is_anchor(&link.curi)) else {
        tracing::warn!(
            "No entry of feed {} matches {} known posts",
            feed_final_url,
            known_curis.len()
        );
        return Err(FeedDiffError::NoMatch);
    };

    for link in entries[anchor..].iter().filter(|link| !is_anchor(&link.curi)) {
        tracing::warn!(
            "Ignoring unknown entry {} older than the newest known post",
            link.url
        );
    }

    let new_links: Vec<Link> = entries[..anchor]
        .iter()
        .filter(|link| !discarded.contains(&link.curi))
        .cloned()
        .collect();

    tracing::info!(
        "Feed {} has {} new posts",
        feed_final_url,
        new_links.len()
    );
    Ok(new_links)
}

fn curi_set(urls: &[String], base: &Url, config: &CanonicalEqualityConfig) -> CanonicalUriSet {
    CanonicalUriSet::from_curis(
        urls.iter()
            .filter_map(|url| to_canonical_link(url, Some(base)))
            .map(|link| link.curi),
        config.clone(),
    )
}
