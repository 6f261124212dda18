//! Archive page detection
//!
//! An archive is a list of anchors sharing one structural path that contains
//! every feed entry in feed order, or exactly reversed.

use crate::crawler::html::{PageLink, ParsedPage};
use crate::url::{CanonicalEqualityConfig, CanonicalUriSet, Link};
use std::collections::HashMap;

/// Anchors sharing one structural path, deduplicated by canonical URI
#[derive(Debug, Clone)]
pub(crate) struct LinkGroup {
    pub xpath: String,
    pub links: Vec<PageLink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GroupOrder {
    NewestFirst,
    OldestFirst,
}

/// A qualifying archive list, newest first
#[derive(Debug, Clone)]
pub(crate) struct ArchivesMatch {
    pub xpath: String,
    pub links: Vec<PageLink>,
}

/// Groups anchors by structural path in order of first appearance
pub(crate) fn group_links(links: &[PageLink], config: &CanonicalEqualityConfig) -> Vec<LinkGroup> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(LinkGroup, CanonicalUriSet)> = Vec::new();

    for page_link in links {
        let idx = *index.entry(page_link.xpath.as_str()).or_insert_with(|| {
            groups.push((
                LinkGroup {
                    xpath: page_link.xpath.clone(),
                    links: Vec::new(),
                },
                CanonicalUriSet::new(config.clone()),
            ));
            groups.len() - 1
        });

        let (group, seen) = &mut groups[idx];
        if seen.insert(page_link.link.curi.clone()) {
            group.links.push(page_link.clone());
        }
    }

    groups.into_iter().map(|(group, _)| group).collect()
}

/// Checks whether a group lists every feed entry in a consistent order
pub(crate) fn feed_order(
    group: &LinkGroup,
    feed_entries: &[Link],
    config: &CanonicalEqualityConfig,
) -> Option<GroupOrder> {
    if feed_entries.is_empty() || group.links.len() < feed_entries.len() {
        return None;
    }

    let curis = CanonicalUriSet::from_curis(
        group.links.iter().map(|page_link| page_link.link.curi.clone()),
        config.clone(),
    );
    let positions: Option<Vec<usize>> = feed_entries
        .iter()
        .map(|entry| curis.position(&entry.curi))
        .collect();
    let positions = positions?;

    // A lone entry is the newest post, so it must sit at one end of the list
    if let [position] = positions[..] {
        return if position == 0 {
            Some(GroupOrder::NewestFirst)
        } else if position + 1 == group.links.len() {
            Some(GroupOrder::OldestFirst)
        } else {
            None
        };
    }

    if positions.windows(2).all(|w| w[0] < w[1]) {
        Some(GroupOrder::NewestFirst)
    } else if positions.windows(2).all(|w| w[0] > w[1]) {
        Some(GroupOrder::OldestFirst)
    } else {
        None
    }
}

/// Finds the largest group on a page that qualifies as an archive
pub(crate) fn find_archives_group(
    page: &ParsedPage,
    feed_entries: &[Link],
    config: &CanonicalEqualityConfig,
) -> Option<ArchivesMatch> {
    let mut best: Option<ArchivesMatch> = None;

    for group in group_links(&page.links, config) {
        let Some(order) = feed_order(&group, feed_entries, config) else {
            continue;
        };
        if best
            .as_ref()
            .is_some_and(|current| current.links.len() >= group.links.len())
        {
            continue;
        }

        tracing::debug!(
            "Archive candidate {} with {} links ({:?})",
            group.xpath,
            group.links.len(),
            order
        );
        let mut links = group.links;
        if order == GroupOrder::OldestFirst {
            links.reverse();
        }
        best = Some(ArchivesMatch {
            xpath: group.xpath,
            links,
        });
    }

    best
}

/// Words in anchor text or path that point at an archive page
const ARCHIVE_HINTS: &[&str] = &["archive", "all posts", "all articles", "all entries"];

/// Picks links from the main page that look like they lead to an archive
pub(crate) fn archive_candidate_links(
    page: &ParsedPage,
    main_link: &Link,
    config: &CanonicalEqualityConfig,
    limit: usize,
) -> Vec<Link> {
    let main_key = main_link.curi.equality_key(config);
    let main_host = main_link.curi.host();
    let mut seen = CanonicalUriSet::new(config.clone());
    seen.insert(main_link.curi.clone());

    page.links
        .iter()
        .filter(|page_link| {
            let curi = &page_link.link.curi;
            let same_blog = curi.host() == main_host
                || (config.same_hosts.contains(curi.host())
                    && config.same_hosts.contains(main_host));
            let text = page_link.text.to_lowercase();
            let path = curi.path().to_lowercase();

            same_blog
                && curi.equality_key(config) != main_key
                && ARCHIVE_HINTS
                    .iter()
                    .any(|hint| text.contains(hint) || path.contains(&hint.replace(' ', "-")))
        })
        .filter(|page_link| seen.insert(page_link.link.curi.clone()))
        .take(limit)
        .map(|page_link| page_link.link.clone())
        .collect()
}
