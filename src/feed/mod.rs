//! Feed discovery, parsing and incremental diff
//!
//! Discovery turns an arbitrary input string into a single fetched feed (and
//! the start page it was found on), or explains why it could not. The diff
//! compares a freshly fetched feed against a stored archive without crawling.

mod diff;
mod discovery;
mod parser;

pub use diff::{extract_new_posts_from_feed, FeedDiffError};
pub use discovery::{
    discover_feeds_at_url, DiscoverFeedsResult, DiscoveredFeedLink, DiscoveredFetchedFeed,
    DiscoveredStartPage,
};
pub use parser::{looks_like_feed, parse_feed, FeedParseError, ParsedFeed};
