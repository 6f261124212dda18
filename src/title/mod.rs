//! Title equalization and matching
//!
//! Titles from feeds, crawled pages and externally supplied ground truth are
//! compared through their equalized forms. Truncated titles are common, so a
//! prefix or suffix relationship counts as a partial match.

mod equalize;

pub use equalize::equalize_title;

use serde::{Deserialize, Serialize};

/// Where a title came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkTitleSource {
    /// Entry title from the blog's feed
    Feed,
    /// Text of the anchor that linked to the post
    AnchorText,
    /// `<title>` or `og:title` of the post page itself
    PageTitle,
    /// Supplied by an evaluation record
    GroundTruth,
    /// Nothing better was available; derived from the URL
    Url,
}

/// A title with its equalized comparison form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTitle {
    pub value: String,
    pub equalized_value: String,
    pub source: LinkTitleSource,
}

impl LinkTitle {
    pub fn new(value: impl Into<String>, source: LinkTitleSource) -> Self {
        let value = value.into().trim().to_string();
        let equalized_value = equalize_title(&value);
        Self {
            value,
            equalized_value,
            source,
        }
    }

    /// Builds a title unless the value is blank
    pub fn non_empty(value: &str, source: LinkTitleSource) -> Option<Self> {
        let title = Self::new(value, source);
        (!title.equalized_value.is_empty()).then_some(title)
    }
}

/// Outcome of comparing two titles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleMatch {
    Exact,
    /// One title is a prefix of the other
    Prefix,
    /// One title is a suffix of the other
    Suffix,
    Mismatch,
}

impl TitleMatch {
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Prefix | Self::Suffix)
    }

    pub fn is_any(&self) -> bool {
        !matches!(self, Self::Mismatch)
    }
}

/// Compares two equalized title values
///
/// Exact beats prefix beats suffix. An empty value only matches exactly.
pub fn match_equalized(a: &str, b: &str) -> TitleMatch {
    if a == b {
        return TitleMatch::Exact;
    }
    if a.is_empty() || b.is_empty() {
        return TitleMatch::Mismatch;
    }
    if a.starts_with(b) || b.starts_with(a) {
        TitleMatch::Prefix
    } else if a.ends_with(b) || b.ends_with(a) {
        TitleMatch::Suffix
    } else {
        TitleMatch::Mismatch
    }
}

/// Compares two titles through their equalized values
pub fn match_titles(a: &LinkTitle, b: &LinkTitle) -> TitleMatch {
    match_equalized(&a.equalized_value, &b.equalized_value)
}
