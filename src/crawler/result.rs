//! Guided crawl results and their ground-truth form

use crate::title::{match_titles, LinkTitle, LinkTitleSource, TitleMatch};
use crate::url::{canonical_uri_equal, CanonicalEqualityConfig, CanonicalUri, Link};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A post in a historical archive
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalLink {
    pub link: Link,
    pub title: LinkTitle,
}

/// A blog's complete post history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalCrawlResult {
    pub blog_link: Link,
    pub main_link: Link,
    /// Newest first; the last entry is the oldest post
    pub links: Vec<HistoricalLink>,
    /// Short descriptor of the structure the links were found in
    pub pattern: String,
    /// Free-form diagnostics
    pub extra: Vec<String>,
}

impl HistoricalCrawlResult {
    pub fn oldest(&self) -> Option<&HistoricalLink> {
        self.links.last()
    }

    /// Converts the result into the ground-truth record shape
    pub fn to_ground_truth(&self) -> GroundTruth {
        GroundTruth {
            pattern: self.pattern.clone(),
            entries_count: self.links.len(),
            blog_canonical_url: self.blog_link.curi.to_db_string(),
            main_page_canonical_url: self.main_link.curi.to_db_string(),
            oldest_entry_canonical_url: self
                .oldest()
                .map(|link| link.link.curi.to_db_string())
                .unwrap_or_default(),
            titles: self.links.iter().map(|link| link.title.value.clone()).collect(),
            links: self
                .links
                .iter()
                .map(|link| link.link.curi.to_db_string())
                .collect(),
        }
    }

    /// Compares the result field by field against an expected record
    pub fn evaluate_against(
        &self,
        expected: &GroundTruth,
        config: &CanonicalEqualityConfig,
    ) -> Vec<FieldEvaluation> {
        let actual = self.to_ground_truth();
        GROUND_TRUTH_FIELDS
            .iter()
            .map(|&(field, policy)| FieldEvaluation {
                field: field.name(),
                policy,
                status: evaluate_field(field, policy, &actual, expected, config),
            })
            .collect()
    }
}

/// Title agreement between crawled anchors and feed entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TitleMatchCounts {
    pub exact: usize,
    pub partial: usize,
    pub mismatch: usize,
}

impl TitleMatchCounts {
    pub fn record(&mut self, title_match: TitleMatch) {
        match title_match {
            TitleMatch::Exact => self.exact += 1,
            TitleMatch::Prefix | TitleMatch::Suffix => self.partial += 1,
            TitleMatch::Mismatch => self.mismatch += 1,
        }
    }
}

/// Summary of the feed a crawl was guided by
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedResult {
    pub url: String,
    pub final_url: String,
    pub title: Option<String>,
    pub entry_count: usize,
    pub title_matches: TitleMatchCounts,
}

/// Why no historical archive was found
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoricalError {
    #[error("No archive or pagination mechanism found")]
    NoArchiveMechanism,

    #[error("Feed has no entries to guide the crawl")]
    FeedHasNoEntries,

    #[error("Start page unreachable: {0}")]
    StartPageUnreachable(String),

    #[error("Page {url} unreachable during crawl: {message}")]
    PageUnreachable { url: String, message: String },

    #[error("Page budget of {max_pages} exhausted")]
    PageBudgetExhausted { max_pages: u32 },
}

/// A site-specific override that aborts the crawl
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HardcodedError {
    #[error("{host} requires manual handling: {reason}")]
    RequiresManualHandling { host: String, reason: String },
}

/// The historical part of a guided crawl
#[derive(Debug, Clone, PartialEq)]
pub enum HistoricalOutcome {
    Found(HistoricalCrawlResult),
    /// Nothing found; the error explains why when it is known
    NotFound(Option<HistoricalError>),
    /// Aborted by a site-specific override
    Hardcoded(HardcodedError),
}

/// Everything a guided crawl produced
#[derive(Debug, Clone, PartialEq)]
pub struct GuidedCrawlResult {
    pub feed_result: FeedResult,
    pub outcome: HistoricalOutcome,
    pub equality_config: CanonicalEqualityConfig,
}

impl GuidedCrawlResult {
    pub fn historical_result(&self) -> Option<&HistoricalCrawlResult> {
        match &self.outcome {
            HistoricalOutcome::Found(result) => Some(result),
            _ => None,
        }
    }

    pub fn historical_error(&self) -> Option<&HistoricalError> {
        match &self.outcome {
            HistoricalOutcome::NotFound(error) => error.as_ref(),
            _ => None,
        }
    }

    pub fn hardcoded_error(&self) -> Option<&HardcodedError> {
        match &self.outcome {
            HistoricalOutcome::Hardcoded(error) => Some(error),
            _ => None,
        }
    }
}

impl Serialize for GuidedCrawlResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("GuidedCrawlResult", 5)?;
        state.serialize_field("feed", &self.feed_result)?;
        state.serialize_field("historical", &self.historical_result())?;
        state.serialize_field(
            "historical_error",
            &self.historical_error().map(ToString::to_string),
        )?;
        state.serialize_field(
            "hardcoded_error",
            &self.hardcoded_error().map(ToString::to_string),
        )?;
        state.serialize_field("equality_config", &self.equality_config)?;
        state.end()
    }
}

/// Expected crawl output for one blog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruth {
    pub pattern: String,
    pub entries_count: usize,
    pub blog_canonical_url: String,
    pub main_page_canonical_url: String,
    pub oldest_entry_canonical_url: String,
    /// Same order as `links`
    pub titles: Vec<String>,
    pub links: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundTruthField {
    Pattern,
    EntriesCount,
    BlogCanonicalUrl,
    MainPageCanonicalUrl,
    OldestEntryCanonicalUrl,
    Titles,
    Links,
}

impl GroundTruthField {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pattern => "pattern",
            Self::EntriesCount => "entries_count",
            Self::BlogCanonicalUrl => "blog_canonical_url",
            Self::MainPageCanonicalUrl => "main_page_canonical_url",
            Self::OldestEntryCanonicalUrl => "oldest_entry_canonical_url",
            Self::Titles => "titles",
            Self::Links => "links",
        }
    }
}

/// How a field is compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationPolicy {
    /// Byte-equal values
    Exact,
    /// Canonical URI equality under the blog's config
    CanonicalUrl,
    /// Element-wise canonical URI equality
    CanonicalUrlList,
    /// Element-wise title matching; prefix/suffix is partial
    TitleList,
}

pub const GROUND_TRUTH_FIELDS: &[(GroundTruthField, EvaluationPolicy)] = &[
    (GroundTruthField::Pattern, EvaluationPolicy::Exact),
    (GroundTruthField::EntriesCount, EvaluationPolicy::Exact),
    (GroundTruthField::BlogCanonicalUrl, EvaluationPolicy::CanonicalUrl),
    (GroundTruthField::MainPageCanonicalUrl, EvaluationPolicy::CanonicalUrl),
    (GroundTruthField::OldestEntryCanonicalUrl, EvaluationPolicy::CanonicalUrl),
    (GroundTruthField::Titles, EvaluationPolicy::TitleList),
    (GroundTruthField::Links, EvaluationPolicy::CanonicalUrlList),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Exact,
    Partial,
    Mismatch,
}

/// Result of comparing one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldEvaluation {
    pub field: &'static str,
    pub policy: EvaluationPolicy,
    pub status: EvaluationStatus,
}

fn evaluate_field(
    field: GroundTruthField,
    policy: EvaluationPolicy,
    actual: &GroundTruth,
    expected: &GroundTruth,
    config: &CanonicalEqualityConfig,
) -> EvaluationStatus {
    match (field, policy) {
        (GroundTruthField::Pattern, EvaluationPolicy::Exact) => {
            exact_status(actual.pattern == expected.pattern)
        }
        (GroundTruthField::EntriesCount, EvaluationPolicy::Exact) => {
            exact_status(actual.entries_count == expected.entries_count)
        }
        (GroundTruthField::BlogCanonicalUrl, EvaluationPolicy::CanonicalUrl) => exact_status(
            curi_strings_equal(&actual.blog_canonical_url, &expected.blog_canonical_url, config),
        ),
        (GroundTruthField::MainPageCanonicalUrl, EvaluationPolicy::CanonicalUrl) => {
            exact_status(curi_strings_equal(
                &actual.main_page_canonical_url,
                &expected.main_page_canonical_url,
                config,
            ))
        }
        (GroundTruthField::OldestEntryCanonicalUrl, EvaluationPolicy::CanonicalUrl) => {
            exact_status(curi_strings_equal(
                &actual.oldest_entry_canonical_url,
                &expected.oldest_entry_canonical_url,
                config,
            ))
        }
        (GroundTruthField::Titles, EvaluationPolicy::TitleList) => {
            title_list_status(&actual.titles, &expected.titles)
        }
        (GroundTruthField::Links, EvaluationPolicy::CanonicalUrlList) => exact_status(
            actual.links.len() == expected.links.len()
                && actual
                    .links
                    .iter()
                    .zip(&expected.links)
                    .all(|(a, b)| curi_strings_equal(a, b, config)),
        ),
        _ => EvaluationStatus::Mismatch,
    }
}

fn exact_status(equal: bool) -> EvaluationStatus {
    if equal {
        EvaluationStatus::Exact
    } else {
        EvaluationStatus::Mismatch
    }
}

fn curi_strings_equal(a: &str, b: &str, config: &CanonicalEqualityConfig) -> bool {
    match (CanonicalUri::from_db_string(a), CanonicalUri::from_db_string(b)) {
        (Ok(a), Ok(b)) => canonical_uri_equal(&a, &b, config),
        _ => a == b,
    }
}

fn title_list_status(actual: &[String], expected: &[String]) -> EvaluationStatus {
    if actual.len() != expected.len() {
        return EvaluationStatus::Mismatch;
    }

    let mut status = EvaluationStatus::Exact;
    for (a, b) in actual.iter().zip(expected) {
        let a = LinkTitle::new(a.as_str(), LinkTitleSource::PageTitle);
        let b = LinkTitle::new(b.as_str(), LinkTitleSource::GroundTruth);
        match match_titles(&a, &b) {
            TitleMatch::Exact => {}
            TitleMatch::Prefix | TitleMatch::Suffix => status = EvaluationStatus::Partial,
            TitleMatch::Mismatch => return EvaluationStatus::Mismatch,
        }
    }
    status
}
