//! Crawler module for recovering a blog's post history
//!
//! This module contains the guided crawling logic, including:
//! - HTML parsing and link extraction with structural paths
//! - Archive page detection
//! - Pagination walking
//! - Overall crawl coordination against the blog's feed

mod archives;
mod guided;
mod hardcoded;
mod html;
mod paged;
mod result;

pub use guided::guided_crawl;
pub use hardcoded::check_hardcoded;
pub use html::{extract_page_title, parse_html, AlternateFeedLink, PageLink, ParsedPage};
pub use result::{
    EvaluationPolicy, EvaluationStatus, FeedResult, FieldEvaluation, GroundTruth,
    GroundTruthField, GuidedCrawlResult, HardcodedError, HistoricalCrawlResult, HistoricalError,
    HistoricalLink, HistoricalOutcome, TitleMatchCounts, GROUND_TRUTH_FIELDS,
};
