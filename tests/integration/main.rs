//! Integration tests for Blog Archive
//!
//! These tests use wiremock to serve mock blogs and exercise discovery,
//! guided crawls and feed diffs end-to-end.

mod common;
mod discovery_tests;
mod feed_diff_tests;
mod guided_crawl_tests;
