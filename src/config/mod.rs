//! Configuration module for Blog Archive
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use blog_archive::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("blog-archive.toml")).unwrap();
//! println!("Crawl will fetch at most {} pages", config.crawl.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserConfig, Config, CrawlConfig, FetchConfig, ManualHostEntry, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{load_config, parse_config};
