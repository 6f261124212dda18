use crate::config::types::{
    BrowserConfig, Config, CrawlConfig, FetchConfig, ManualHostEntry, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetch_config(&config.fetch)?;
    validate_crawl_config(&config.crawl)?;
    validate_browser_config(&config.browser)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_manual_hosts(&config.manual)?;
    Ok(())
}

/// Validates fetch configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "connect_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.retry_delays_ms.is_empty() {
        return Err(ConfigError::Validation(
            "retry_delays_ms must contain at least one delay".to_string(),
        ));
    }

    if config.retry_delays_ms.windows(2).any(|w| w[0] > w[1]) {
        return Err(ConfigError::Validation(format!(
            "retry_delays_ms must be non-decreasing, got {:?}",
            config.retry_delays_ms
        )));
    }

    if config.transient_retry_attempts == 0 {
        return Err(ConfigError::Validation(
            "transient_retry_attempts must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawl configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.max_pages == 0 {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1".to_string(),
        ));
    }

    if config.discovery_attempts == 0 {
        return Err(ConfigError::Validation(
            "discovery_attempts must be >= 1".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.max_browser_count == 0 {
        return Err(ConfigError::Validation(
            "max_browser_count must be >= 1".to_string(),
        ));
    }
    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    Ok(())
}

/// Validates manual-handling host entries
fn validate_manual_hosts(entries: &[ManualHostEntry]) -> Result<(), ConfigError> {
    for entry in entries {
        validate_domain_pattern(&entry.domain)?;

        if entry.reason.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Manual host '{}' must give a reason",
                entry.domain
            )));
        }
    }
    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    let domain = pattern.strip_prefix("*.").unwrap_or(pattern);

    if domain.is_empty() {
        return Err(ConfigError::Validation(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
        || domain.contains("..")
    {
        return Err(ConfigError::Validation(format!(
            "Domain '{}' is malformed",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}
