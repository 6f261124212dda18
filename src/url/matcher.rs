/// Checks if a host matches a host pattern
///
/// Two kinds of pattern are supported:
/// 1. Exact: "medium.com" matches only "medium.com"
/// 2. Wildcard: "*.medium.com" matches "medium.com" and any subdomain of it
///
/// A `:port` suffix on the candidate is ignored and the comparison is
/// case-insensitive.
///
/// # Examples
///
/// ```
/// use blog_archive::url::matches_host_pattern;
///
/// assert!(matches_host_pattern("*.tumblr.com", "someone.tumblr.com"));
/// assert!(matches_host_pattern("*.tumblr.com", "tumblr.com"));
/// assert!(!matches_host_pattern("*.tumblr.com", "nottumblr.com"));
/// assert!(matches_host_pattern("medium.com", "Medium.com:443"));
/// ```
pub fn matches_host_pattern(pattern: &str, candidate: &str) -> bool {
    let candidate = strip_port(candidate).to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();

    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Returns the `www.`/apex twin of a host, if it has one
pub(crate) fn www_twin(host: &str) -> Option<String> {
    if let Some(apex) = host.strip_prefix("www.") {
        (apex.contains('.')).then(|| apex.to_string())
    } else if host.contains('.') && !host.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ':') {
        Some(format!("www.{}", host))
    } else {
        None
    }
}

fn strip_port(host: &str) -> &str {
    // IPv6 literals keep their brackets; only a trailing :digits is a port
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}
