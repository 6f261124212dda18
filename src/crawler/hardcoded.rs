//! Hosts known to need bespoke handling

use crate::config::ManualHostEntry;
use crate::crawler::HardcodedError;
use crate::url::matches_host_pattern;

/// Built-in `(host pattern, reason)` overrides
const HARDCODED_HOSTS: &[(&str, &str)] = &[
    ("*.medium.com", "archive is rendered client-side behind a paywall"),
    ("twitter.com", "not a blog"),
    ("x.com", "not a blog"),
    ("*.youtube.com", "not a blog"),
    ("*.facebook.com", "not a blog"),
    ("*.linkedin.com", "posts require login"),
];

/// Returns the override for the first host that matches one
///
/// Configured entries are checked before the built-in table.
pub fn check_hardcoded<'a, I>(hosts: I, manual_hosts: &[ManualHostEntry]) -> Option<HardcodedError>
where
    I: IntoIterator<Item = &'a str>,
{
    for host in hosts {
        let configured = manual_hosts
            .iter()
            .find(|entry| matches_host_pattern(&entry.domain, host))
            .map(|entry| entry.reason.as_str());
        let built_in = || {
            HARDCODED_HOSTS
                .iter()
                .find(|(pattern, _)| matches_host_pattern(pattern, host))
                .map(|(_, reason)| *reason)
        };

        if let Some(reason) = configured.or_else(built_in) {
            tracing::info!("{} requires manual handling: {}", host, reason);
            return Some(HardcodedError::RequiresManualHandling {
                host: host.to_string(),
                reason: reason.to_string(),
            });
        }
    }
    None
}
