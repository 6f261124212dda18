use crate::UrlError;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// List of tracking query parameters dropped during canonicalization
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_cid",
    "mc_eid",
];

/// Canonical identity of a URL, distinct from the URL used for display
///
/// The scheme is not part of the identity, default ports are dropped, the
/// host is lowercased and the fragment is only kept for hash-bang routes.
/// Comparison that takes a blog's quirks into account goes through
/// [`canonical_uri_equal`](super::canonical_uri_equal).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalUri {
    host: String,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl CanonicalUri {
    /// Builds a canonical URI from a parsed URL
    ///
    /// # Canonicalization Steps
    ///
    /// 1. Reject anything that is not http or https
    /// 2. Lowercase the host and keep a non-default port
    /// 3. Collapse repeated slashes in the path; empty path becomes /
    /// 4. Drop tracking query parameters and sort the rest by key
    /// 5. Drop the fragment unless it is a hash-bang route (`#!`)
    ///
    /// # Examples
    ///
    /// ```
    /// use blog_archive::url::CanonicalUri;
    /// use url::Url;
    ///
    /// let url = Url::parse("http://Example.COM//posts/?utm_source=x#top").unwrap();
    /// let curi = CanonicalUri::from_url(&url).unwrap();
    /// assert_eq!(curi.to_string(), "example.com/posts/");
    /// ```
    pub fn from_url(url: &Url) -> Result<Self, UrlError> {
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(UrlError::InvalidScheme(url.scheme().to_string()));
        }

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_lowercase(),
            _ => return Err(UrlError::MissingHost),
        };
        let host = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host,
        };

        let path = collapse_slashes(url.path());
        let query = canonical_query(url);
        let fragment = url
            .fragment()
            .filter(|fragment| fragment.starts_with('!'))
            .map(|fragment| fragment.to_string());

        Ok(Self {
            host,
            path,
            query,
            fragment,
        })
    }

    /// Parses a raw URL string into a canonical URI
    pub fn parse(raw: &str) -> Result<Self, UrlError> {
        let url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
        Self::from_url(&url)
    }

    /// Restores a canonical URI from its persisted string form
    ///
    /// This is the inverse of [`CanonicalUri::to_db_string`].
    pub fn from_db_string(s: &str) -> Result<Self, UrlError> {
        if s.is_empty() || s.contains("://") {
            return Err(UrlError::Malformed(s.to_string()));
        }

        let (rest, fragment) = match s.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_string())),
            None => (s, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query.to_string())),
            None => (rest, None),
        };
        let (host, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], rest[idx..].to_string()),
            None => (rest, "/".to_string()),
        };

        if host.is_empty() || host.chars().any(char::is_whitespace) {
            return Err(UrlError::Malformed(s.to_string()));
        }

        Ok(Self {
            host: host.to_lowercase(),
            path,
            query: query.filter(|q| !q.is_empty()),
            fragment: fragment.filter(|f| !f.is_empty()),
        })
    }

    /// Returns the persisted string form (`host/path?query#!fragment`)
    pub fn to_db_string(&self) -> String {
        let mut s = String::with_capacity(self.host.len() + self.path.len() + 16);
        s.push_str(&self.host);
        s.push_str(&self.path);
        if let Some(query) = &self.query {
            s.push('?');
            s.push_str(query);
        }
        if let Some(fragment) = &self.fragment {
            s.push('#');
            s.push_str(fragment);
        }
        s
    }

    /// Host, including a non-default port
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Path, always starting with `/`
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Returns true if the path is the site root
    pub fn is_root(&self) -> bool {
        self.path == "/" && self.query.is_none()
    }
}

impl fmt::Display for CanonicalUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_db_string())
    }
}

impl From<CanonicalUri> for String {
    fn from(curi: CanonicalUri) -> Self {
        curi.to_db_string()
    }
}

impl TryFrom<String> for CanonicalUri {
    type Error = UrlError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_db_string(&s)
    }
}

/// Collapses runs of slashes; an empty path becomes `/`
fn collapse_slashes(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len().max(1));
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        collapsed.push(c);
    }

    if collapsed.is_empty() || !collapsed.starts_with('/') {
        collapsed.insert(0, '/');
    }
    collapsed
}

/// Filters out tracking parameters and sorts the remaining ones by key
fn canonical_query(url: &Url) -> Option<String> {
    url.query()?;

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if params.is_empty() {
        return None;
    }

    params.sort_by(|a, b| a.0.cmp(&b.0));

    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish();
    Some(query)
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
