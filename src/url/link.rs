use crate::title::LinkTitle;
use crate::url::CanonicalUri;
use serde::{Deserialize, Serialize};
use url::Url;

/// A link as found in a feed or page
///
/// `url` is kept for display and fetching; `curi` is the comparison key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub url: Url,
    pub curi: CanonicalUri,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<LinkTitle>,
}

impl Link {
    /// Builds a link from an already parsed URL
    pub fn from_url(url: Url) -> Option<Self> {
        let curi = CanonicalUri::from_url(&url).ok()?;
        Some(Self {
            url,
            curi,
            title: None,
        })
    }

    /// Returns the same link carrying a title
    pub fn with_title(mut self, title: LinkTitle) -> Self {
        self.title = Some(title);
        self
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

/// Resolves a raw URL string into a canonical link
///
/// Relative references are resolved against `base`. Returns `None` for input
/// that is not a usable http(s) link:
/// - empty strings and fragment-only references
/// - javascript:, mailto:, tel: and data: URIs
/// - anything that does not parse
///
/// # Examples
///
/// ```
/// use blog_archive::url::to_canonical_link;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/blog/").unwrap();
/// let link = to_canonical_link("../about/", Some(&base)).unwrap();
/// assert_eq!(link.as_str(), "https://example.com/about/");
/// assert_eq!(link.curi.to_string(), "example.com/about/");
///
/// assert!(to_canonical_link("mailto:me@example.com", Some(&base)).is_none());
/// ```
pub fn to_canonical_link(raw: &str, base: Option<&Url>) -> Option<Link> {
    let raw = raw.trim();

    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }

    let lowered = raw.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let url = match base {
        Some(base) => base.join(raw).ok()?,
        None => Url::parse(raw).ok()?,
    };

    Link::from_url(url)
}
