//! URL handling module for Blog Archive
//!
//! This module provides the canonical URI model, blog-specific canonical
//! equality, canonical-URI keyed collections and link resolution.

mod canonical;
mod collections;
mod equality;
mod link;
mod matcher;

pub use canonical::CanonicalUri;
pub use collections::{CanonicalUriMap, CanonicalUriSet};
pub use equality::{canonical_uri_equal, CanonicalEqualityConfig};
pub use link::{to_canonical_link, Link};
pub use matcher::matches_host_pattern;

pub(crate) use matcher::www_twin;
