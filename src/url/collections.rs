//! Insertion-ordered collections keyed by canonical URI equality

use crate::url::{CanonicalEqualityConfig, CanonicalUri};
use std::collections::HashMap;

/// Map from canonical URI to a value, keyed by [`CanonicalUri::equality_key`]
///
/// Entries keep insertion order. Changing the equality config re-keys the
/// map; entries that become equal collapse into the first one inserted.
#[derive(Debug, Clone)]
pub struct CanonicalUriMap<V> {
    config: CanonicalEqualityConfig,
    index: HashMap<String, usize>,
    entries: Vec<(CanonicalUri, V)>,
}

impl<V> CanonicalUriMap<V> {
    pub fn new(config: CanonicalEqualityConfig) -> Self {
        Self {
            config,
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    pub fn config(&self) -> &CanonicalEqualityConfig {
        &self.config
    }

    /// Inserts a value unless an equal URI is already present
    ///
    /// Returns true if the entry was inserted.
    pub fn insert(&mut self, curi: CanonicalUri, value: V) -> bool {
        let key = curi.equality_key(&self.config);
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.entries.len());
        self.entries.push((curi, value));
        true
    }

    pub fn get(&self, curi: &CanonicalUri) -> Option<&V> {
        self.index
            .get(&curi.equality_key(&self.config))
            .map(|&idx| &self.entries[idx].1)
    }

    pub fn contains(&self, curi: &CanonicalUri) -> bool {
        self.index.contains_key(&curi.equality_key(&self.config))
    }

    /// Position of the entry equal to `curi`, in insertion order
    pub fn position(&self, curi: &CanonicalUri) -> Option<usize> {
        self.index.get(&curi.equality_key(&self.config)).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CanonicalUri, &V)> {
        self.entries.iter().map(|(curi, value)| (curi, value))
    }

    /// Re-keys every entry under a new equality config
    pub fn update_equality_config(&mut self, config: CanonicalEqualityConfig) {
        if config == self.config {
            return;
        }
        let entries = std::mem::take(&mut self.entries);
        self.config = config;
        self.index.clear();
        for (curi, value) in entries {
            self.insert(curi, value);
        }
    }
}

/// Set of canonical URIs under a blog's equality config
#[derive(Debug, Clone)]
pub struct CanonicalUriSet {
    inner: CanonicalUriMap<()>,
}

impl CanonicalUriSet {
    pub fn new(config: CanonicalEqualityConfig) -> Self {
        Self {
            inner: CanonicalUriMap::new(config),
        }
    }

    pub fn from_curis<I>(curis: I, config: CanonicalEqualityConfig) -> Self
    where
        I: IntoIterator<Item = CanonicalUri>,
    {
        let mut set = Self::new(config);
        for curi in curis {
            set.insert(curi);
        }
        set
    }

    /// Returns true if the URI was not already present
    pub fn insert(&mut self, curi: CanonicalUri) -> bool {
        self.inner.insert(curi, ())
    }

    pub fn contains(&self, curi: &CanonicalUri) -> bool {
        self.inner.contains(curi)
    }

    pub fn position(&self, curi: &CanonicalUri) -> Option<usize> {
        self.inner.position(curi)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanonicalUri> {
        self.inner.iter().map(|(curi, _)| curi)
    }

    pub fn config(&self) -> &CanonicalEqualityConfig {
        self.inner.config()
    }

    pub fn update_equality_config(&mut self, config: CanonicalEqualityConfig) {
        self.inner.update_equality_config(config);
    }
}
