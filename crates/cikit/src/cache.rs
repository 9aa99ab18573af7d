//! Per-run cache of live name listings.
//!
//! Built once at the start of a run, handed by reference to every lookup and
//! dropped (or [`RunCache::clear`]ed) when the run ends. Never shared across
//! runs, so a stale listing can only live as long as one run.

use crate::kind::Kind;
use std::collections::{BTreeSet, HashMap};

/// Live names per kind, as listed at the start of a run.
#[derive(Debug, Default)]
pub struct RunCache {
    names: HashMap<Kind, BTreeSet<String>>,
}

impl RunCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the listing of one kind, replacing any earlier one.
    pub fn insert(&mut self, kind: Kind, names: impl IntoIterator<Item = String>) {
        self.names.insert(kind, names.into_iter().collect());
    }

    /// Whether the listing of `kind` is loaded.
    pub fn is_loaded(&self, kind: Kind) -> bool {
        self.names.contains_key(&kind)
    }

    /// Whether `name` exists on the platform, or `None` if `kind` was never
    /// listed in this run.
    pub fn contains(&self, kind: Kind, name: &str) -> Option<bool> {
        self.names.get(&kind).map(|names| names.contains(name))
    }

    /// Names of `kind`, if listed.
    pub fn names(&self, kind: Kind) -> Option<&BTreeSet<String>> {
        self.names.get(&kind)
    }

    /// Drop all listings.
    pub fn clear(&mut self) {
        self.names.clear();
    }
}
