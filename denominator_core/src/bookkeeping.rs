//! Dependency tracker and per-zone registry cache.
//!
//! Both are plain owned maps: only the owning actor's control loop reads
//! or writes them, so no locking is involved.

use denominator_env::Mailbox;
use std::collections::{BTreeMap, HashMap};
use std::time::SystemTime;

/// Services this actor depends on, with the time each was last refreshed.
///
/// Entries never expire; they leave only through `forget`.
#[derive(Debug, Default)]
pub struct DependencyTracker {
    dependencies: BTreeMap<String, SystemTime>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records (or refreshes) a dependency. Returns true if it was new.
    pub fn refresh(&mut self, name: impl Into<String>, at: SystemTime) -> bool {
        self.dependencies.insert(name.into(), at).is_none()
    }

    /// Removes a dependency. Returns true if it was tracked.
    pub fn forget(&mut self, name: &str) -> bool {
        self.dependencies.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dependencies.contains_key(name)
    }

    pub fn last_refreshed(&self, name: &str) -> Option<SystemTime> {
        self.dependencies.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

/// Registry mailbox per zone, learned from Inform messages.
#[derive(Debug, Default)]
pub struct RegistryCache {
    registries: HashMap<String, Mailbox>,
}

impl RegistryCache {
    /// Creates a cache sized for `capacity` zones; it grows past that if needed.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            registries: HashMap::with_capacity(capacity),
        }
    }

    /// Stores the registry for a zone, returning the one it replaced.
    pub fn inform(&mut self, zone: impl Into<String>, registry: Mailbox) -> Option<Mailbox> {
        self.registries.insert(zone.into(), registry)
    }

    pub fn get(&self, zone: &str) -> Option<&Mailbox> {
        self.registries.get(zone)
    }

    pub fn mailboxes(&self) -> impl Iterator<Item = &Mailbox> {
        self.registries.values()
    }

    pub fn len(&self) -> usize {
        self.registries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }
}
