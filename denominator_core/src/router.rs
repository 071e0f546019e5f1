//! Endpoint router: the downstream instances an actor can talk to.

use denominator_env::Mailbox;
use rand::Rng;
use std::collections::BTreeMap;

/// Named set of reachable endpoints.
///
/// Membership changes only through `insert`/`remove`. Names are kept
/// ordered so that a seeded RNG picks the same endpoint on every run.
#[derive(Debug, Default)]
pub struct EndpointRouter {
    endpoints: BTreeMap<String, Mailbox>,
}

impl EndpointRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an endpoint, returning the mailbox it replaced.
    pub fn insert(&mut self, name: impl Into<String>, mailbox: Mailbox) -> Option<Mailbox> {
        self.endpoints.insert(name.into(), mailbox)
    }

    pub fn remove(&mut self, name: &str) -> Option<Mailbox> {
        self.endpoints.remove(name)
    }

    pub fn named(&self, name: &str) -> Option<&Mailbox> {
        self.endpoints.get(name)
    }

    /// Uniform random pick among current endpoints, `None` when empty.
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(&str, &Mailbox)> {
        if self.endpoints.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..self.endpoints.len());
        self.endpoints
            .iter()
            .nth(idx)
            .map(|(name, mailbox)| (name.as_str(), mailbox))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
