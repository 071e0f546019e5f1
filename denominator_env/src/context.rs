//! Core environment context trait for simulated actors.

use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// The central interface for environment interaction.
///
/// This trait abstracts the "real world" so that actors can run
/// against either the wall clock or a deterministic simulation clock.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, entropy-seeded `StdRng`
/// - **Simulation**: `SimContext` - paused tokio clock, `ChaCha8Rng(seed)`
///
/// # Determinism
///
/// For simulation, all methods that would normally introduce
/// non-determinism (time, randomness) are controlled by the implementation.
#[async_trait]
pub trait ActorContext: Send + Sync + 'static {
    /// Random number generator handed to actors.
    type Rng: Rng + Send + 'static;

    /// Returns the current monotonic time since context creation.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time used to stamp outbound messages.
    ///
    /// In simulation, this is derived from virtual clock + epoch offset.
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Derives a random number generator from a seed extension.
    ///
    /// The implementation combines the global seed with `seed_extension`
    /// so every actor gets its own, reproducible stream.
    fn derive_rng(&self, seed_extension: u64) -> Self::Rng;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
