//! Simulation context implementing ActorContext for deterministic runs.

use async_trait::async_trait;
use denominator_env::ActorContext;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Simulation context backed by deterministic time and RNG.
///
/// This implements `ActorContext` using:
/// - Tokio's clock, expected to be paused, so time only moves when every
///   task is blocked on a timer
/// - Seeded ChaCha8 streams, one per actor
/// - A fixed epoch so timestamps are identical across runs
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Virtual time zero
    start: Instant,

    /// Epoch offset (virtual time 0 maps to this wall-clock time)
    epoch: SystemTime,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    ///
    /// Must be created inside the runtime whose clock it reads.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            start: Instant::now(),
            epoch: UNIX_EPOCH + Duration::from_secs(1704067200), // 2024-01-01 00:00:00 UTC
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Wall-clock time that virtual time zero maps to.
    pub fn epoch(&self) -> SystemTime {
        self.epoch
    }
}

#[async_trait]
impl ActorContext for SimContext {
    type Rng = ChaCha8Rng;

    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        self.epoch + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        // With a paused clock this auto-advances once every task is idle
        tokio::time::sleep(duration).await;
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let name = name.to_string();
        tokio::spawn(async move {
            future.await;
            tracing::trace!(task = %name, "sim task finished");
        });
    }

    fn derive_rng(&self, seed_extension: u64) -> ChaCha8Rng {
        // Combine master seed with extension for a per-actor stream
        let combined_seed = self.seed.wrapping_mul(0x517cc1b727220a95) ^ seed_extension;
        ChaCha8Rng::seed_from_u64(combined_seed)
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
