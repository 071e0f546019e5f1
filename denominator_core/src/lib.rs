//! Denominator Core - global traffic distribution for micro-service simulations
//!
//! The denominator plays the role of a geo-aware DNS: it learns which
//! zone registries exist, asks them where its dependencies live, and
//! spreads synthetic request traffic over the endpoints it is told about.
//! Every message it handles is timed, and every request it starts is
//! traced until its response comes back.

pub mod bookkeeping;
pub mod collect;
pub mod config;
pub mod denominator;
pub mod duration;
pub mod error;
pub mod flow;
pub mod metrics;
pub mod router;
pub mod traffic;

// Re-export key types for convenience
pub use collect::{collector_for, Collector, JsonCollector, KeyGuesses, MemoryCollector};
pub use config::DenominatorConfig;
pub use denominator::{ActorStats, Control, Denominator, Lifecycle};
pub use error::CoreError;
pub use metrics::{HistogramSummary, LatencyHistogram, LatencyHistograms};
pub use traffic::TrafficShape;
