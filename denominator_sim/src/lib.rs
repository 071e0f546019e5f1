//! Denominator Deterministic Simulation Harness
//!
//! Runs one denominator against stub registries and services on a paused
//! Tokio clock, so a whole run is reproducible from a single seed.
//!
//! # Core Principle
//!
//! All sources of non-determinism are controlled:
//! - **Time**: the clock only advances when every task is waiting on a timer
//! - **Randomness**: every actor's RNG is derived from the master seed and
//!   its mailbox id
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │                                                             │
//! │   parent ──Hello/Inform/NameDrop/Chat/Goodbye──┐            │
//! │     ▲                                          ▼            │
//! │     └──────────── completion notice ───── Denominator       │
//! │                                           │        ▲        │
//! │                              lookups      │        │ traffic│
//! │                     ┌─────────────────────┤        │        │
//! │                     ▼                     ▼        │        │
//! │               ┌──────────┐          ┌──────────┐   │        │
//! │               │ Registry │ NameDrop │ Service  │───┘        │
//! │               │ per zone │─────────►│  stubs   │ responses  │
//! │               └──────────┘          └──────────┘            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use denominator_sim::{SimConfig, SimWorld};
//!
//! let report = SimWorld::new(SimConfig { seed: 42, ..Default::default() })
//!     .run()
//!     .await?;
//! println!("{}", report.to_json()?);
//! ```

mod context;
mod error;
mod report;
mod stubs;
mod world;

pub use context::SimContext;
pub use error::SimError;
pub use report::{RegistryReport, RunReport, ServiceReport};
pub use stubs::{spawn_registry, spawn_service, StubHandle};
pub use world::{SimConfig, SimWorld, NODE_NAME};
