//! Denominator Environment Abstraction Layer
//!
//! This crate provides everything an actor needs from the outside world,
//! so the same actor code runs against the real clock (tokio) or a
//! paused, seeded simulation clock:
//! - Time (`now()`, `system_time()`, `sleep()`)
//! - Task spawning (`spawn()`)
//! - Randomness (`derive_rng()`)
//! - Messaging (`Mailbox` / `Inbox`, `Message`, `TraceContext`)
//!
//! # Example
//!
//! ```ignore
//! use denominator_env::{mailbox, Message, MessageKind, MailboxId, TraceContext};
//!
//! let (tx, mut inbox) = mailbox(MailboxId::new());
//! tx.send(Message::new(MessageKind::Hello, None, ctx.system_time(), TraceContext::NIL, "dns"))?;
//! let msg = inbox.recv().await;
//! ```

mod context;
mod error;
mod mailbox;
mod tokio_impl;
mod types;

pub use context::ActorContext;
pub use error::EnvError;
pub use mailbox::{mailbox, Inbox, Mailbox};
pub use tokio_impl::TokioContext;
pub use types::{MailboxId, Message, MessageKind, TraceContext};
