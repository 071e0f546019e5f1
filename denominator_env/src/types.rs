//! Common types: mailbox identity, trace context and the message envelope.

use crate::mailbox::Mailbox;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Unique identifier for a mailbox.
///
/// Uses UUID v4 for global uniqueness without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MailboxId(pub Uuid);

impl MailboxId {
    /// Creates a new random MailboxId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic MailboxId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    /// Low 64 bits, used to derive per-actor RNG streams.
    ///
    /// Round-trips the seed of `from_seed`.
    pub fn seed_extension(&self) -> u64 {
        let mut low = [0u8; 8];
        low.copy_from_slice(&self.0.as_bytes()[0..8]);
        u64::from_le_bytes(low)
    }
}

impl Default for MailboxId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MailboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// The closed set of message kinds understood by simulated actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Identity assignment: payload is the actor's name, reply is the parent
    Hello,
    /// Registry announcement: payload is the zone, reply is the registry
    Inform,
    /// Dependency announcement: payload is a service or instance name
    NameDrop,
    /// Drop a dependency: payload is the name to forget
    Forget,
    /// Set the synthetic traffic rate: payload is a duration literal
    Chat,
    /// Read request (also used for registry lookups)
    GetRequest,
    /// Write request
    Put,
    /// Response that ends a traced flow
    GetResponse,
    /// Shutdown request, and the completion notice sent back to the parent
    Goodbye,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageKind::Hello => "Hello",
            MessageKind::Inform => "Inform",
            MessageKind::NameDrop => "NameDrop",
            MessageKind::Forget => "Forget",
            MessageKind::Chat => "Chat",
            MessageKind::GetRequest => "GetRequest",
            MessageKind::Put => "Put",
            MessageKind::GetResponse => "GetResponse",
            MessageKind::Goodbye => "Goodbye",
        };
        f.write_str(s)
    }
}

static NEXT_TRACE: AtomicU64 = AtomicU64::new(1);

/// Correlates a request with its eventual response across hops.
///
/// `trace` identifies the whole causal flow, `span` the current hop and
/// `parent` the hop that caused it. A zero trace is the nil context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TraceContext {
    pub trace: u64,
    pub parent: u32,
    pub span: u32,
}

impl TraceContext {
    /// Context for messages that are not part of any flow.
    pub const NIL: TraceContext = TraceContext {
        trace: 0,
        parent: 0,
        span: 0,
    };

    /// Starts a new flow with a process-unique trace id.
    pub fn new_trace() -> Self {
        Self {
            trace: NEXT_TRACE.fetch_add(1, Ordering::Relaxed),
            parent: 0,
            span: 1,
        }
    }

    /// Context for the next hop of this flow.
    pub fn child(&self) -> Self {
        Self {
            trace: self.trace,
            parent: self.span,
            span: self.span.wrapping_add(1),
        }
    }

    pub fn is_nil(&self) -> bool {
        self.trace == 0
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}p{}s{}", self.trace, self.parent, self.span)
    }
}

/// Envelope exchanged between actors.
///
/// Messages are immutable values once sent; the receiver owns them.
#[derive(Debug, Clone)]
pub struct Message {
    /// What the sender wants
    pub kind: MessageKind,

    /// Where a response (or the sender itself) can be reached
    pub reply_to: Option<Mailbox>,

    /// Sender's clock when the message was created
    pub sent_at: SystemTime,

    /// Flow correlation, `TraceContext::NIL` when context-free
    pub ctx: TraceContext,

    /// Kind-specific data (name, zone, duration literal, key...)
    pub payload: String,
}

impl Message {
    /// Creates a new message.
    pub fn new(
        kind: MessageKind,
        reply_to: Option<Mailbox>,
        sent_at: SystemTime,
        ctx: TraceContext,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            reply_to,
            sent_at,
            ctx,
            payload: payload.into(),
        }
    }

    /// Time spent between `sent_at` and `now`.
    ///
    /// Clamped to zero when the sender's clock is ahead.
    pub fn transit(&self, now: SystemTime) -> Duration {
        now.duration_since(self.sent_at).unwrap_or_default()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {:?}", self.kind, self.ctx, self.payload)
    }
}
