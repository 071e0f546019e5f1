//! Synthetic request traffic ("chat").

use crate::duration::parse_duration;
use denominator_env::MessageKind;
use rand::Rng;
use std::time::Duration;

/// Fastest accepted chat rate.
pub const MIN_CHAT_RATE: Duration = Duration::from_millis(1);
/// Slowest accepted chat rate.
pub const MAX_CHAT_RATE: Duration = Duration::from_secs(3600);

/// Payload of the fixed-key read.
pub const FIXED_KEY: &str = "why?";

/// Parses a chat payload, accepting only rates in `[1ms, 1h]`.
pub fn parse_chat_rate(payload: &str) -> Option<Duration> {
    parse_duration(payload)
        .ok()
        .filter(|rate| (MIN_CHAT_RATE..=MAX_CHAT_RATE).contains(rate))
}

/// Key written by the write with counter `n`, and re-read by reads drawing `q = n`.
pub fn synthetic_key(n: u64) -> String {
    format!("Why{}{}", n, n.wrapping_mul(n))
}

/// One of the three request shapes a chat tick can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficShape {
    /// Read of the fixed key
    Fixed,
    /// Read of a key a previous write plausibly created
    Reread { q: u64 },
    /// Write of a fresh key
    Write { w: u64 },
}

impl TrafficShape {
    pub fn kind(&self) -> MessageKind {
        match self {
            TrafficShape::Fixed | TrafficShape::Reread { .. } => MessageKind::GetRequest,
            TrafficShape::Write { .. } => MessageKind::Put,
        }
    }

    /// Key the request touches.
    pub fn key(&self) -> String {
        match self {
            TrafficShape::Fixed => FIXED_KEY.to_string(),
            TrafficShape::Reread { q } => synthetic_key(*q),
            TrafficShape::Write { w } => synthetic_key(*w),
        }
    }

    /// Message payload; writes carry the key followed by a value.
    pub fn payload(&self) -> String {
        match self {
            TrafficShape::Write { w } => format!("{} me", synthetic_key(*w)),
            _ => self.key(),
        }
    }
}

/// Chooses request shapes and owns the write counter `w`.
#[derive(Debug)]
pub struct TrafficGenerator {
    w: u64,
}

impl Default for TrafficGenerator {
    fn default() -> Self {
        Self { w: 1 }
    }
}

impl TrafficGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current write counter; starts at 1, grows by one per write.
    pub fn counter(&self) -> u64 {
        self.w
    }

    /// Picks one of the three shapes uniformly.
    pub fn next_shape<R: Rng + ?Sized>(&mut self, rng: &mut R) -> TrafficShape {
        match rng.gen_range(0..3) {
            0 => TrafficShape::Fixed,
            1 => TrafficShape::Reread {
                q: rng.gen_range(0..self.w),
            },
            _ => {
                let w = self.w;
                self.w += 1;
                TrafficShape::Write { w }
            }
        }
    }
}
