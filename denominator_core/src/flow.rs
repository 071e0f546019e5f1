//! Causal flow tracing: latency accounting across request/response pairs.
//!
//! A flow starts when an actor annotates an outbound traced request and
//! ends when a response carrying the same trace id comes back. The two
//! events are handled independently by the control loop; only the trace
//! id joins them.

use crate::metrics::LatencyHistogram;
use denominator_env::{Message, TraceContext};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use tracing::trace;

/// Latencies measured when a flow completes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowTimes {
    /// Transit time of the response itself
    pub response: Duration,
    /// Flow start until the responder sent its reply
    pub service: Duration,
    /// Flow start until the response arrived here
    pub round_trip: Duration,
}

/// Open flows started by one actor, keyed by trace id.
#[derive(Debug, Default)]
pub struct FlowTracer {
    open: HashMap<u64, SystemTime>,
    completed: u64,
    unmatched: u64,
}

impl FlowTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the network transit time of an inbound message.
    ///
    /// Called exactly once per inbound message, before it is dispatched.
    pub fn record_inbound(
        &self,
        msg: &Message,
        now: SystemTime,
        node: &str,
        net: &mut LatencyHistogram,
    ) -> Duration {
        let transit = msg.transit(now);
        net.record(transit);
        trace!(node, kind = %msg.kind, ?transit, "inbound");
        transit
    }

    /// Marks the creation time of an outbound traced message.
    ///
    /// Messages with a nil trace context are not flows and are ignored.
    pub fn annotate_outbound(&mut self, msg: &Message, node: &str) {
        if msg.ctx.is_nil() {
            return;
        }
        self.open.insert(msg.ctx.trace, msg.sent_at);
        trace!(node, ctx = %msg.ctx, kind = %msg.kind, "flow started");
    }

    /// Drops an open flow that can never complete.
    ///
    /// Returns whether a flow was open for `ctx`.
    pub fn abandon(&mut self, ctx: &TraceContext) -> bool {
        let abandoned = self.open.remove(&ctx.trace).is_some();
        if abandoned {
            trace!(%ctx, "flow abandoned");
        }
        abandoned
    }

    /// Closes the flow a response belongs to and records its latencies.
    ///
    /// The response time is recorded for every traced response. Service
    /// and round-trip times need the flow's start and are recorded only
    /// for a flow this tracer opened; the flow is closed afterwards, so a
    /// duplicate response cannot count twice.
    pub fn record_completion(
        &mut self,
        msg: &Message,
        now: SystemTime,
        resp: &mut LatencyHistogram,
        serv: &mut LatencyHistogram,
        rt: &mut LatencyHistogram,
    ) -> Option<FlowTimes> {
        if msg.ctx.is_nil() {
            return None;
        }

        let response = msg.transit(now);
        resp.record(response);

        let Some(started) = self.open.remove(&msg.ctx.trace) else {
            self.unmatched += 1;
            trace!(ctx = %msg.ctx, "response for unknown flow");
            return None;
        };

        let service = msg.sent_at.duration_since(started).unwrap_or_default();
        let round_trip = now.duration_since(started).unwrap_or_default();
        serv.record(service);
        rt.record(round_trip);
        self.completed += 1;

        Some(FlowTimes {
            response,
            service,
            round_trip,
        })
    }

    /// Number of flows still waiting for a response.
    pub fn open_flows(&self) -> usize {
        self.open.len()
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Traced responses that matched no open flow.
    pub fn unmatched(&self) -> u64 {
        self.unmatched
    }
}
