//! Denominator - the global traffic distribution actor.
//!
//! Simulates a geo-aware DNS service that spreads incoming traffic over
//! downstream endpoints in several zones and regions. Everything it knows
//! arrives by message; everything it does leaves by message.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Denominator                          │
//! │                                                             │
//! │   Inbox ──────┐                                             │
//! │   Discovery ──┼──► select! ──► one event per iteration      │
//! │   Chat timer ─┘                                             │
//! │                                                             │
//! │  ┌────────────┐ ┌──────────────┐ ┌────────────┐ ┌────────┐  │
//! │  │ Dependency │ │   Registry   │ │  Endpoint  │ │  Flow  │  │
//! │  │  Tracker   │ │    Cache     │ │   Router   │ │ Tracer │  │
//! │  └────────────┘ └──────────────┘ └────────────┘ └────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! All state is owned by the single task running [`Denominator::run`];
//! nothing is shared, so nothing is locked. `select!` polls its branches
//! in random order, so no source can starve the others; the order in
//! which events from *different* sources are handled is unspecified.
//! Inbox messages are handled in FIFO order.
//!
//! # Usage
//!
//! ```ignore
//! use denominator_core::{collect::MemoryCollector, Denominator, DenominatorConfig};
//! use denominator_env::{MailboxId, TokioContext};
//!
//! let dns = Denominator::start(
//!     TokioContext::shared(),
//!     Arc::new(DenominatorConfig::default()),
//!     Box::new(MemoryCollector::new()),
//!     MailboxId::new(),
//! );
//! dns.send(hello)?;
//! ```

use crate::bookkeeping::{DependencyTracker, RegistryCache};
use crate::collect::{Collector, KeyGuesses};
use crate::config::DenominatorConfig;
use crate::duration::format_duration;
use crate::flow::FlowTracer;
use crate::metrics::LatencyHistograms;
use crate::router::EndpointRouter;
use crate::traffic::{parse_chat_rate, TrafficGenerator, TrafficShape};

use denominator_env::{
    mailbox, ActorContext, Inbox, Mailbox, MailboxId, Message, MessageKind, TraceContext,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Discovery period used when the configured one is zero.
const MIN_EUREKA_POLL: Duration = Duration::from_millis(1);

/// Where an actor is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Lifecycle {
    /// Waiting for its first Hello
    Unnamed,
    /// Operating normally
    Named,
    /// Goodbye handled; final, nothing more is sent
    Terminated,
}

/// What the control loop does after handling a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Shutdown,
}

/// Counters reported when the actor stops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActorStats {
    /// Inbound messages handled
    pub received: u64,
    /// Registry lookups emitted (immediate and periodic)
    pub lookups_sent: u64,
    /// Synthetic requests emitted
    pub requests_sent: u64,
    /// Chat ticks skipped for lack of an endpoint
    pub idle_ticks: u64,
    /// Sends whose receiver had already gone away
    pub undeliverable: u64,
}

/// The denominator actor.
///
/// Generic over the context, so the same actor runs on the wall clock or
/// on a paused, seeded simulation clock.
pub struct Denominator<Ctx: ActorContext> {
    /// Environment context
    context: Arc<Ctx>,

    /// Process-wide configuration
    config: Arc<DenominatorConfig>,

    /// Our own mailbox, handed out as the reply address
    mailbox: Mailbox,

    /// Empty until the first Hello
    name: String,

    /// Who named us; receives the completion notice
    parent: Option<Mailbox>,

    lifecycle: Lifecycle,

    router: EndpointRouter,
    dependencies: DependencyTracker,
    registries: RegistryCache,

    histograms: LatencyHistograms,
    flow: FlowTracer,
    guesses: KeyGuesses,

    traffic: TrafficGenerator,

    /// `None` = chat timer disarmed
    chat_rate: Option<Duration>,

    /// Bumped on every accepted Chat so the loop re-arms its timer
    chat_epoch: u64,

    rng: Ctx::Rng,
    collector: Box<dyn Collector>,
    stats: ActorStats,
}

impl<Ctx: ActorContext> Denominator<Ctx> {
    /// Creates an actor that will answer on `mailbox`.
    pub fn new(
        context: Arc<Ctx>,
        config: Arc<DenominatorConfig>,
        mailbox: Mailbox,
        collector: Box<dyn Collector>,
    ) -> Self {
        let rng = context.derive_rng(mailbox.id().seed_extension());
        let registries = RegistryCache::with_capacity(config.registry_capacity());

        Self {
            context,
            config,
            mailbox,
            name: String::new(),
            parent: None,
            lifecycle: Lifecycle::Unnamed,
            router: EndpointRouter::new(),
            dependencies: DependencyTracker::new(),
            registries,
            histograms: LatencyHistograms::for_node(""),
            flow: FlowTracer::new(),
            guesses: KeyGuesses::default(),
            traffic: TrafficGenerator::new(),
            chat_rate: None,
            chat_epoch: 0,
            rng,
            collector,
            stats: ActorStats::default(),
        }
    }

    /// Spawns an actor on the context and returns its mailbox.
    ///
    /// All configuration and state is delivered afterwards by message.
    pub fn start(
        context: Arc<Ctx>,
        config: Arc<DenominatorConfig>,
        collector: Box<dyn Collector>,
        id: MailboxId,
    ) -> Mailbox {
        let (mailbox, inbox) = mailbox(id);
        let actor = Self::new(Arc::clone(&context), config, mailbox.clone(), collector);
        context.spawn("denominator", actor.run(inbox));
        mailbox
    }

    /// Runs the control loop until Goodbye.
    pub async fn run(mut self, mut inbox: Inbox) {
        let mut poll = self.config.eureka_poll;
        if poll.is_zero() {
            warn!(node = %self.name, "zero eureka_poll, using {:?}", MIN_EUREKA_POLL);
            poll = MIN_EUREKA_POLL;
        }
        let mut discovery = interval_at(Instant::now() + poll, poll);
        discovery.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut chat: Option<Interval> = None;
        let mut armed_epoch = self.chat_epoch;

        loop {
            if armed_epoch != self.chat_epoch {
                chat = self.chat_rate.map(chat_timer);
                armed_epoch = self.chat_epoch;
            }

            tokio::select! {
                msg = inbox.recv() => match msg {
                    Some(msg) => {
                        if self.handle_message(msg) == Control::Shutdown {
                            break;
                        }
                    }
                    None => {
                        // Unreachable while we hold our own mailbox
                        warn!(node = %self.name, "inbox closed, stopping");
                        return;
                    }
                },
                _ = discovery.tick() => {
                    self.discovery_tick();
                }
                _ = next_tick(&mut chat) => {
                    self.chat_tick();
                }
            }
        }

        // Disarm both timers before the final cleanup
        drop(chat);
        drop(discovery);
        self.shutdown();
    }

    /// Handles one inbound message.
    ///
    /// Every message is instrumented into the network histogram exactly
    /// once before kind-specific handling.
    pub fn handle_message(&mut self, msg: Message) -> Control {
        if self.lifecycle == Lifecycle::Terminated {
            return Control::Shutdown;
        }

        let now = self.context.system_time();
        self.flow
            .record_inbound(&msg, now, &self.name, &mut self.histograms.net);
        self.stats.received += 1;
        if self.config.msglog {
            debug!(node = %self.name, %msg, "received");
        }

        match msg.kind {
            MessageKind::Hello => self.on_hello(msg),
            MessageKind::Inform => self.on_inform(msg),
            MessageKind::NameDrop => self.on_name_drop(msg),
            MessageKind::Forget => self.on_forget(&msg.payload),
            MessageKind::Chat => self.on_chat(&msg.payload),
            MessageKind::GetResponse => self.on_response(&msg, now),
            MessageKind::Goodbye => return Control::Shutdown,
            MessageKind::GetRequest | MessageKind::Put => {
                trace!(node = %self.name, kind = %msg.kind, "not served here, dropping");
            }
        }
        Control::Continue
    }

    fn on_hello(&mut self, msg: Message) {
        if !self.name.is_empty() {
            debug!(node = %self.name, requested = %msg.payload, "already named, ignoring Hello");
            return;
        }
        if msg.payload.is_empty() {
            warn!("Hello without a name, ignoring");
            return;
        }

        self.name = msg.payload;
        self.parent = msg.reply_to;
        self.histograms = LatencyHistograms::for_node(&self.name);
        self.lifecycle = Lifecycle::Named;
        info!(node = %self.name, "named");
    }

    fn on_inform(&mut self, msg: Message) {
        let Some(registry) = msg.reply_to else {
            warn!(node = %self.name, zone = %msg.payload, "Inform without a registry mailbox, ignoring");
            return;
        };
        self.registries.inform(msg.payload.clone(), registry);
        debug!(node = %self.name, zone = %msg.payload, registries = self.registries.len(), "registry informed");
    }

    fn on_name_drop(&mut self, msg: Message) {
        if msg.payload.is_empty() {
            warn!(node = %self.name, "NameDrop without a name, ignoring");
            return;
        }
        self.dependencies.refresh(msg.payload.clone(), msg.sent_at);

        match msg.reply_to {
            Some(endpoint) => {
                self.router.insert(msg.payload.clone(), endpoint);
                debug!(node = %self.name, endpoint = %msg.payload, endpoints = self.router.len(), "endpoint added");
            }
            None => {
                // A bare service name: look it up right away instead of
                // waiting for the next discovery tick
                let sent = self.query_registries(&msg.payload);
                debug!(node = %self.name, dependency = %msg.payload, lookups = sent, "dependency added");
            }
        }
    }

    fn on_forget(&mut self, name: &str) {
        let tracked = self.dependencies.forget(name);
        let routed = self.router.remove(name).is_some();
        debug!(node = %self.name, name, tracked, routed, "forgot");
    }

    fn on_chat(&mut self, payload: &str) {
        match parse_chat_rate(payload) {
            Some(rate) => {
                self.chat_rate = Some(rate);
                self.chat_epoch += 1;
                debug!(node = %self.name, rate = %format_duration(rate), "chat rate set");
            }
            None => debug!(node = %self.name, payload, "ignoring invalid chat rate"),
        }
    }

    fn on_response(&mut self, msg: &Message, now: SystemTime) {
        let times = self.flow.record_completion(
            msg,
            now,
            &mut self.histograms.resp,
            &mut self.histograms.serv,
            &mut self.histograms.rt,
        );
        if let Some(times) = times {
            trace!(node = %self.name, ctx = %msg.ctx, ?times, "flow completed");
        }
    }

    /// Sends one lookup for `dependency` to every known registry.
    fn query_registries(&mut self, dependency: &str) -> usize {
        let now = self.context.system_time();
        let mut sent = 0;
        for registry in self.registries.mailboxes() {
            let query = Message::new(
                MessageKind::GetRequest,
                Some(self.mailbox.clone()),
                now,
                TraceContext::NIL,
                dependency,
            );
            if !deliver(registry, query, &self.name) {
                self.stats.undeliverable += 1;
            }
            sent += 1;
        }
        self.stats.lookups_sent += sent as u64;
        sent
    }

    /// Re-announces every dependency to every registry.
    ///
    /// Registries that don't know a dependency ignore the query, so this
    /// sends `#dependencies × #registries` messages per tick.
    pub fn discovery_tick(&mut self) -> usize {
        if self.lifecycle == Lifecycle::Terminated {
            return 0;
        }
        let dependencies: Vec<String> = self.dependencies.names().map(str::to_string).collect();
        let sent: usize = dependencies
            .iter()
            .map(|dependency| self.query_registries(dependency))
            .sum();
        trace!(node = %self.name, sent, "discovery tick");
        sent
    }

    /// Sends one synthetic request to a random endpoint.
    ///
    /// Returns the shape sent, or `None` when no endpoint is known.
    pub fn chat_tick(&mut self) -> Option<TrafficShape> {
        if self.lifecycle == Lifecycle::Terminated {
            return None;
        }
        let target = match self.router.random(&mut self.rng) {
            Some((_, endpoint)) => endpoint.clone(),
            None => {
                self.stats.idle_ticks += 1;
                return None;
            }
        };

        let ctx = TraceContext::new_trace();
        let shape = self.traffic.next_shape(&mut self.rng);
        self.guesses.record(shape.key());

        let request = Message::new(
            shape.kind(),
            Some(self.mailbox.clone()),
            self.context.system_time(),
            ctx,
            shape.payload(),
        );
        self.flow.annotate_outbound(&request, &self.name);
        if !deliver(&target, request, &self.name) {
            // No response can close this flow
            self.flow.abandon(&ctx);
            self.stats.undeliverable += 1;
        }
        self.stats.requests_sent += 1;
        Some(shape)
    }

    /// Persists all artifacts and notifies the parent, once.
    ///
    /// After this the actor sends nothing: ticks and messages are no-ops.
    pub fn shutdown(&mut self) {
        if self.lifecycle == Lifecycle::Terminated {
            return;
        }
        self.lifecycle = Lifecycle::Terminated;
        let rate = self.chat_rate.take();

        if self.config.msglog {
            let rate = rate.map(format_duration).unwrap_or_else(|| "never".to_string());
            info!(node = %self.name, "going away, was chatting every {}", rate);
        }

        for (suffix, hist) in self.histograms.iter() {
            if let Err(e) = self.collector.save_histogram(&self.name, suffix, hist) {
                warn!(node = %self.name, suffix, error = %e, "failed to save histogram");
            }
        }
        if let Err(e) = self.collector.save_guesses(&self.name, &self.guesses) {
            warn!(node = %self.name, error = %e, "failed to save key guesses");
        }
        info!(node = %self.name, stats = ?self.stats, "stopped");

        match self.parent.take() {
            Some(parent) => {
                let notice = Message::new(
                    MessageKind::Goodbye,
                    None,
                    self.context.system_time(),
                    TraceContext::NIL,
                    self.name.clone(),
                );
                if !deliver(&parent, notice, &self.name) {
                    self.stats.undeliverable += 1;
                }
            }
            None => warn!(node = %self.name, "no parent to notify"),
        }
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn chat_rate(&self) -> Option<Duration> {
        self.chat_rate
    }

    pub fn dependencies(&self) -> &DependencyTracker {
        &self.dependencies
    }

    pub fn registries(&self) -> &RegistryCache {
        &self.registries
    }

    pub fn router(&self) -> &EndpointRouter {
        &self.router
    }

    pub fn histograms(&self) -> &LatencyHistograms {
        &self.histograms
    }

    pub fn flow(&self) -> &FlowTracer {
        &self.flow
    }

    pub fn guesses(&self) -> &KeyGuesses {
        &self.guesses
    }

    /// Current write counter `w`.
    pub fn traffic_counter(&self) -> u64 {
        self.traffic.counter()
    }

    pub fn stats(&self) -> &ActorStats {
        &self.stats
    }
}

fn deliver(to: &Mailbox, msg: Message, node: &str) -> bool {
    match to.send(msg) {
        Ok(()) => true,
        Err(e) => {
            debug!(node, error = %e, "message undeliverable");
            false
        }
    }
}

fn chat_timer(rate: Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + rate, rate);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    timer
}

/// Completes on the next tick, or never when the timer is disarmed.
async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::MemoryCollector;
    use crate::metrics::{NET, RESP, RT, SERV};
    use crate::traffic::synthetic_key;
    use denominator_env::TokioContext;

    fn actor(config: DenominatorConfig) -> (Denominator<TokioContext>, Inbox, MemoryCollector) {
        let (me, inbox) = mailbox(MailboxId::from_seed(100));
        let collector = MemoryCollector::new();
        let actor = Denominator::new(
            TokioContext::shared(),
            Arc::new(config),
            me,
            Box::new(collector.clone()),
        );
        (actor, inbox, collector)
    }

    fn msg(kind: MessageKind, reply_to: Option<&Mailbox>, payload: &str) -> Message {
        Message::new(
            kind,
            reply_to.cloned(),
            SystemTime::now(),
            TraceContext::NIL,
            payload,
        )
    }

    fn drain(inbox: &mut Inbox) -> Vec<Message> {
        let mut out = Vec::new();
        while let Some(m) = inbox.try_recv() {
            out.push(m);
        }
        out
    }

    #[test]
    fn test_hello_sets_identity_once() {
        let (mut dns, _inbox, _) = actor(DenominatorConfig::default());
        let (parent, _parent_rx) = mailbox(MailboxId::from_seed(1));
        let (other, _other_rx) = mailbox(MailboxId::from_seed(2));
        assert_eq!(dns.lifecycle(), Lifecycle::Unnamed);

        dns.handle_message(msg(MessageKind::Hello, Some(&parent), "dns"));
        dns.handle_message(msg(MessageKind::Hello, Some(&other), "impostor"));

        assert_eq!(dns.name(), "dns");
        assert_eq!(dns.lifecycle(), Lifecycle::Named);
        assert_eq!(dns.histograms().rt.label(), "dns_rt");
    }

    #[test]
    fn test_every_inbound_message_is_instrumented() {
        let (mut dns, _inbox, _) = actor(DenominatorConfig::default());
        let (parent, _parent_rx) = mailbox(MailboxId::from_seed(1));

        dns.handle_message(msg(MessageKind::Hello, Some(&parent), "dns"));
        dns.handle_message(msg(MessageKind::Chat, None, "abc"));
        dns.handle_message(msg(MessageKind::Forget, None, "nobody"));
        dns.handle_message(msg(MessageKind::GetRequest, None, "why?"));

        // Hello starts fresh histograms, its own sample included
        assert_eq!(dns.histograms().net.count(), 3);
        assert_eq!(dns.histograms().net.label(), "dns_net");
        assert_eq!(dns.stats().received, 4);
    }

    #[test]
    fn test_hello_discards_earlier_samples() {
        let (mut dns, _inbox, _) = actor(DenominatorConfig::default());
        let (parent, _parent_rx) = mailbox(MailboxId::from_seed(1));

        dns.handle_message(msg(MessageKind::Forget, None, "svcA"));
        dns.handle_message(msg(MessageKind::Forget, None, "svcB"));
        assert_eq!(dns.histograms().net.count(), 2);

        dns.handle_message(msg(MessageKind::Hello, Some(&parent), "dns"));
        let h = dns.histograms();
        assert_eq!(h.net.count(), 0);
        assert_eq!(h.net.label(), "dns_net");
        assert_eq!(dns.stats().received, 3);
    }

    #[test]
    fn test_inform_requires_registry_mailbox() {
        let (mut dns, _inbox, _) = actor(DenominatorConfig::default());
        let (registry, _registry_rx) = mailbox(MailboxId::from_seed(1));

        dns.handle_message(msg(MessageKind::Inform, None, "zoneA"));
        assert!(dns.registries().is_empty());

        dns.handle_message(msg(MessageKind::Inform, Some(&registry), "zoneA"));
        dns.handle_message(msg(MessageKind::Inform, Some(&registry), "zoneA"));
        assert_eq!(dns.registries().len(), 1);
        assert_eq!(dns.registries().get("zoneA"), Some(&registry));
    }

    #[test]
    fn test_name_drop_and_forget() {
        let (mut dns, _inbox, _) = actor(DenominatorConfig::default());
        let (endpoint, _endpoint_rx) = mailbox(MailboxId::from_seed(1));

        dns.handle_message(msg(MessageKind::NameDrop, Some(&endpoint), "svcA0"));
        dns.handle_message(msg(MessageKind::NameDrop, None, "svcB"));

        assert!(dns.dependencies().contains("svcA0"));
        assert!(dns.dependencies().contains("svcB"));
        assert_eq!(dns.router().len(), 1);

        dns.handle_message(msg(MessageKind::Forget, None, "svcA0"));
        assert!(!dns.dependencies().contains("svcA0"));
        assert!(dns.router().is_empty());
        assert_eq!(dns.dependencies().len(), 1);
    }

    #[test]
    fn test_service_name_drop_queries_known_registries() {
        let (mut dns, _inbox, _) = actor(DenominatorConfig::default());
        let (registry, mut registry_rx) = mailbox(MailboxId::from_seed(1));

        dns.handle_message(msg(MessageKind::Inform, Some(&registry), "zoneA"));
        dns.handle_message(msg(MessageKind::NameDrop, None, "svcA"));

        let lookups = drain(&mut registry_rx);
        assert_eq!(lookups.len(), 1);
        assert_eq!(lookups[0].kind, MessageKind::GetRequest);
        assert_eq!(lookups[0].payload, "svcA");
        assert!(lookups[0].ctx.is_nil());
    }

    #[test]
    fn test_chat_rate_validation() {
        let (mut dns, _inbox, _) = actor(DenominatorConfig::default());
        assert_eq!(dns.chat_rate(), None);

        dns.handle_message(msg(MessageKind::Chat, None, "2h"));
        assert_eq!(dns.chat_rate(), None);

        dns.handle_message(msg(MessageKind::Chat, None, "10ms"));
        assert_eq!(dns.chat_rate(), Some(Duration::from_millis(10)));

        dns.handle_message(msg(MessageKind::Chat, None, "2h"));
        dns.handle_message(msg(MessageKind::Chat, None, "abc"));
        assert_eq!(dns.chat_rate(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_discovery_fans_out_to_every_registry() {
        let (mut dns, mut me, _) = actor(DenominatorConfig::default());
        let (reg_a, mut reg_a_rx) = mailbox(MailboxId::from_seed(1));
        let (reg_b, mut reg_b_rx) = mailbox(MailboxId::from_seed(2));

        dns.handle_message(msg(MessageKind::NameDrop, None, "svcA"));
        dns.handle_message(msg(MessageKind::NameDrop, None, "svcB"));
        dns.handle_message(msg(MessageKind::Inform, Some(&reg_a), "zoneA"));
        dns.handle_message(msg(MessageKind::Inform, Some(&reg_b), "zoneB"));

        assert_eq!(dns.discovery_tick(), 4);

        for rx in [&mut reg_a_rx, &mut reg_b_rx] {
            let mut payloads: Vec<String> = drain(rx).into_iter().map(|m| m.payload).collect();
            payloads.sort();
            assert_eq!(payloads, vec!["svcA".to_string(), "svcB".to_string()]);
        }
        assert!(drain(&mut me).is_empty());
        assert_eq!(dns.stats().lookups_sent, 4);
    }

    #[test]
    fn test_chat_tick_without_endpoint_is_skipped() {
        let (mut dns, _inbox, _) = actor(DenominatorConfig::default());

        assert!(dns.chat_tick().is_none());
        assert_eq!(dns.stats().idle_ticks, 1);
        assert_eq!(dns.traffic_counter(), 1);
    }

    #[test]
    fn test_chat_ticks_generate_traced_requests() {
        let (mut dns, _inbox, _) = actor(DenominatorConfig::default());
        let (endpoint, mut endpoint_rx) = mailbox(MailboxId::from_seed(1));
        dns.handle_message(msg(MessageKind::NameDrop, Some(&endpoint), "svc0"));

        let mut writes = 0;
        for _ in 0..60 {
            let before = dns.traffic_counter();
            let shape = dns.chat_tick().unwrap();
            let request = endpoint_rx.try_recv().unwrap();

            assert!(!request.ctx.is_nil());
            assert_eq!(request.reply_to.as_ref(), Some(dns.mailbox()));
            assert_eq!(request.kind, shape.kind());
            match shape {
                TrafficShape::Fixed => assert_eq!(request.payload, "why?"),
                TrafficShape::Reread { q } => {
                    assert!(q < before);
                    assert_eq!(request.payload, synthetic_key(q));
                }
                TrafficShape::Write { w } => {
                    writes += 1;
                    assert_eq!(w, before);
                    assert_eq!(request.payload, format!("{} me", synthetic_key(w)));
                }
            }
        }

        assert_eq!(dns.traffic_counter(), 1 + writes);
        assert_eq!(dns.flow().open_flows(), 60);
        assert_eq!(dns.guesses().total(), 60);
        assert_eq!(dns.stats().requests_sent, 60);
    }

    #[test]
    fn test_undeliverable_request_closes_its_flow() {
        let (mut dns, _inbox, _) = actor(DenominatorConfig::default());
        let (endpoint, endpoint_rx) = mailbox(MailboxId::from_seed(1));
        dns.handle_message(msg(MessageKind::NameDrop, Some(&endpoint), "svc0"));
        drop(endpoint_rx);

        for _ in 0..200 {
            assert!(dns.chat_tick().is_some());
        }

        assert_eq!(dns.stats().undeliverable, 200);
        assert_eq!(dns.stats().requests_sent, 200);
        assert_eq!(dns.flow().open_flows(), 0);
    }

    #[test]
    fn test_response_updates_flow_histograms_once() {
        let (mut dns, _inbox, _) = actor(DenominatorConfig::default());
        let (parent, _parent_rx) = mailbox(MailboxId::from_seed(1));
        let (endpoint, mut endpoint_rx) = mailbox(MailboxId::from_seed(2));
        dns.handle_message(msg(MessageKind::Hello, Some(&parent), "dns"));
        dns.handle_message(msg(MessageKind::NameDrop, Some(&endpoint), "svc0"));

        dns.chat_tick().unwrap();
        let request = endpoint_rx.try_recv().unwrap();

        // The request itself never touches the flow histograms
        dns.handle_message(request.clone());
        let h = dns.histograms();
        assert_eq!((h.resp.count(), h.serv.count(), h.rt.count()), (0, 0, 0));

        let response = Message::new(
            MessageKind::GetResponse,
            Some(endpoint.clone()),
            SystemTime::now(),
            request.ctx.child(),
            "because",
        );
        dns.handle_message(response);

        let h = dns.histograms();
        assert_eq!((h.resp.count(), h.serv.count(), h.rt.count()), (1, 1, 1));
        assert_eq!(dns.flow().open_flows(), 0);
    }

    #[test]
    fn test_shutdown_notifies_parent_once() {
        let (mut dns, _inbox, collector) = actor(DenominatorConfig::default());
        let (parent, mut parent_rx) = mailbox(MailboxId::from_seed(1));
        let (endpoint, mut endpoint_rx) = mailbox(MailboxId::from_seed(2));
        let (registry, mut registry_rx) = mailbox(MailboxId::from_seed(3));

        dns.handle_message(msg(MessageKind::Hello, Some(&parent), "dns"));
        dns.handle_message(msg(MessageKind::Inform, Some(&registry), "zoneA"));
        dns.handle_message(msg(MessageKind::NameDrop, Some(&endpoint), "svc0"));
        dns.handle_message(msg(MessageKind::Chat, None, "10ms"));
        dns.chat_tick().unwrap();
        drain(&mut endpoint_rx);
        drain(&mut registry_rx);

        assert_eq!(
            dns.handle_message(msg(MessageKind::Goodbye, None, "")),
            Control::Shutdown
        );
        dns.shutdown();
        dns.shutdown();

        let notices = drain(&mut parent_rx);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, MessageKind::Goodbye);
        assert_eq!(notices[0].payload, "dns");
        assert_eq!(dns.lifecycle(), Lifecycle::Terminated);
        assert_eq!(dns.chat_rate(), None);

        // Four histograms plus the key guesses, all under the node name
        assert_eq!(collector.artifact_count(), 5);
        for suffix in [NET, RESP, SERV, RT] {
            assert!(collector.histogram("dns", suffix).is_some());
        }
        assert_eq!(collector.guesses("dns").unwrap().total(), 1);

        // Nothing leaves the actor any more
        assert!(dns.chat_tick().is_none());
        assert_eq!(dns.discovery_tick(), 0);
        dns.handle_message(msg(MessageKind::NameDrop, None, "svcB"));
        assert!(drain(&mut endpoint_rx).is_empty());
        assert!(drain(&mut registry_rx).is_empty());
        assert!(drain(&mut parent_rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_chat_timer_fires_at_rate() {
        let (dns, inbox, _) = actor(DenominatorConfig::default());
        let me = dns.mailbox().clone();
        let (parent, _parent_rx) = mailbox(MailboxId::from_seed(1));
        let (endpoint, mut endpoint_rx) = mailbox(MailboxId::from_seed(2));
        let handle = tokio::spawn(dns.run(inbox));

        me.send(msg(MessageKind::Hello, Some(&parent), "dns")).unwrap();
        me.send(msg(MessageKind::NameDrop, Some(&endpoint), "svc0")).unwrap();
        me.send(msg(MessageKind::Chat, None, "10ms")).unwrap();
        tokio::time::sleep(Duration::from_millis(105)).await;

        let requests = drain(&mut endpoint_rx);
        assert!((9..=11).contains(&requests.len()), "got {}", requests.len());

        // A rejected rate leaves the timer running at 10ms
        me.send(msg(MessageKind::Chat, None, "2h")).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let requests = drain(&mut endpoint_rx);
        assert!((9..=11).contains(&requests.len()), "got {}", requests.len());

        me.send(msg(MessageKind::Goodbye, None, "")).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_discovery_interval() {
        let config = DenominatorConfig {
            eureka_poll: Duration::from_millis(100),
            ..Default::default()
        };
        let (registry, mut registry_rx) = mailbox(MailboxId::from_seed(1));
        let me = Denominator::start(
            TokioContext::shared(),
            Arc::new(config),
            Box::new(MemoryCollector::new()),
            MailboxId::from_seed(100),
        );

        me.send(msg(MessageKind::Inform, Some(&registry), "zoneA")).unwrap();
        me.send(msg(MessageKind::NameDrop, None, "svcA")).unwrap();
        me.send(msg(MessageKind::NameDrop, None, "svcB")).unwrap();
        tokio::time::sleep(Duration::from_millis(350)).await;

        // Two immediate lookups, then two per tick at 100, 200 and 300ms
        let lookups = drain(&mut registry_rx);
        assert_eq!(lookups.len(), 8);
        assert!(lookups.iter().all(|m| m.reply_to.as_ref() == Some(&me)));

        me.send(msg(MessageKind::Goodbye, None, "")).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_survives_zero_discovery_period() {
        let config = DenominatorConfig {
            eureka_poll: Duration::ZERO,
            ..Default::default()
        };
        let (dns, inbox, collector) = actor(config);
        let me = dns.mailbox().clone();
        let (registry, mut registry_rx) = mailbox(MailboxId::from_seed(1));
        let handle = tokio::spawn(dns.run(inbox));

        me.send(msg(MessageKind::Inform, Some(&registry), "zoneA")).unwrap();
        me.send(msg(MessageKind::NameDrop, None, "svcA")).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        me.send(msg(MessageKind::Goodbye, None, "")).unwrap();
        handle.await.unwrap();

        assert!(drain(&mut registry_rx).len() > 1);
        assert_eq!(collector.artifact_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_goodbye_stops_everything() {
        let (dns, inbox, collector) = actor(DenominatorConfig::default());
        let me = dns.mailbox().clone();
        let (parent, mut parent_rx) = mailbox(MailboxId::from_seed(1));
        let (endpoint, mut endpoint_rx) = mailbox(MailboxId::from_seed(2));
        let handle = tokio::spawn(dns.run(inbox));

        me.send(msg(MessageKind::Hello, Some(&parent), "dns")).unwrap();
        me.send(msg(MessageKind::NameDrop, Some(&endpoint), "svc0")).unwrap();
        me.send(msg(MessageKind::Chat, None, "5ms")).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        me.send(msg(MessageKind::Goodbye, None, "")).unwrap();
        handle.await.unwrap();

        let notice = parent_rx.recv().await.unwrap();
        assert_eq!(notice.kind, MessageKind::Goodbye);
        assert_eq!(notice.payload, "dns");
        assert!(parent_rx.try_recv().is_none());
        assert_eq!(collector.artifact_count(), 5);

        drain(&mut endpoint_rx);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(drain(&mut endpoint_rx).is_empty());

        // The inbox is gone with the actor
        assert!(me.send(msg(MessageKind::Hello, None, "late")).is_err());
    }
}
