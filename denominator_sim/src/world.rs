//! SimWorld - the simulation harness container.

use crate::context::SimContext;
use crate::error::SimError;
use crate::report::{RegistryReport, RunReport, ServiceReport};
use crate::stubs::{spawn_registry, spawn_service, StubHandle};

use denominator_core::metrics::{NET, RESP, RT, SERV};
use denominator_core::traffic::parse_chat_rate;
use denominator_core::{collector_for, Denominator, DenominatorConfig, MemoryCollector};
use denominator_env::{
    mailbox, ActorContext, EnvError, Mailbox, MailboxId, Message, MessageKind, TraceContext,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Name given to the denominator by its parent.
pub const NODE_NAME: &str = "dns";

/// How long the parent waits for the completion notice.
const NOTICE_TIMEOUT: Duration = Duration::from_secs(5);

// Mailbox seed ranges, one per role
const PARENT_SEED: u64 = 0;
const NODE_SEED: u64 = 1;
const REGISTRY_SEED: u64 = 100;
const SERVICE_SEED: u64 = 1000;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Number of zones, one registry each
    pub zones: usize,

    /// Number of services, spread round-robin over the zones
    pub services: usize,

    /// Chat payload sent to the node
    pub chat_rate: String,

    /// Virtual time between Chat and Goodbye
    pub duration: Duration,

    /// How long a service takes to answer
    pub service_time: Duration,

    /// Configuration handed to the denominator
    pub node: DenominatorConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            zones: 3,
            services: 6,
            chat_rate: "10ms".to_string(),
            duration: Duration::from_secs(10),
            service_time: Duration::from_millis(2),
            node: DenominatorConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        if self.zones == 0 {
            return Err(SimError::invalid_config("at least one zone is required"));
        }
        if self.duration.is_zero() {
            return Err(SimError::invalid_config("duration must be positive"));
        }
        if parse_chat_rate(&self.chat_rate).is_none() {
            return Err(SimError::invalid_config(format!(
                "chat rate {:?} is not a duration in [1ms, 1h]",
                self.chat_rate
            )));
        }
        self.node.validate()?;
        Ok(())
    }
}

/// The SimWorld - one denominator with its registries and services.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,
}

impl SimWorld {
    /// Creates a new SimWorld with the given configuration.
    ///
    /// Call from inside a runtime with a paused clock.
    pub fn new(config: SimConfig) -> Self {
        let context = SimContext::shared(config.seed);
        Self { config, context }
    }

    /// Zone `index`, named from the node config when it has enough names.
    pub fn zone_name(&self, index: usize) -> String {
        self.config
            .node
            .zone_names
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("zone{}", index))
    }

    pub fn service_name(index: usize) -> String {
        format!("svc{}", index)
    }

    /// Runs one simulation to completion.
    ///
    /// The node learns every service only by name, so all endpoints it
    /// sends traffic to were discovered through the registries.
    ///
    /// Goodbye is sent half a chat period after `duration`. A Goodbye on
    /// the same virtual instant as a chat tick would race it inside the
    /// node's `select!`, and the run would no longer follow from the seed.
    pub async fn run(&self) -> Result<RunReport, SimError> {
        self.config.validate()?;
        let settle = parse_chat_rate(&self.config.chat_rate)
            .map(|rate| rate / 2)
            .unwrap_or_default();
        let ctx = &self.context;
        let (parent, mut notices) = mailbox(MailboxId::from_seed(PARENT_SEED));

        let services: Vec<(String, String, StubHandle)> = (0..self.config.services)
            .map(|i| {
                let name = Self::service_name(i);
                let zone = self.zone_name(i % self.config.zones);
                let id = MailboxId::from_seed(SERVICE_SEED + i as u64);
                let handle = spawn_service(ctx, id, &name, self.config.service_time);
                (name, zone, handle)
            })
            .collect();

        let registries: Vec<(String, StubHandle)> = (0..self.config.zones)
            .map(|z| {
                let zone = self.zone_name(z);
                let known = services
                    .iter()
                    .filter(|(_, home, _)| *home == zone)
                    .map(|(name, _, handle)| (name.clone(), handle.mailbox.clone()))
                    .collect();
                let id = MailboxId::from_seed(REGISTRY_SEED + z as u64);
                let handle = spawn_registry(ctx, id, &zone, known);
                (zone, handle)
            })
            .collect();

        let memory = MemoryCollector::new();
        let node = Denominator::start(
            Arc::clone(ctx),
            Arc::new(self.config.node.clone()),
            Box::new(memory.clone()),
            MailboxId::from_seed(NODE_SEED),
        );

        self.send(&node, MessageKind::Hello, Some(&parent), NODE_NAME)?;
        for (zone, registry) in &registries {
            self.send(&node, MessageKind::Inform, Some(&registry.mailbox), zone)?;
        }
        for (name, _, _) in &services {
            self.send(&node, MessageKind::NameDrop, None, name)?;
        }
        self.send(&node, MessageKind::Chat, None, &self.config.chat_rate)?;
        info!(
            seed = self.config.seed,
            zones = self.config.zones,
            services = self.config.services,
            chat_rate = %self.config.chat_rate,
            "simulation started"
        );

        ctx.sleep(self.config.duration + settle).await;
        self.send(&node, MessageKind::Goodbye, None, "")?;

        let notice = tokio::time::timeout(NOTICE_TIMEOUT, notices.recv())
            .await
            .map_err(|_| EnvError::timeout(NOTICE_TIMEOUT))?
            .ok_or_else(|| EnvError::closed(parent.id()))?;
        if notice.kind != MessageKind::Goodbye {
            return Err(SimError::UnexpectedNotice(notice.to_string()));
        }
        debug!(at = ?ctx.now(), "completion notice received");

        for (_, _, service) in &services {
            service.stop(ctx.as_ref());
        }
        for (_, registry) in &registries {
            registry.stop(ctx.as_ref());
        }

        if self.config.node.collect_dir.is_some() {
            let mut target = collector_for(&self.config.node);
            let saved = memory.replay_into(NODE_NAME, target.as_mut())?;
            info!(artifacts = saved, "artifacts persisted");
        }

        let histograms = [NET, RESP, SERV, RT]
            .iter()
            .filter_map(|suffix| memory.histogram(NODE_NAME, suffix))
            .map(|hist| hist.summary())
            .collect();
        let guesses = memory.guesses(NODE_NAME).unwrap_or_default();

        Ok(RunReport {
            seed: self.config.seed,
            node: NODE_NAME.to_string(),
            duration_sec: self.config.duration.as_secs_f64(),
            chat_rate: self.config.chat_rate.clone(),
            services: services
                .iter()
                .map(|(name, zone, handle)| ServiceReport {
                    name: name.clone(),
                    zone: zone.clone(),
                    requests: handle.requests(),
                })
                .collect(),
            registries: registries
                .iter()
                .map(|(zone, handle)| RegistryReport {
                    zone: zone.clone(),
                    lookups: handle.requests(),
                })
                .collect(),
            histograms,
            keys_requested: guesses.total(),
            distinct_keys: guesses.len(),
            clean_shutdown: notice.payload == NODE_NAME,
        })
    }

    fn send(
        &self,
        to: &Mailbox,
        kind: MessageKind,
        reply_to: Option<&Mailbox>,
        payload: &str,
    ) -> Result<(), SimError> {
        let msg = Message::new(
            kind,
            reply_to.cloned(),
            self.context.system_time(),
            TraceContext::NIL,
            payload,
        );
        to.send(msg)?;
        Ok(())
    }
}
