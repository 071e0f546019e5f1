//! Minimal peers for the denominator: zone registries and services.
//!
//! Both stubs run until they receive Goodbye and count the requests they
//! see, so a run can be checked from the outside.

use denominator_env::{
    mailbox, ActorContext, Inbox, Mailbox, MailboxId, Message, MessageKind, TraceContext,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Handle to a spawned stub.
#[derive(Debug, Clone)]
pub struct StubHandle {
    pub mailbox: Mailbox,
    seen: Arc<AtomicU64>,
}

impl StubHandle {
    fn new(mailbox: Mailbox) -> Self {
        Self {
            mailbox,
            seen: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Requests handled so far.
    pub fn requests(&self) -> u64 {
        self.seen.load(Ordering::Relaxed)
    }

    /// Asks the stub to stop; a stub that is already gone is fine.
    pub fn stop<C: ActorContext>(&self, ctx: &C) {
        let bye = Message::new(
            MessageKind::Goodbye,
            None,
            ctx.system_time(),
            TraceContext::NIL,
            "",
        );
        if let Err(e) = self.mailbox.send(bye) {
            trace!(stub = %self.mailbox.id(), error = %e, "already stopped");
        }
    }
}

/// Spawns a registry for `zone` that knows where `services` live.
///
/// A lookup (`GetRequest` whose payload is a service name) is answered
/// with a `NameDrop` carrying the service's mailbox. Unknown names are
/// counted but not answered.
pub fn spawn_registry<C: ActorContext>(
    ctx: &Arc<C>,
    id: MailboxId,
    zone: &str,
    services: HashMap<String, Mailbox>,
) -> StubHandle {
    let (mailbox, inbox) = mailbox(id);
    let handle = StubHandle::new(mailbox);
    let task = registry_loop(
        Arc::clone(ctx),
        zone.to_string(),
        services,
        inbox,
        Arc::clone(&handle.seen),
    );
    ctx.spawn("registry", task);
    handle
}

async fn registry_loop<C: ActorContext>(
    ctx: Arc<C>,
    zone: String,
    services: HashMap<String, Mailbox>,
    mut inbox: Inbox,
    seen: Arc<AtomicU64>,
) {
    while let Some(msg) = inbox.recv().await {
        match msg.kind {
            MessageKind::GetRequest => {
                seen.fetch_add(1, Ordering::Relaxed);
                let (Some(service), Some(reply_to)) = (services.get(&msg.payload), msg.reply_to)
                else {
                    trace!(%zone, name = %msg.payload, "lookup not answered");
                    continue;
                };
                let answer = Message::new(
                    MessageKind::NameDrop,
                    Some(service.clone()),
                    ctx.system_time(),
                    TraceContext::NIL,
                    msg.payload,
                );
                if reply_to.send(answer).is_err() {
                    trace!(%zone, "asker went away");
                }
            }
            MessageKind::Goodbye => break,
            kind => trace!(%zone, %kind, "registry ignores"),
        }
    }
    debug!(%zone, lookups = seen.load(Ordering::Relaxed), "registry stopped");
}

/// Spawns a service that answers every request after `service_time`.
///
/// Reads and writes both get a `GetResponse` on the next span of the
/// request's trace.
pub fn spawn_service<C: ActorContext>(
    ctx: &Arc<C>,
    id: MailboxId,
    name: &str,
    service_time: Duration,
) -> StubHandle {
    let (mailbox, inbox) = mailbox(id);
    let handle = StubHandle::new(mailbox);
    let task = service_loop(
        Arc::clone(ctx),
        name.to_string(),
        service_time,
        inbox,
        Arc::clone(&handle.seen),
    );
    ctx.spawn("service", task);
    handle
}

async fn service_loop<C: ActorContext>(
    ctx: Arc<C>,
    name: String,
    service_time: Duration,
    mut inbox: Inbox,
    seen: Arc<AtomicU64>,
) {
    let mut store: HashMap<String, String> = HashMap::new();

    while let Some(msg) = inbox.recv().await {
        let body = match msg.kind {
            MessageKind::GetRequest => store
                .get(&msg.payload)
                .cloned()
                .unwrap_or_default(),
            MessageKind::Put => {
                let (key, value) = msg
                    .payload
                    .split_once(' ')
                    .unwrap_or((msg.payload.as_str(), ""));
                store.insert(key.to_string(), value.to_string());
                String::new()
            }
            MessageKind::Goodbye => break,
            kind => {
                trace!(service = %name, %kind, "service ignores");
                continue;
            }
        };
        seen.fetch_add(1, Ordering::Relaxed);

        if !service_time.is_zero() {
            ctx.sleep(service_time).await;
        }
        let Some(reply_to) = msg.reply_to else {
            continue;
        };
        let response = Message::new(
            MessageKind::GetResponse,
            None,
            ctx.system_time(),
            msg.ctx.child(),
            body,
        );
        if reply_to.send(response).is_err() {
            trace!(service = %name, "caller went away");
        }
    }
    debug!(service = %name, requests = seen.load(Ordering::Relaxed), keys = store.len(), "service stopped");
}
