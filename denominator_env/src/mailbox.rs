//! Mailbox transport between actors.

use crate::error::EnvError;
use crate::types::{MailboxId, Message};
use std::fmt;
use tokio::sync::mpsc;

/// Creates a connected mailbox/inbox pair.
///
/// The channel is unbounded: senders never wait on a slow receiver.
///
/// # Message Flow
///
/// ```text
/// Actor A                    Mailbox(B)                 Actor B
///   |                           |                          |
///   |-- send(msg) ------------->|                          |
///   |                           |-- FIFO ----------------->|
///   |                           |                          |-- inbox.recv() -> msg
/// ```
pub fn mailbox(id: MailboxId) -> (Mailbox, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Mailbox { id, tx }, Inbox { id, rx })
}

/// Sending half: the only way to reach an actor.
///
/// Cheap to clone; every clone addresses the same inbox.
#[derive(Clone)]
pub struct Mailbox {
    id: MailboxId,
    tx: mpsc::UnboundedSender<Message>,
}

impl Mailbox {
    /// Returns this mailbox's ID.
    pub fn id(&self) -> MailboxId {
        self.id
    }

    /// Queues a message for delivery.
    ///
    /// # Returns
    /// * `Ok(())` - Message queued
    /// * `Err(EnvError::MailboxClosed)` - The receiving actor has gone away
    pub fn send(&self, msg: Message) -> Result<(), EnvError> {
        self.tx.send(msg).map_err(|_| EnvError::closed(self.id))
    }

    /// Returns true once the receiving inbox has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl PartialEq for Mailbox {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Mailbox {}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mailbox({})", self.id)
    }
}

/// Receiving half, owned by exactly one actor.
pub struct Inbox {
    id: MailboxId,
    rx: mpsc::UnboundedReceiver<Message>,
}

impl Inbox {
    /// Returns the ID of the mailbox feeding this inbox.
    pub fn id(&self) -> MailboxId {
        self.id
    }

    /// Receives the next message in FIFO order.
    ///
    /// Returns `None` once every `Mailbox` clone has been dropped.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Receives a message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}

impl fmt::Debug for Inbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Inbox({})", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageKind, TraceContext};
    use std::time::SystemTime;

    fn msg(payload: &str) -> Message {
        Message::new(
            MessageKind::Chat,
            None,
            SystemTime::now(),
            TraceContext::NIL,
            payload,
        )
    }

    #[tokio::test]
    async fn test_mailbox_delivers_in_order() {
        let (tx, mut rx) = mailbox(MailboxId::from_seed(1));

        tx.send(msg("a")).unwrap();
        tx.send(msg("b")).unwrap();

        assert_eq!(rx.recv().await.unwrap().payload, "a");
        assert_eq!(rx.recv().await.unwrap().payload, "b");
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_send_to_dropped_inbox_fails() {
        let (tx, rx) = mailbox(MailboxId::from_seed(2));
        drop(rx);

        assert!(tx.is_closed());
        assert!(matches!(tx.send(msg("late")), Err(EnvError::MailboxClosed(_))));
    }

    #[test]
    fn test_mailbox_equality_is_by_id() {
        let (a, _rx) = mailbox(MailboxId::from_seed(3));
        let b = a.clone();
        let (c, _rx2) = mailbox(MailboxId::from_seed(4));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
