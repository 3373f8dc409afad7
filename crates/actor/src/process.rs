//! Delivery targets behind PIDs, and the process registry that owns them.
//!
//! A [`Pid`] is only a lookup key; the registry is the single owner of
//! every process. Resolution happens per send, against a slot with an
//! explicit dead flag — there is no cached pointer to go stale.

use crate::cell::ActorCell;
use crate::event_stream::EventStream;
use crate::mailbox::Mailbox;
use crate::message::{Envelope, Message, SystemMessage};
use crate::pid::Pid;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A delivery target: the polymorphic object behind a [`Pid`].
///
/// Local actors, reply futures, dead letters, and routers all implement
/// this; a remote transport would implement it as its delivery seam.
pub trait Process: Send + Sync {
    /// Deliver a user message.
    fn send_user(&self, envelope: Envelope);

    /// Deliver a system message.
    fn send_system(&self, message: SystemMessage);
}

/// Mailbox-backed local actor process.
pub(crate) struct LocalProcess {
    pub(crate) mailbox: Arc<Mailbox>,
}

impl Process for LocalProcess {
    fn send_user(&self, envelope: Envelope) {
        self.mailbox.post_user(envelope);
    }

    fn send_system(&self, message: SystemMessage) {
        self.mailbox.post_system(message);
    }
}

/// Published on the event stream for every undeliverable message.
#[derive(Clone)]
pub struct DeadLetterEvent {
    /// Where the message was addressed, when known.
    pub target: Option<Pid>,
    /// Who sent it, when known.
    pub sender: Option<Pid>,
    /// The message itself.
    pub message: Message,
}

/// Sink for undeliverable messages. Never drops silently: every message is
/// published as a [`DeadLetterEvent`] and traced.
pub(crate) struct DeadLetterProcess {
    events: EventStream,
}

impl DeadLetterProcess {
    pub(crate) fn new(events: EventStream) -> Self {
        Self { events }
    }

    pub(crate) fn receive(&self, target: Option<Pid>, envelope: Envelope) {
        tracing::debug!(?target, sender = ?envelope.sender, "message routed to dead letters");
        self.events.publish(&DeadLetterEvent {
            target,
            sender: envelope.sender,
            message: envelope.message,
        });
    }
}

impl Process for DeadLetterProcess {
    fn send_user(&self, envelope: Envelope) {
        self.receive(None, envelope);
    }

    fn send_system(&self, message: SystemMessage) {
        tracing::debug!(?message, "system message routed to dead letters");
    }
}

/// Fan-out proxy: forwards every user message to a fixed set of routees.
///
/// Routee processes are captured at construction; a routee that stops
/// simply dead-letters its copies. Routers have no lifecycle of their own,
/// so system messages are traced and dropped.
pub(crate) struct BroadcastRouter {
    routees: Vec<Arc<dyn Process>>,
}

impl BroadcastRouter {
    pub(crate) fn new(routees: Vec<Arc<dyn Process>>) -> Self {
        Self { routees }
    }
}

impl Process for BroadcastRouter {
    fn send_user(&self, envelope: Envelope) {
        for routee in &self.routees {
            routee.send_user(envelope.clone());
        }
    }

    fn send_system(&self, message: SystemMessage) {
        tracing::trace!(?message, "router ignores system message");
    }
}

pub(crate) struct ProcessSlot {
    pub(crate) process: Arc<dyn Process>,
    pub(crate) cell: Option<Arc<ActorCell>>,
    dead: AtomicBool,
}

/// Owner of all processes in one actor system.
pub(crate) struct ProcessRegistry {
    next_id: AtomicU64,
    slots: DashMap<u64, ProcessSlot>,
}

impl ProcessRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            slots: DashMap::new(),
        }
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn insert(&self, id: u64, process: Arc<dyn Process>, cell: Option<Arc<ActorCell>>) {
        self.slots.insert(
            id,
            ProcessSlot {
                process,
                cell,
                dead: AtomicBool::new(false),
            },
        );
    }

    /// Resolve a live process. Dead or missing slots return `None`.
    pub(crate) fn get(&self, id: u64) -> Option<Arc<dyn Process>> {
        let slot = self.slots.get(&id)?;
        if slot.dead.load(Ordering::SeqCst) {
            return None;
        }
        Some(Arc::clone(&slot.process))
    }

    /// The actor cell for a pid, if it is a local actor still registered.
    pub(crate) fn cell(&self, id: u64) -> Option<Arc<ActorCell>> {
        self.slots.get(&id)?.cell.as_ref().map(Arc::clone)
    }

    /// Mark a slot dead: subsequent resolution dead-letters, while code
    /// already holding the process can finish its in-flight work.
    pub(crate) fn mark_dead(&self, id: u64) {
        if let Some(slot) = self.slots.get(&id) {
            slot.dead.store(true, Ordering::SeqCst);
        }
    }

    pub(crate) fn remove(&self, id: u64) {
        self.slots.remove(&id);
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}
