//! Reply futures.
//!
//! `request_future` spawns an ephemeral one-shot process as the reply-to
//! pid and hands the caller an [`ActorFuture`]. `result` blocks the calling
//! thread — never a dispatcher worker — until the reply or the timeout,
//! whichever comes first. Once the future is resolved or dropped its
//! registry slot is released, so a late reply lands in dead letters rather
//! than resurrecting it.

use crate::message::{Envelope, Message, SystemMessage};
use crate::pid::Pid;
use crate::process::{DeadLetterEvent, Process};
use crate::system::ActorSystem;
use crate::ActorError;
use crate::EventStream;
use std::any::{type_name, Any};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One-shot reply target registered in the process registry.
pub(crate) struct FutureProcess {
    pid: Pid,
    tx: crossbeam_channel::Sender<Message>,
    completed: AtomicBool,
    events: EventStream,
}

impl FutureProcess {
    pub(crate) fn new(
        pid: Pid,
        tx: crossbeam_channel::Sender<Message>,
        events: EventStream,
    ) -> Self {
        Self {
            pid,
            tx,
            completed: AtomicBool::new(false),
            events,
        }
    }
}

impl Process for FutureProcess {
    fn send_user(&self, envelope: Envelope) {
        // First reply wins; anything after that is observable as a dead
        // letter, not silently discarded.
        if self.completed.swap(true, Ordering::SeqCst)
            || self.tx.try_send(envelope.message.clone()).is_err()
        {
            self.events.publish(&DeadLetterEvent {
                target: Some(self.pid.clone()),
                sender: envelope.sender,
                message: envelope.message,
            });
        }
    }

    fn send_system(&self, message: SystemMessage) {
        tracing::trace!(?message, "future process ignores system message");
    }
}

/// Handle to a pending reply.
pub struct ActorFuture {
    pid: Pid,
    rx: crossbeam_channel::Receiver<Message>,
    timeout: Duration,
    system: ActorSystem,
}

impl ActorFuture {
    pub(crate) fn new(
        pid: Pid,
        rx: crossbeam_channel::Receiver<Message>,
        timeout: Duration,
        system: ActorSystem,
    ) -> Self {
        Self {
            pid,
            rx,
            timeout,
            system,
        }
    }

    /// The ephemeral reply-to pid backing this future.
    pub fn pid(&self) -> &Pid {
        &self.pid
    }

    /// Block until the reply or the timeout. Either way the future's
    /// process is torn down before returning.
    pub fn result(self) -> Result<Message, ActorError> {
        let outcome = self.rx.recv_timeout(self.timeout);
        self.system.release_future(&self.pid);
        outcome.map_err(|_| ActorError::Timeout {
            timeout: self.timeout,
        })
    }

    /// Like [`result`](Self::result), downcast to the expected reply type.
    pub fn result_as<T: Any + Send + Sync>(self) -> Result<Arc<T>, ActorError> {
        self.result()?
            .downcast::<T>()
            .map_err(|_| ActorError::UnexpectedResponse {
                expected: type_name::<T>(),
            })
    }
}

impl Drop for ActorFuture {
    fn drop(&mut self) {
        // Idempotent; covers futures abandoned without calling result().
        self.system.release_future(&self.pid);
    }
}
