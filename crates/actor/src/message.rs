//! Message and envelope types.

use crate::pid::Pid;
use std::any::Any;
use std::sync::Arc;

/// A user message: any shareable value.
///
/// Messages are reference-counted so routers can fan one message out to
/// many recipients without copying; handlers downcast to concrete types.
pub type Message = Arc<dyn Any + Send + Sync>;

/// Wrap a concrete value as a [`Message`].
pub fn message<M: Any + Send + Sync>(value: M) -> Message {
    Arc::new(value)
}

/// A user message together with its reply-to sender.
#[derive(Clone)]
pub struct Envelope {
    /// The message payload.
    pub message: Message,
    /// PID replies should go to, if the sender expects one.
    pub sender: Option<Pid>,
}

/// Lifecycle and supervision messages, delivered with strict priority over
/// user messages.
#[derive(Debug, Clone)]
pub enum SystemMessage {
    /// The actor has been spawned and may initialize.
    Started,
    /// Stop after the current message; terminal.
    Stop,
    /// Replace the actor instance from its producer and resume.
    Restart,
    /// Resume processing after a suspension, keeping actor state.
    Resume,
    /// A child actor failed; the receiver is its supervisor.
    Failure(Failure),
}

/// Report of a child actor failure, routed to its supervisor.
#[derive(Debug, Clone)]
pub struct Failure {
    /// The failing child.
    pub child: Pid,
    /// Panic payload rendered as text.
    pub reason: String,
}
