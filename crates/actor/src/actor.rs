//! Actor trait, spawn configuration, and the per-message context.

use crate::cell::ActorCell;
use crate::dispatcher::Dispatcher;
use crate::future::ActorFuture;
use crate::message::{message, Envelope, Message};
use crate::pid::Pid;
use crate::supervision::{OneForOneStrategy, SupervisorStrategy};
use crate::system::ActorSystem;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

/// A message-processing behavior.
///
/// `receive` is invoked strictly sequentially per actor. Lifecycle hooks
/// default to no-ops.
pub trait Actor: Send + 'static {
    /// Handle one user message.
    fn receive(&mut self, ctx: &mut Context<'_>, message: Message);

    /// Called once after spawn and again after each restart.
    fn started(&mut self, _ctx: &mut Context<'_>) {}

    /// Called when a stop begins, before children are stopped.
    fn stopping(&mut self, _ctx: &mut Context<'_>) {}

    /// Called after children are stopped, just before removal.
    fn stopped(&mut self, _ctx: &mut Context<'_>) {}
}

/// Spawn configuration: how to produce the actor and how to run it.
#[derive(Clone)]
pub struct Props {
    producer: Arc<dyn Fn() -> Box<dyn Actor> + Send + Sync>,
    throughput: Option<usize>,
    strategy: Arc<dyn SupervisorStrategy>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
}

impl Props {
    /// Props from an actor producer. The producer is re-invoked on restart.
    pub fn from_producer<A, F>(producer: F) -> Self
    where
        A: Actor,
        F: Fn() -> A + Send + Sync + 'static,
    {
        Self {
            producer: Arc::new(move || Box::new(producer())),
            throughput: None,
            // Default child policy: a bounded run of restarts, then stop.
            strategy: Arc::new(OneForOneStrategy::new(10, Duration::from_secs(10))),
            dispatcher: None,
        }
    }

    /// Override the mailbox user-message batch size.
    pub fn with_throughput(mut self, throughput: usize) -> Self {
        self.throughput = Some(throughput);
        self
    }

    /// Supervision strategy applied to this actor's children.
    pub fn with_supervisor(mut self, strategy: impl SupervisorStrategy + 'static) -> Self {
        self.strategy = Arc::new(strategy);
        self
    }

    /// Run this actor's mailbox on a dedicated dispatcher.
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub(crate) fn produce(&self) -> Box<dyn Actor> {
        (self.producer)()
    }

    pub(crate) fn throughput(&self) -> Option<usize> {
        self.throughput
    }

    pub(crate) fn strategy(&self) -> &Arc<dyn SupervisorStrategy> {
        &self.strategy
    }

    pub(crate) fn dispatcher(&self) -> Option<&Arc<dyn Dispatcher>> {
        self.dispatcher.as_ref()
    }
}

/// Per-message view the actor receives alongside the message.
pub struct Context<'a> {
    system: &'a ActorSystem,
    cell: &'a ActorCell,
    sender: Option<Pid>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(system: &'a ActorSystem, cell: &'a ActorCell, sender: Option<Pid>) -> Self {
        Self {
            system,
            cell,
            sender,
        }
    }

    /// The owning actor system.
    pub fn system(&self) -> &ActorSystem {
        self.system
    }

    /// This actor's own pid.
    pub fn self_pid(&self) -> &Pid {
        self.cell.self_pid()
    }

    /// Reply-to pid of the current message, if the sender expects a reply.
    pub fn sender(&self) -> Option<&Pid> {
        self.sender.as_ref()
    }

    /// Reply to the current message's sender. With no sender the reply goes
    /// to dead letters (a request made with `tell` gets no response).
    pub fn respond<M: Any + Send + Sync>(&self, reply: M) {
        let envelope = Envelope {
            message: message(reply),
            sender: Some(self.self_pid().clone()),
        };
        match &self.sender {
            Some(sender) => self.system.send_envelope(sender, envelope),
            None => self.system.dead_letter(None, envelope),
        }
    }

    /// Fire-and-forget send with this actor as the sender.
    pub fn tell<M: Any + Send + Sync>(&self, target: &Pid, msg: M) {
        self.system.send_envelope(
            target,
            Envelope {
                message: message(msg),
                sender: Some(self.self_pid().clone()),
            },
        );
    }

    /// Request with an explicit reply-to pid.
    pub fn request<M: Any + Send + Sync>(&self, target: &Pid, msg: M, reply_to: &Pid) {
        self.system.request(target, msg, reply_to);
    }

    /// Request with an ephemeral future as the reply target.
    pub fn request_future<M: Any + Send + Sync>(
        &self,
        target: &Pid,
        msg: M,
        timeout: Duration,
    ) -> ActorFuture {
        self.system.request_future(target, msg, timeout)
    }

    /// Spawn a child supervised by this actor.
    pub fn spawn_child(&self, props: Props) -> Pid {
        self.system
            .spawn_child_of(props, Some(self.self_pid().clone()))
    }

    /// Currently registered children of this actor.
    pub fn children(&self) -> Vec<Pid> {
        self.cell.children()
    }

    /// Begin stopping this actor after the current message.
    pub fn stop_self(&self) {
        self.system.stop(self.self_pid());
    }
}
