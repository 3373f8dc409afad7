//! The actor system: registry, dispatcher, and send paths.

use crate::actor::Props;
use crate::cell::{ActorCell, RootSupervisor};
use crate::dispatcher::{Dispatcher, PooledDispatcher};
use crate::event_stream::EventStream;
use crate::future::{ActorFuture, FutureProcess};
use crate::mailbox::Mailbox;
use crate::message::{message, Envelope, Failure, SystemMessage};
use crate::pid::Pid;
use crate::process::{BroadcastRouter, DeadLetterProcess, Process, ProcessRegistry};
use crate::supervision::{OneForOneStrategy, SupervisorStrategy};
use crate::ActorError;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Monotonic suffix making every system's address unique within the
/// process, so pids from one system never alias another's registry.
static SYSTEM_SEQ: AtomicU64 = AtomicU64::new(0);

/// An in-process actor system.
///
/// Cheap to clone; all clones share one registry. There are no globals:
/// every test constructs its own isolated system.
#[derive(Clone)]
pub struct ActorSystem {
    inner: Arc<SystemInner>,
}

struct SystemInner {
    address: Arc<str>,
    registry: ProcessRegistry,
    dispatcher: Arc<dyn Dispatcher>,
    events: EventStream,
    dead_letters: DeadLetterProcess,
    guardian_strategy: Box<dyn SupervisorStrategy>,
}

impl ActorSystem {
    /// Create a system backed by a shared rayon dispatcher pool.
    pub fn new() -> Result<Self, ActorError> {
        Ok(Self::with_dispatcher(PooledDispatcher::shared(None)?))
    }

    /// Create a system on the given dispatcher (e.g. [`crate::SyncDispatcher`]
    /// for deterministic tests).
    pub fn with_dispatcher(dispatcher: Arc<dyn Dispatcher>) -> Self {
        let seq = SYSTEM_SEQ.fetch_add(1, Ordering::Relaxed);
        let events = EventStream::new();
        Self {
            inner: Arc::new(SystemInner {
                address: Arc::from(format!("local-{seq}")),
                registry: ProcessRegistry::new(),
                dispatcher,
                dead_letters: DeadLetterProcess::new(events.clone()),
                events,
                guardian_strategy: Box::new(OneForOneStrategy::new(10, Duration::from_secs(10))),
            }),
        }
    }

    /// This system's address, embedded in every pid it issues.
    pub fn address(&self) -> &str {
        &self.inner.address
    }

    /// The system-wide observability event stream.
    pub fn event_stream(&self) -> &EventStream {
        &self.inner.events
    }

    /// Number of live registry entries (actors, futures, routers).
    pub fn process_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Spawn a top-level actor supervised by the root guardian.
    pub fn spawn(&self, props: Props) -> Pid {
        self.spawn_child_of(props, None)
    }

    pub(crate) fn spawn_child_of(&self, props: Props, parent: Option<Pid>) -> Pid {
        let id = self.inner.registry.next_id();
        let pid = Pid::new(self.inner.address.clone(), id);

        let cell = Arc::new(ActorCell::new(
            self.clone(),
            pid.clone(),
            parent.clone(),
            props.clone(),
        ));
        let dispatcher = props
            .dispatcher()
            .cloned()
            .unwrap_or_else(|| self.inner.dispatcher.clone());
        let throughput = props.throughput().unwrap_or(dispatcher.throughput());
        let mailbox = Arc::new(Mailbox::new(dispatcher, throughput, cell.clone()));
        cell.attach_mailbox(mailbox.clone());

        let process: Arc<dyn Process> = Arc::new(crate::process::LocalProcess {
            mailbox: mailbox.clone(),
        });
        self.inner.registry.insert(id, process, Some(cell));

        if let Some(parent) = parent {
            if let Some(parent_cell) = self.cell_of(&parent) {
                parent_cell.add_child(pid.clone());
            }
        }

        mailbox.post_system(SystemMessage::Started);
        pid
    }

    /// Spawn a fan-out router forwarding every user message to `routees`.
    ///
    /// Routee processes are captured now; routees stopped later dead-letter
    /// their copies.
    pub fn spawn_broadcast_router(&self, routees: &[Pid]) -> Pid {
        let processes: Vec<Arc<dyn Process>> = routees
            .iter()
            .filter_map(|pid| self.resolve(pid))
            .collect();
        let id = self.inner.registry.next_id();
        let pid = Pid::new(self.inner.address.clone(), id);
        self.inner
            .registry
            .insert(id, Arc::new(BroadcastRouter::new(processes)), None);
        pid
    }

    /// Fire-and-forget send with no sender.
    pub fn tell<M: Any + Send + Sync>(&self, target: &Pid, msg: M) {
        self.send_envelope(
            target,
            Envelope {
                message: message(msg),
                sender: None,
            },
        );
    }

    /// Send with an explicit reply-to pid as the sender.
    pub fn request<M: Any + Send + Sync>(&self, target: &Pid, msg: M, reply_to: &Pid) {
        self.send_envelope(
            target,
            Envelope {
                message: message(msg),
                sender: Some(reply_to.clone()),
            },
        );
    }

    /// Send with an ephemeral future process as the reply target; the
    /// returned future resolves on reply or fails after `timeout`.
    pub fn request_future<M: Any + Send + Sync>(
        &self,
        target: &Pid,
        msg: M,
        timeout: Duration,
    ) -> ActorFuture {
        let id = self.inner.registry.next_id();
        let future_pid = Pid::new(self.inner.address.clone(), id);
        let (tx, rx) = crossbeam_channel::bounded(1);
        let process = Arc::new(FutureProcess::new(
            future_pid.clone(),
            tx,
            self.inner.events.clone(),
        ));
        self.inner.registry.insert(id, process, None);

        self.send_envelope(
            target,
            Envelope {
                message: message(msg),
                sender: Some(future_pid.clone()),
            },
        );

        ActorFuture::new(future_pid, rx, timeout, self.clone())
    }

    /// Ask an actor to stop after its current message.
    pub fn stop(&self, pid: &Pid) {
        self.send_system(pid, SystemMessage::Stop);
    }

    /// Stop an actor and block until it is fully stopped or the timeout
    /// elapses.
    pub fn graceful_stop(&self, pid: &Pid, timeout: Duration) -> Result<(), ActorError> {
        let Some(cell) = self.cell_of(pid) else {
            // Not a live local actor: nothing to wait for.
            return Ok(());
        };
        let (tx, rx) = crossbeam_channel::bounded(1);
        cell.add_watcher(tx);
        self.stop(pid);
        rx.recv_timeout(timeout)
            .map_err(|_| ActorError::Timeout { timeout })
    }

    fn resolve(&self, pid: &Pid) -> Option<Arc<dyn Process>> {
        if pid.address() != self.address() {
            // Remote delivery is a transport concern; with no transport
            // registered the message is undeliverable here.
            return None;
        }
        self.inner.registry.get(pid.id())
    }

    pub(crate) fn send_envelope(&self, target: &Pid, envelope: Envelope) {
        match self.resolve(target) {
            Some(process) => process.send_user(envelope),
            None => self.dead_letter(Some(target.clone()), envelope),
        }
    }

    pub(crate) fn send_system(&self, target: &Pid, msg: SystemMessage) {
        match self.resolve(target) {
            Some(process) => process.send_system(msg),
            None => tracing::debug!(%target, ?msg, "system message for unknown process dropped"),
        }
    }

    pub(crate) fn dead_letter(&self, target: Option<Pid>, envelope: Envelope) {
        self.inner.dead_letters.receive(target, envelope);
    }

    pub(crate) fn cell_of(&self, pid: &Pid) -> Option<Arc<ActorCell>> {
        if pid.address() != self.address() {
            return None;
        }
        self.inner.registry.cell(pid.id())
    }

    pub(crate) fn registry_mark_dead(&self, pid: &Pid) {
        self.inner.registry.mark_dead(pid.id());
    }

    pub(crate) fn registry_remove(&self, pid: &Pid) {
        self.inner.registry.remove(pid.id());
    }

    /// Tear down a future's registry slot: replies from now on dead-letter.
    pub(crate) fn release_future(&self, pid: &Pid) {
        self.inner.registry.mark_dead(pid.id());
        self.inner.registry.remove(pid.id());
    }

    /// Apply the root guardian strategy to a top-level actor failure.
    pub(crate) fn guardian_failure(&self, failure: Failure) {
        let supervisor = RootSupervisor {
            system: self.clone(),
        };
        self.inner
            .guardian_strategy
            .handle_failure(&supervisor, &failure.child, &failure.reason);
    }
}
