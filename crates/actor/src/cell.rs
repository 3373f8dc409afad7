//! Actor cell: the runtime state around one actor instance.
//!
//! The cell owns the actor behavior, its lifecycle state, its children,
//! and its restart statistics. Mailboxes call into the cell to invoke
//! messages; panics are caught at that boundary and become supervision
//! failures instead of crashing the dispatcher thread.

use crate::actor::{Actor, Context, Props};
use crate::mailbox::Mailbox;
use crate::message::{Envelope, Failure, SystemMessage};
use crate::pid::Pid;
use crate::supervision::{RestartStatistics, Supervisor};
use crate::system::ActorSystem;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub(crate) struct ActorCell {
    system: ActorSystem,
    self_pid: Pid,
    parent: Option<Pid>,
    props: Props,
    actor: Mutex<Option<Box<dyn Actor>>>,
    children: Mutex<Vec<Pid>>,
    stats: Mutex<RestartStatistics>,
    mailbox: Mutex<Option<Arc<Mailbox>>>,
    watchers: Mutex<Vec<crossbeam_channel::Sender<()>>>,
    stopped: AtomicBool,
}

/// Render a panic payload as text for failure reports.
fn panic_reason(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

impl ActorCell {
    pub(crate) fn new(
        system: ActorSystem,
        self_pid: Pid,
        parent: Option<Pid>,
        props: Props,
    ) -> Self {
        let actor = props.produce();
        Self {
            system,
            self_pid,
            parent,
            props,
            actor: Mutex::new(Some(actor)),
            children: Mutex::new(Vec::new()),
            stats: Mutex::new(RestartStatistics::new()),
            mailbox: Mutex::new(None),
            watchers: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
        }
    }

    pub(crate) fn self_pid(&self) -> &Pid {
        &self.self_pid
    }

    pub(crate) fn attach_mailbox(&self, mailbox: Arc<Mailbox>) {
        *self.mailbox.lock() = Some(mailbox);
    }

    fn mailbox(&self) -> Option<Arc<Mailbox>> {
        self.mailbox.lock().clone()
    }

    pub(crate) fn children(&self) -> Vec<Pid> {
        self.children.lock().clone()
    }

    pub(crate) fn add_child(&self, child: Pid) {
        self.children.lock().push(child);
    }

    fn remove_child(&self, child: &Pid) {
        self.children.lock().retain(|c| c != child);
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Register a stop watcher; notified immediately if already stopped.
    pub(crate) fn add_watcher(&self, tx: crossbeam_channel::Sender<()>) {
        if self.is_stopped() {
            let _ = tx.send(());
            return;
        }
        self.watchers.lock().push(tx);
        // Stop may have completed between the check and the push.
        if self.is_stopped() {
            for watcher in self.watchers.lock().drain(..) {
                let _ = watcher.send(());
            }
        }
    }

    /// Record a failure and report the count inside `window`.
    pub(crate) fn record_failure(&self, window: Duration) -> u32 {
        self.stats.lock().record_failure(window)
    }

    /// Run an actor method under the panic boundary. Returns the panic
    /// reason on failure.
    fn with_actor(
        &self,
        sender: Option<Pid>,
        f: impl FnOnce(&mut Box<dyn Actor>, &mut Context<'_>),
    ) -> Result<(), String> {
        let mut guard = self.actor.lock();
        let Some(actor) = guard.as_mut() else {
            return Ok(());
        };
        let mut ctx = Context::new(&self.system, self, sender);
        catch_unwind(AssertUnwindSafe(|| f(actor, &mut ctx))).map_err(panic_reason)
    }

    pub(crate) fn invoke_user(&self, envelope: Envelope) {
        if self.is_stopped() {
            self.system
                .dead_letter(Some(self.self_pid.clone()), envelope);
            return;
        }

        let sender = envelope.sender.clone();
        let message = envelope.message;
        if let Err(reason) = self.with_actor(sender, |actor, ctx| actor.receive(ctx, message)) {
            self.fail(reason);
        }
    }

    pub(crate) fn invoke_system(&self, message: SystemMessage) {
        match message {
            SystemMessage::Started => {
                if let Err(reason) = self.with_actor(None, |actor, ctx| actor.started(ctx)) {
                    self.fail(reason);
                }
            }
            SystemMessage::Resume => {
                if let Some(mailbox) = self.mailbox() {
                    mailbox.resume();
                }
            }
            SystemMessage::Restart => self.handle_restart(),
            SystemMessage::Stop => self.handle_stop(),
            SystemMessage::Failure(failure) => self.handle_child_failure(failure),
        }
    }

    /// Suspend the mailbox and report the failure to the supervisor.
    fn fail(&self, reason: String) {
        tracing::warn!(pid = %self.self_pid, reason = %reason, "actor failed while processing a message");
        if let Some(mailbox) = self.mailbox() {
            mailbox.suspend();
        }
        self.escalate(reason);
    }

    pub(crate) fn escalate(&self, reason: String) {
        let failure = Failure {
            child: self.self_pid.clone(),
            reason,
        };
        match &self.parent {
            Some(parent) => self
                .system
                .send_system(parent, SystemMessage::Failure(failure)),
            None => self.system.guardian_failure(failure),
        }
    }

    fn handle_restart(&self) {
        if self.is_stopped() {
            return;
        }
        *self.actor.lock() = Some(self.props.produce());
        if let Err(reason) = self.with_actor(None, |actor, ctx| actor.started(ctx)) {
            self.fail(reason);
            return;
        }
        if let Some(mailbox) = self.mailbox() {
            mailbox.resume();
        }
    }

    fn handle_stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        // New sends must dead-letter from here on.
        self.system.registry_mark_dead(&self.self_pid);

        if let Err(reason) = self.with_actor(None, |actor, ctx| actor.stopping(ctx)) {
            tracing::warn!(pid = %self.self_pid, reason = %reason, "panic in stopping hook");
        }

        for child in self.children() {
            self.system.stop(&child);
        }

        if let Err(reason) = self.with_actor(None, |actor, ctx| actor.stopped(ctx)) {
            tracing::warn!(pid = %self.self_pid, reason = %reason, "panic in stopped hook");
        }

        *self.actor.lock() = None;
        self.system.registry_remove(&self.self_pid);

        if let Some(parent) = &self.parent {
            if let Some(parent_cell) = self.system.cell_of(parent) {
                parent_cell.remove_child(&self.self_pid);
            }
        }

        for watcher in self.watchers.lock().drain(..) {
            let _ = watcher.send(());
        }

        // Drop the mailbox reference so the cell/mailbox cycle is broken
        // once the registry entry is gone.
        *self.mailbox.lock() = None;
    }

    fn handle_child_failure(&self, failure: Failure) {
        let supervisor = CellSupervisor { cell: self };
        self.props
            .strategy()
            .handle_failure(&supervisor, &failure.child, &failure.reason);
    }
}

/// Supervisor view of a parent actor cell.
struct CellSupervisor<'a> {
    cell: &'a ActorCell,
}

impl Supervisor for CellSupervisor<'_> {
    fn children(&self) -> Vec<Pid> {
        self.cell.children()
    }

    fn resume(&self, child: &Pid) {
        self.cell.system.send_system(child, SystemMessage::Resume);
    }

    fn restart(&self, child: &Pid) {
        self.cell.system.send_system(child, SystemMessage::Restart);
    }

    fn restart_after(&self, child: &Pid, delay: Duration) {
        let system = self.cell.system.clone();
        let child = child.clone();
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            system.send_system(&child, SystemMessage::Restart);
        });
    }

    fn stop(&self, child: &Pid) {
        self.cell.system.send_system(child, SystemMessage::Stop);
    }

    fn escalate(&self, child: &Pid, reason: &str) {
        self.cell
            .escalate(format!("escalated failure of {child}: {reason}"));
    }

    fn record_failure(&self, child: &Pid, window: Duration) -> u32 {
        match self.cell.system.cell_of(child) {
            Some(cell) => cell.record_failure(window),
            // Child already gone; treat the budget as exhausted.
            None => u32::MAX,
        }
    }
}

/// Supervisor view of the root guardian: applies the system default
/// strategy to actors spawned without a parent.
pub(crate) struct RootSupervisor {
    pub(crate) system: ActorSystem,
}

impl Supervisor for RootSupervisor {
    fn children(&self) -> Vec<Pid> {
        Vec::new()
    }

    fn resume(&self, child: &Pid) {
        self.system.send_system(child, SystemMessage::Resume);
    }

    fn restart(&self, child: &Pid) {
        self.system.send_system(child, SystemMessage::Restart);
    }

    fn restart_after(&self, child: &Pid, delay: Duration) {
        let system = self.system.clone();
        let child = child.clone();
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            system.send_system(&child, SystemMessage::Restart);
        });
    }

    fn stop(&self, child: &Pid) {
        self.system.send_system(child, SystemMessage::Stop);
    }

    fn escalate(&self, child: &Pid, reason: &str) {
        // Top of the hierarchy: nothing left to escalate to.
        tracing::error!(%child, reason, "failure escalated past the guardian, stopping actor");
        self.system.send_system(child, SystemMessage::Stop);
    }

    fn record_failure(&self, child: &Pid, window: Duration) -> u32 {
        match self.system.cell_of(child) {
            Some(cell) => cell.record_failure(window),
            None => u32::MAX,
        }
    }
}
