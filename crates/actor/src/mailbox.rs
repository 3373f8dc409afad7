//! Per-actor mailbox.
//!
//! Two queues per actor: system messages (lifecycle, supervision) drain
//! with strict priority over user messages. A single atomic scheduler
//! status guarantees at most one processing task per mailbox is ever in
//! flight, preserving single-threaded semantics per actor even though the
//! dispatcher pool is multi-threaded.
//!
//! The idle transition re-checks both queues and re-schedules if anything
//! arrived concurrently — without that double-check, a message posted while
//! the mailbox goes idle would strand until the next post.

use crate::cell::ActorCell;
use crate::dispatcher::Dispatcher;
use crate::message::{Envelope, SystemMessage};
use crossbeam_queue::SegQueue;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

const IDLE: u8 = 0;
const RUNNING: u8 = 1;

pub(crate) struct Mailbox {
    user: SegQueue<Envelope>,
    system: SegQueue<SystemMessage>,
    status: AtomicU8,
    suspended: AtomicBool,
    dispatcher: Arc<dyn Dispatcher>,
    throughput: usize,
    cell: Arc<ActorCell>,
}

impl Mailbox {
    pub(crate) fn new(
        dispatcher: Arc<dyn Dispatcher>,
        throughput: usize,
        cell: Arc<ActorCell>,
    ) -> Self {
        Self {
            user: SegQueue::new(),
            system: SegQueue::new(),
            status: AtomicU8::new(IDLE),
            suspended: AtomicBool::new(false),
            dispatcher,
            throughput,
            cell,
        }
    }

    pub(crate) fn post_user(self: &Arc<Self>, envelope: Envelope) {
        self.user.push(envelope);
        self.schedule();
    }

    pub(crate) fn post_system(self: &Arc<Self>, message: SystemMessage) {
        self.system.push(message);
        self.schedule();
    }

    /// Stop invoking user messages until [`resume`](Self::resume). System
    /// messages keep flowing; this is how a failed actor waits for its
    /// supervisor's directive.
    pub(crate) fn suspend(&self) {
        self.suspended.store(true, Ordering::SeqCst);
    }

    pub(crate) fn resume(self: &Arc<Self>) {
        self.suspended.store(false, Ordering::SeqCst);
        self.schedule();
    }

    /// Schedule a processing task iff the mailbox is idle. The CAS is the
    /// only place a task is created, so one mailbox never has two tasks.
    fn schedule(self: &Arc<Self>) {
        if self
            .status
            .compare_exchange(IDLE, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let mailbox = Arc::clone(self);
            self.dispatcher
                .schedule(Box::new(move || mailbox.process_messages()));
        }
    }

    fn process_messages(self: &Arc<Self>) {
        loop {
            // All pending system messages first.
            while let Some(message) = self.system.pop() {
                self.cell.invoke_system(message);
            }

            if !self.suspended.load(Ordering::SeqCst) {
                let mut processed = 0;
                while processed < self.throughput {
                    // A system message arriving mid-batch preempts the rest
                    // of the batch.
                    if !self.system.is_empty() || self.suspended.load(Ordering::SeqCst) {
                        break;
                    }
                    match self.user.pop() {
                        Some(envelope) => {
                            self.cell.invoke_user(envelope);
                            processed += 1;
                        }
                        None => break,
                    }
                }
            }

            self.status.store(IDLE, Ordering::SeqCst);

            // Re-check after going idle: a concurrent post may have seen
            // RUNNING and skipped scheduling.
            let has_more = !self.system.is_empty()
                || (!self.suspended.load(Ordering::SeqCst) && !self.user.is_empty());
            if has_more
                && self
                    .status
                    .compare_exchange(IDLE, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
            {
                continue;
            }
            break;
        }
    }
}
