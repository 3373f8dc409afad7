//! Mailbox task dispatchers.
//!
//! A dispatcher runs mailbox-processing tasks. Two implementations:
//!
//! - [`PooledDispatcher`] schedules on a shared rayon thread pool; different
//!   actors' mailboxes run in parallel across the pool (production).
//! - [`SyncDispatcher`] runs tasks inline on the posting thread, giving
//!   deterministic single-threaded execution for tests and simulation.

use crate::ActorError;
use std::sync::Arc;

/// Default number of user messages a mailbox processes per scheduling turn.
pub const DEFAULT_THROUGHPUT: usize = 300;

/// Schedules mailbox-processing tasks.
pub trait Dispatcher: Send + Sync {
    /// Run `task`, now or later. Tasks for one mailbox are never submitted
    /// concurrently — the mailbox's scheduler state guarantees that — so
    /// implementations need no per-actor ordering of their own.
    fn schedule(&self, task: Box<dyn FnOnce() + Send>);

    /// Default user-message batch size for mailboxes on this dispatcher.
    fn throughput(&self) -> usize {
        DEFAULT_THROUGHPUT
    }
}

/// Rayon-backed dispatcher for production use.
pub struct PooledDispatcher {
    pool: rayon::ThreadPool,
}

impl PooledDispatcher {
    /// Build a dispatcher with `threads` workers (`None` = one per core,
    /// as decided by rayon).
    pub fn new(threads: Option<usize>) -> Result<Self, ActorError> {
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("actor-{i}"));
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| ActorError::DispatcherBuild(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Build with a shareable handle.
    pub fn shared(threads: Option<usize>) -> Result<Arc<dyn Dispatcher>, ActorError> {
        Ok(Arc::new(Self::new(threads)?))
    }
}

impl Dispatcher for PooledDispatcher {
    fn schedule(&self, task: Box<dyn FnOnce() + Send>) {
        self.pool.spawn(task);
    }
}

/// Inline dispatcher: runs every task on the posting thread.
///
/// With this dispatcher a `tell` returns only after the recipient has
/// drained its mailbox, which makes interleavings deterministic.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncDispatcher;

impl SyncDispatcher {
    /// Shareable handle.
    pub fn shared() -> Arc<dyn Dispatcher> {
        Arc::new(Self)
    }
}

impl Dispatcher for SyncDispatcher {
    fn schedule(&self, task: Box<dyn FnOnce() + Send>) {
        task();
    }

    fn throughput(&self) -> usize {
        // Inline execution drains eagerly; batching adds nothing.
        usize::MAX
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_pooled_runs_tasks() {
        let dispatcher = PooledDispatcher::new(Some(2)).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..16 {
            let counter = counter.clone();
            dispatcher.schedule(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while counter.load(Ordering::SeqCst) < 16 {
            assert!(std::time::Instant::now() < deadline, "tasks did not finish");
            std::thread::yield_now();
        }
    }

    #[test]
    fn test_sync_runs_inline() {
        let counter = AtomicUsize::new(0);
        SyncDispatcher.schedule(Box::new(|| {
            // runs before schedule returns
        }));
        SyncDispatcher.schedule(Box::new(move || {}));
        counter.fetch_add(1, Ordering::SeqCst);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
