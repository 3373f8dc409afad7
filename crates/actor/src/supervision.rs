//! Supervision strategies.
//!
//! When a child actor panics while processing a message, its mailbox
//! suspends and the failure is reported to the supervisor, whose strategy
//! maps the failure to a [`Directive`]. Restart decisions are gated by a
//! retry budget (`max_retries` failures within `within`); exceeding the
//! budget converts a restart into a stop.

use crate::pid::Pid;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What to do with a failing child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Keep the actor instance and continue with the next message.
    Resume,
    /// Replace the actor instance from its producer, keep the mailbox.
    Restart,
    /// Stop the child permanently.
    Stop,
    /// Pass the failure up to the supervisor's own supervisor.
    Escalate,
}

/// Maps a failure reason to a directive.
pub type Decider = Arc<dyn Fn(&str) -> Directive + Send + Sync>;

/// Default decider: always restart (subject to the retry budget).
pub fn default_decider() -> Decider {
    Arc::new(|_| Directive::Restart)
}

/// Per-actor failure history used to enforce retry budgets.
#[derive(Debug, Default)]
pub struct RestartStatistics {
    failures: Vec<Instant>,
}

impl RestartStatistics {
    /// Fresh statistics with no recorded failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure at `now` and return how many failures fall within
    /// the trailing `window` (including this one). A zero window counts
    /// every recorded failure.
    pub fn record_failure(&mut self, window: Duration) -> u32 {
        let now = Instant::now();
        self.failures.push(now);
        if window.is_zero() {
            return self.failures.len() as u32;
        }
        let cutoff = now.checked_sub(window);
        match cutoff {
            Some(cutoff) => {
                self.failures.retain(|&t| t >= cutoff);
                self.failures.len() as u32
            }
            // Clock too close to boot to subtract; everything is recent.
            None => self.failures.len() as u32,
        }
    }

    /// Total recorded failures still inside the tracking window.
    pub fn failure_count(&self) -> u32 {
        self.failures.len() as u32
    }

    /// Forget all history (after successful stabilization).
    pub fn reset(&mut self) {
        self.failures.clear();
    }
}

/// The supervisor-side operations a strategy can apply.
///
/// Implemented by the runtime for both parent actors and the root guardian;
/// strategies stay independent of how children are stored.
pub trait Supervisor {
    /// All children of this supervisor, including the failing one.
    fn children(&self) -> Vec<Pid>;

    /// Resume the child, keeping its state.
    fn resume(&self, child: &Pid);

    /// Restart the child from its producer.
    fn restart(&self, child: &Pid);

    /// Restart the child after a delay.
    fn restart_after(&self, child: &Pid, delay: Duration);

    /// Stop the child permanently.
    fn stop(&self, child: &Pid);

    /// Escalate the failure to the next supervisor up.
    fn escalate(&self, child: &Pid, reason: &str);

    /// Record a failure for `child` and return the count within `window`.
    fn record_failure(&self, child: &Pid, window: Duration) -> u32;
}

/// Policy deciding the fate of failing children.
pub trait SupervisorStrategy: Send + Sync {
    /// Handle one reported failure.
    fn handle_failure(&self, supervisor: &dyn Supervisor, child: &Pid, reason: &str);
}

/// Applies the directive to only the failing child.
pub struct OneForOneStrategy {
    max_retries: u32,
    within: Duration,
    decider: Decider,
}

impl OneForOneStrategy {
    /// Restart at most `max_retries` times within `within`, then stop.
    pub fn new(max_retries: u32, within: Duration) -> Self {
        Self {
            max_retries,
            within,
            decider: default_decider(),
        }
    }

    /// Override the failure-reason decider.
    pub fn with_decider(mut self, decider: Decider) -> Self {
        self.decider = decider;
        self
    }

    fn budget_allows(&self, supervisor: &dyn Supervisor, child: &Pid) -> bool {
        supervisor.record_failure(child, self.within) <= self.max_retries
    }
}

impl SupervisorStrategy for OneForOneStrategy {
    fn handle_failure(&self, supervisor: &dyn Supervisor, child: &Pid, reason: &str) {
        match (self.decider)(reason) {
            Directive::Resume => supervisor.resume(child),
            Directive::Restart => {
                if self.budget_allows(supervisor, child) {
                    tracing::warn!(%child, reason, "restarting failed actor");
                    supervisor.restart(child);
                } else {
                    tracing::warn!(%child, reason, "restart budget exhausted, stopping");
                    supervisor.stop(child);
                }
            }
            Directive::Stop => supervisor.stop(child),
            Directive::Escalate => supervisor.escalate(child, reason),
        }
    }
}

/// Applies restart/stop to every sibling as well as the failing child.
///
/// For sibling groups sharing invariant-critical state, restarting only the
/// failed member would leave the group inconsistent.
pub struct AllForOneStrategy {
    max_retries: u32,
    within: Duration,
    decider: Decider,
}

impl AllForOneStrategy {
    /// Restart the group at most `max_retries` times within `within`.
    pub fn new(max_retries: u32, within: Duration) -> Self {
        Self {
            max_retries,
            within,
            decider: default_decider(),
        }
    }

    /// Override the failure-reason decider.
    pub fn with_decider(mut self, decider: Decider) -> Self {
        self.decider = decider;
        self
    }
}

impl SupervisorStrategy for AllForOneStrategy {
    fn handle_failure(&self, supervisor: &dyn Supervisor, child: &Pid, reason: &str) {
        match (self.decider)(reason) {
            Directive::Resume => supervisor.resume(child),
            Directive::Restart => {
                let within_budget =
                    supervisor.record_failure(child, self.within) <= self.max_retries;
                for sibling in supervisor.children() {
                    if within_budget {
                        supervisor.restart(&sibling);
                    } else {
                        supervisor.stop(&sibling);
                    }
                }
            }
            Directive::Stop => {
                for sibling in supervisor.children() {
                    supervisor.stop(&sibling);
                }
            }
            Directive::Escalate => supervisor.escalate(child, reason),
        }
    }
}

/// Restarts with a delay growing linearly with the failure count, plus a
/// small random jitter. No retry budget: under persistent failure this
/// sheds load instead of stopping.
pub struct ExponentialBackoffStrategy {
    initial_backoff: Duration,
}

impl ExponentialBackoffStrategy {
    /// Backoff after the n-th failure is `initial_backoff * n + jitter`.
    pub fn new(initial_backoff: Duration) -> Self {
        Self { initial_backoff }
    }
}

impl SupervisorStrategy for ExponentialBackoffStrategy {
    fn handle_failure(&self, supervisor: &dyn Supervisor, child: &Pid, reason: &str) {
        // Zero window: count every failure ever recorded.
        let count = supervisor.record_failure(child, Duration::ZERO);
        let jitter = rand::thread_rng().gen_range(0..=self.initial_backoff.as_millis() as u64 / 2);
        let delay = self.initial_backoff * count + Duration::from_millis(jitter);
        tracing::warn!(%child, reason, failures = count, ?delay, "backing off before restart");
        supervisor.restart_after(child, delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc as StdArc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Applied {
        Resume,
        Restart,
        RestartAfter,
        Stop,
        Escalate,
    }

    struct RecordingSupervisor {
        children: Vec<Pid>,
        stats: Mutex<RestartStatistics>,
        applied: Mutex<Vec<(Pid, Applied)>>,
    }

    impl RecordingSupervisor {
        fn new(children: Vec<Pid>) -> Self {
            Self {
                children,
                stats: Mutex::new(RestartStatistics::new()),
                applied: Mutex::new(Vec::new()),
            }
        }

        fn applied(&self) -> Vec<(Pid, Applied)> {
            self.applied.lock().clone()
        }
    }

    impl Supervisor for RecordingSupervisor {
        fn children(&self) -> Vec<Pid> {
            self.children.clone()
        }
        fn resume(&self, child: &Pid) {
            self.applied.lock().push((child.clone(), Applied::Resume));
        }
        fn restart(&self, child: &Pid) {
            self.applied.lock().push((child.clone(), Applied::Restart));
        }
        fn restart_after(&self, child: &Pid, _delay: Duration) {
            self.applied
                .lock()
                .push((child.clone(), Applied::RestartAfter));
        }
        fn stop(&self, child: &Pid) {
            self.applied.lock().push((child.clone(), Applied::Stop));
        }
        fn escalate(&self, child: &Pid, _reason: &str) {
            self.applied.lock().push((child.clone(), Applied::Escalate));
        }
        fn record_failure(&self, _child: &Pid, window: Duration) -> u32 {
            self.stats.lock().record_failure(window)
        }
    }

    fn pid(id: u64) -> Pid {
        Pid::new(StdArc::from("test"), id)
    }

    #[test]
    fn test_one_for_one_budget() {
        let sup = RecordingSupervisor::new(vec![pid(1)]);
        let strategy = OneForOneStrategy::new(2, Duration::from_secs(10));
        let child = pid(1);

        strategy.handle_failure(&sup, &child, "boom");
        strategy.handle_failure(&sup, &child, "boom");
        strategy.handle_failure(&sup, &child, "boom");

        assert_eq!(
            sup.applied(),
            vec![
                (child.clone(), Applied::Restart),
                (child.clone(), Applied::Restart),
                (child.clone(), Applied::Stop),
            ]
        );
    }

    #[test]
    fn test_one_for_one_zero_budget_stops_immediately() {
        let sup = RecordingSupervisor::new(vec![pid(1)]);
        let strategy = OneForOneStrategy::new(0, Duration::from_secs(10));
        let child = pid(1);

        strategy.handle_failure(&sup, &child, "boom");
        assert_eq!(sup.applied(), vec![(child, Applied::Stop)]);
    }

    #[test]
    fn test_one_for_one_custom_decider() {
        let sup = RecordingSupervisor::new(vec![pid(1)]);
        let strategy = OneForOneStrategy::new(5, Duration::from_secs(10)).with_decider(Arc::new(
            |reason| {
                if reason.contains("fatal") {
                    Directive::Stop
                } else {
                    Directive::Resume
                }
            },
        ));
        let child = pid(1);

        strategy.handle_failure(&sup, &child, "minor glitch");
        strategy.handle_failure(&sup, &child, "fatal corruption");
        assert_eq!(
            sup.applied(),
            vec![
                (child.clone(), Applied::Resume),
                (child, Applied::Stop)
            ]
        );
    }

    #[test]
    fn test_all_for_one_restarts_siblings() {
        let sup = RecordingSupervisor::new(vec![pid(1), pid(2), pid(3)]);
        let strategy = AllForOneStrategy::new(2, Duration::from_secs(10));

        strategy.handle_failure(&sup, &pid(2), "boom");
        assert_eq!(
            sup.applied(),
            vec![
                (pid(1), Applied::Restart),
                (pid(2), Applied::Restart),
                (pid(3), Applied::Restart),
            ]
        );
    }

    #[test]
    fn test_all_for_one_budget_stops_siblings() {
        let sup = RecordingSupervisor::new(vec![pid(1), pid(2)]);
        let strategy = AllForOneStrategy::new(0, Duration::from_secs(10));

        strategy.handle_failure(&sup, &pid(1), "boom");
        assert_eq!(
            sup.applied(),
            vec![(pid(1), Applied::Stop), (pid(2), Applied::Stop)]
        );
    }

    #[test]
    fn test_backoff_always_restarts() {
        let sup = RecordingSupervisor::new(vec![pid(1)]);
        let strategy = ExponentialBackoffStrategy::new(Duration::from_millis(100));
        for _ in 0..5 {
            strategy.handle_failure(&sup, &pid(1), "boom");
        }
        assert_eq!(
            sup.applied(),
            vec![(pid(1), Applied::RestartAfter); 5]
        );
    }

    #[test]
    fn test_statistics_window_expiry() {
        let mut stats = RestartStatistics::new();
        assert_eq!(stats.record_failure(Duration::from_secs(60)), 1);
        assert_eq!(stats.record_failure(Duration::from_secs(60)), 2);
        stats.reset();
        assert_eq!(stats.failure_count(), 0);
        assert_eq!(stats.record_failure(Duration::from_secs(60)), 1);
    }
}
