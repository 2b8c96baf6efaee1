//! # Commit Scheduler
//!
//! Debounce windows, apply-queue retries and the clock they run on.
//!
//! Time is explicit: the form only moves forward when the host calls
//! `advance`. That keeps every ordering decision deterministic, and lets
//! the async driver map real time onto the same clock.
//!
//! Every field carries a generation that bumps on each local edit. A timer
//! remembers the generation it was armed for; when it comes due with a
//! stale generation it is dropped, which is how a fresher edit supersedes
//! both a waiting debounce and a waiting apply retry.
//!
//! ```text
//! edit ──► generation + 1 ──► arm(window) ──► due ──► flush
//!                                              │ busy
//!                                              └──► retry(attempt + 1)
//! ```

use crate::config::FormConfig;
use formloom_descriptor::NodeId;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Debounce,
    ApplyRetry { attempt: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueTimer {
    pub node: NodeId,
    pub generation: u64,
    pub kind: TimerKind,
    pub deadline: Duration,
}

/// Fields whose last commit has not finished applying
#[derive(Debug, Default)]
pub struct ApplyQueue {
    in_flight: HashSet<NodeId>,
}

impl ApplyQueue {
    pub fn is_in_flight(&self, node: NodeId) -> bool {
        self.in_flight.contains(&node)
    }

    pub fn begin(&mut self, node: NodeId) {
        self.in_flight.insert(node);
    }

    pub fn finish(&mut self, node: NodeId) {
        self.in_flight.remove(&node);
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}

#[derive(Debug)]
pub struct CommitScheduler {
    now: Duration,
    seq: u64,
    timers: BTreeMap<(Duration, u64), DueTimer>,
    armed: HashMap<NodeId, (Duration, u64)>,
    generations: HashMap<NodeId, u64>,
    apply: ApplyQueue,
    retry_delay: Duration,
    max_attempts: u32,
}

impl CommitScheduler {
    pub fn new(config: &FormConfig) -> Self {
        Self {
            now: Duration::ZERO,
            seq: 0,
            timers: BTreeMap::new(),
            armed: HashMap::new(),
            generations: HashMap::new(),
            apply: ApplyQueue::default(),
            retry_delay: config.apply_retry_delay(),
            max_attempts: config.apply_max_attempts,
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn generation(&self, node: NodeId) -> u64 {
        self.generations.get(&node).copied().unwrap_or(0)
    }

    /// Register a local edit: bumps the generation and cancels any timer
    pub fn edit(&mut self, node: NodeId) -> u64 {
        self.cancel(node);
        let generation = self.generations.entry(node).or_insert(0);
        *generation += 1;
        *generation
    }

    /// (Re)arm the debounce timer
    pub fn arm(&mut self, node: NodeId, window: Duration) -> Duration {
        let deadline = self.now + window;
        self.insert(node, TimerKind::Debounce, deadline);
        deadline
    }

    /// Schedule another apply attempt; false once the ceiling is reached
    pub fn retry(&mut self, node: NodeId, attempt: u32) -> bool {
        if attempt > self.max_attempts {
            return false;
        }
        let deadline = self.now + self.retry_delay;
        debug!(node = %node, attempt, "Apply busy, retrying");
        self.insert(node, TimerKind::ApplyRetry { attempt }, deadline);
        true
    }

    fn insert(&mut self, node: NodeId, kind: TimerKind, deadline: Duration) {
        self.cancel(node);
        self.seq += 1;
        let key = (deadline, self.seq);
        self.timers.insert(
            key,
            DueTimer {
                node,
                generation: self.generation(node),
                kind,
                deadline,
            },
        );
        self.armed.insert(node, key);
    }

    pub fn cancel(&mut self, node: NodeId) {
        if let Some(key) = self.armed.remove(&node) {
            self.timers.remove(&key);
        }
    }

    pub fn armed(&self, node: NodeId) -> Option<TimerKind> {
        self.armed
            .get(&node)
            .and_then(|key| self.timers.get(key))
            .map(|timer| timer.kind)
    }

    pub fn is_waiting_retry(&self, node: NodeId) -> bool {
        matches!(self.armed(node), Some(TimerKind::ApplyRetry { .. }))
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Pop the earliest timer due at or before `until`, moving the clock
    /// to its deadline. Stale generations are dropped here.
    pub fn pop_due(&mut self, until: Duration) -> Option<DueTimer> {
        loop {
            let (&key, _) = self.timers.iter().next()?;
            if key.0 > until {
                return None;
            }
            let timer = self.timers.remove(&key)?;
            if self.armed.get(&timer.node) == Some(&key) {
                self.armed.remove(&timer.node);
            }
            self.now = self.now.max(timer.deadline);

            if timer.generation != self.generation(timer.node) {
                debug!(node = %timer.node, "Dropping superseded timer");
                continue;
            }
            return Some(timer);
        }
    }

    /// Move the clock forward; never backwards
    pub fn set_now(&mut self, at: Duration) {
        self.now = self.now.max(at);
    }

    pub fn apply(&self) -> &ApplyQueue {
        &self.apply
    }

    pub fn apply_mut(&mut self) -> &mut ApplyQueue {
        &mut self.apply
    }

    pub fn clear(&mut self) {
        self.timers.clear();
        self.armed.clear();
        self.apply = ApplyQueue::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formloom_descriptor::{compile, FieldDescriptor};

    fn nodes() -> (NodeId, NodeId) {
        let form = compile(&[FieldDescriptor::text("a"), FieldDescriptor::text("b")]).unwrap();
        (form.leaves()[0], form.leaves()[1])
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_rearm_replaces_timer() {
        let (a, _) = nodes();
        let mut scheduler = CommitScheduler::new(&FormConfig::default());

        scheduler.edit(a);
        scheduler.arm(a, ms(300));
        scheduler.set_now(ms(100));
        scheduler.edit(a);
        scheduler.arm(a, ms(300));

        assert_eq!(scheduler.next_deadline(), Some(ms(400)));
        assert_eq!(scheduler.pop_due(ms(399)), None);

        let due = scheduler.pop_due(ms(400)).unwrap();
        assert_eq!(due.node, a);
        assert_eq!(due.kind, TimerKind::Debounce);
        assert_eq!(scheduler.now(), ms(400));
        assert_eq!(scheduler.next_deadline(), None);
    }

    #[test]
    fn test_timers_fire_in_deadline_order() {
        let (a, b) = nodes();
        let mut scheduler = CommitScheduler::new(&FormConfig::default());
        scheduler.edit(a);
        scheduler.arm(a, ms(50));
        scheduler.edit(b);
        scheduler.arm(b, ms(20));

        assert_eq!(scheduler.pop_due(ms(100)).map(|t| t.node), Some(b));
        assert_eq!(scheduler.pop_due(ms(100)).map(|t| t.node), Some(a));
    }

    #[test]
    fn test_fresher_edit_supersedes_retry() {
        let (a, _) = nodes();
        let mut scheduler = CommitScheduler::new(&FormConfig::default());
        scheduler.edit(a);
        assert!(scheduler.retry(a, 1));
        assert!(scheduler.is_waiting_retry(a));

        // A new edit cancels the waiting retry outright
        scheduler.edit(a);
        assert!(!scheduler.is_waiting_retry(a));
        assert_eq!(scheduler.pop_due(ms(1000)), None);
    }

    #[test]
    fn test_retry_ceiling() {
        let (a, _) = nodes();
        let config = FormConfig {
            apply_max_attempts: 2,
            ..FormConfig::default()
        };
        let mut scheduler = CommitScheduler::new(&config);
        assert!(scheduler.retry(a, 1));
        assert!(scheduler.retry(a, 2));
        assert!(!scheduler.retry(a, 3));
    }

    #[test]
    fn test_clock_never_moves_back() {
        let mut scheduler = CommitScheduler::new(&FormConfig::default());
        scheduler.set_now(ms(10));
        scheduler.set_now(ms(5));
        assert_eq!(scheduler.now(), ms(10));
    }
}
