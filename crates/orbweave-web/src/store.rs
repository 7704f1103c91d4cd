//! Signal and thread stores
//!
//! Keyed stores with secondary indices maintained incrementally on every
//! write — queries never rescan the whole map. Reads hand out snapshots
//! (clones), never live references, so callers cannot corrupt store state
//! by mutating what they got back.

use chrono::Utc;
use dashmap::DashMap;
use orbweave_core::{
    Error, ExecutionPlan, Priority, Result, Signal, Thread, ThreadId, ThreadStatus,
};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use tracing::debug;

/// Bounded signal history. Oldest signals are evicted once the window fills.
pub struct SignalStore {
    signals: DashMap<String, Signal>,
    /// Insertion order, for window eviction.
    order: Mutex<VecDeque<String>>,
    window: usize,
}

impl SignalStore {
    pub fn new(window: usize) -> Self {
        Self {
            signals: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            window: window.max(1),
        }
    }

    pub fn insert(&self, signal: Signal) {
        let mut order = self.order.lock().expect("signal order lock");
        order.push_back(signal.id.clone());
        self.signals.insert(signal.id.clone(), signal);
        while order.len() > self.window {
            if let Some(evicted) = order.pop_front() {
                self.signals.remove(&evicted);
                debug!("signal history window full, evicted {}", evicted);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Signal> {
        self.signals.get(id).map(|s| s.clone())
    }

    /// Mark a signal processed and link the thread it became. A processed
    /// signal always carries its thread id.
    pub fn mark_processed(&self, id: &str, thread_id: ThreadId) {
        if let Some(mut signal) = self.signals.get_mut(id) {
            signal.processed = true;
            signal.thread_id = Some(thread_id);
        }
    }

    /// Snapshot of signals not yet converted or bounced, oldest first.
    pub fn unprocessed(&self) -> Vec<Signal> {
        let order = self.order.lock().expect("signal order lock");
        order
            .iter()
            .filter_map(|id| self.signals.get(id))
            .filter(|s| !s.processed)
            .map(|s| s.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Most recent signals, newest first, up to `n`.
    pub fn sample(&self, n: usize) -> Vec<Signal> {
        let order = self.order.lock().expect("signal order lock");
        order
            .iter()
            .rev()
            .take(n)
            .filter_map(|id| self.signals.get(id))
            .map(|s| s.clone())
            .collect()
    }
}

/// Threads keyed by id, with by-status and by-priority indices.
pub struct ThreadStore {
    threads: DashMap<ThreadId, Thread>,
    by_status: DashMap<ThreadStatus, HashSet<ThreadId>>,
    by_priority: DashMap<Priority, HashSet<ThreadId>>,
}

impl Default for ThreadStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadStore {
    pub fn new() -> Self {
        let by_status = DashMap::new();
        for status in ThreadStatus::ALL {
            by_status.insert(status, HashSet::new());
        }
        let by_priority = DashMap::new();
        for priority in Priority::ALL {
            by_priority.insert(priority, HashSet::new());
        }
        Self {
            threads: DashMap::new(),
            by_status,
            by_priority,
        }
    }

    pub fn insert(&self, thread: Thread) {
        self.index_status(thread.status, &thread.id);
        self.index_priority(thread.priority, &thread.id);
        self.threads.insert(thread.id.clone(), thread);
    }

    pub fn get(&self, id: &ThreadId) -> Option<Thread> {
        self.threads.get(id).map(|t| t.clone())
    }

    /// Advance a thread's status. Transitions are one-directional; anything
    /// backward (or out of a terminal state) is a typed error and leaves the
    /// store untouched.
    pub fn advance_status(&self, id: &ThreadId, next: ThreadStatus) -> Result<Thread> {
        let mut entry = self
            .threads
            .get_mut(id)
            .ok_or_else(|| Error::ThreadNotFound(id.clone()))?;
        let prev = entry.status;
        if !prev.can_advance_to(next) {
            return Err(Error::InvalidTransition {
                from: prev,
                to: next,
            });
        }
        entry.status = next;
        entry.updated_at = Utc::now();
        let snapshot = entry.clone();
        drop(entry);

        self.unindex_status(prev, id);
        self.index_status(next, id);
        Ok(snapshot)
    }

    /// Attach an owned plan, mark the thread executable, and override its
    /// priority (template priority wins over the classifier's assignment).
    pub fn attach_plan(
        &self,
        id: &ThreadId,
        plan: ExecutionPlan,
        template_id: String,
        priority: Priority,
    ) -> Result<Thread> {
        let mut entry = self
            .threads
            .get_mut(id)
            .ok_or_else(|| Error::ThreadNotFound(id.clone()))?;
        let prev_priority = entry.priority;
        entry.plan = Some(plan);
        entry.template_id = Some(template_id);
        entry.executable = true;
        entry.priority = priority;
        entry.updated_at = Utc::now();
        let snapshot = entry.clone();
        drop(entry);

        if prev_priority != priority {
            self.unindex_priority(prev_priority, id);
            self.index_priority(priority, id);
        }
        Ok(snapshot)
    }

    pub fn by_status(&self, status: ThreadStatus) -> Vec<Thread> {
        self.ids_to_threads(self.by_status.get(&status).map(|s| s.clone()))
    }

    pub fn by_priority(&self, priority: Priority) -> Vec<Thread> {
        self.ids_to_threads(self.by_priority.get(&priority).map(|s| s.clone()))
    }

    pub fn count_by_status(&self, status: ThreadStatus) -> usize {
        self.by_status.get(&status).map(|s| s.len()).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Up to `n` thread snapshots, most recently updated first.
    pub fn sample(&self, n: usize) -> Vec<Thread> {
        let mut threads: Vec<Thread> = self.threads.iter().map(|t| t.clone()).collect();
        threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        threads.truncate(n);
        threads
    }

    fn ids_to_threads(&self, ids: Option<HashSet<ThreadId>>) -> Vec<Thread> {
        ids.map(|ids| {
            ids.iter()
                .filter_map(|id| self.threads.get(id))
                .map(|t| t.clone())
                .collect()
        })
        .unwrap_or_default()
    }

    fn index_status(&self, status: ThreadStatus, id: &ThreadId) {
        self.by_status
            .entry(status)
            .or_default()
            .insert(id.clone());
    }

    fn unindex_status(&self, status: ThreadStatus, id: &ThreadId) {
        if let Some(mut set) = self.by_status.get_mut(&status) {
            set.remove(id);
        }
    }

    fn index_priority(&self, priority: Priority, id: &ThreadId) {
        self.by_priority
            .entry(priority)
            .or_default()
            .insert(id.clone());
    }

    fn unindex_priority(&self, priority: Priority, id: &ThreadId) {
        if let Some(mut set) = self.by_priority.get_mut(&priority) {
            set.remove(id);
        }
    }
}
