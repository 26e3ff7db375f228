//! Resource Ledger: registries of everything evaluated code leaves running.
//!
//! Each scheduling primitive registers its id here when created and
//! deregisters on natural completion. Removal is idempotent, so a callback
//! finishing while a sweep drains the same registry is harmless.
//!
//! The ledger only stores what it is given: the evaluator keeps pinned
//! engine values in it, tests keep plain strings.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::process::Child;
use tracing::{debug, warn};

/// Kinds of tracked resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Timeout,
    Interval,
    AnimationFrame,
    IdleCallback,
    Immediate,
    Promise,
    Subprocess,
    Listener,
}

/// A callback waiting on the event loop.
#[derive(Debug, Clone)]
pub struct Task<V> {
    pub callback: V,
    pub args: Vec<V>,
    /// Repeat period for intervals.
    pub period_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Listener<V> {
    pub event: String,
    pub callback: V,
}

/// A callback run by the sweep, or `target._jslabCleanup()` when absent.
#[derive(Debug, Clone)]
pub struct Cleanup<V> {
    pub target: V,
    pub callback: Option<V>,
}

/// Registry sizes, reported to the host after every change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub timeouts: usize,
    pub intervals: usize,
    pub immediates: usize,
    pub animation_frames: usize,
    pub idle_callbacks: usize,
    pub promises: usize,
    pub subprocesses: usize,
    pub listeners: usize,
    pub required_modules: usize,
}

impl LedgerStats {
    /// Timers of every flavour.
    pub fn pending_timers(&self) -> usize {
        self.timeouts + self.intervals + self.immediates + self.animation_frames + self.idle_callbacks
    }

    pub fn is_idle(&self) -> bool {
        self.pending_timers() == 0 && self.promises == 0 && self.subprocesses == 0
    }
}

pub struct ResourceLedger<V> {
    next_id: u64,
    timeouts: IndexMap<u64, Task<V>>,
    intervals: IndexMap<u64, Task<V>>,
    immediates: IndexMap<u64, Task<V>>,
    animation_frames: IndexMap<u64, Task<V>>,
    idle_callbacks: IndexMap<u64, Task<V>>,
    promises: IndexMap<u64, V>,
    subprocesses: IndexMap<u32, Child>,
    listeners: IndexMap<u64, Listener<V>>,
    cleanups: Vec<Cleanup<V>>,
    changed: bool,
}

impl<V> Default for ResourceLedger<V> {
    fn default() -> Self {
        Self {
            next_id: 0,
            timeouts: IndexMap::new(),
            intervals: IndexMap::new(),
            immediates: IndexMap::new(),
            animation_frames: IndexMap::new(),
            idle_callbacks: IndexMap::new(),
            promises: IndexMap::new(),
            subprocesses: IndexMap::new(),
            listeners: IndexMap::new(),
            cleanups: Vec::new(),
            changed: false,
        }
    }
}

impl<V: Clone + PartialEq> ResourceLedger<V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn tasks(&self, kind: ResourceKind) -> Option<&IndexMap<u64, Task<V>>> {
        match kind {
            ResourceKind::Timeout => Some(&self.timeouts),
            ResourceKind::Interval => Some(&self.intervals),
            ResourceKind::Immediate => Some(&self.immediates),
            ResourceKind::AnimationFrame => Some(&self.animation_frames),
            ResourceKind::IdleCallback => Some(&self.idle_callbacks),
            _ => None,
        }
    }

    fn tasks_mut(&mut self, kind: ResourceKind) -> Option<&mut IndexMap<u64, Task<V>>> {
        match kind {
            ResourceKind::Timeout => Some(&mut self.timeouts),
            ResourceKind::Interval => Some(&mut self.intervals),
            ResourceKind::Immediate => Some(&mut self.immediates),
            ResourceKind::AnimationFrame => Some(&mut self.animation_frames),
            ResourceKind::IdleCallback => Some(&mut self.idle_callbacks),
            _ => None,
        }
    }

    // ── Scheduled callbacks ─────────────────────────────────────────────

    /// Register a scheduled callback and return its id.
    pub fn register_task(&mut self, kind: ResourceKind, task: Task<V>) -> u64 {
        let id = self.next_id();
        if let Some(tasks) = self.tasks_mut(kind) {
            tasks.insert(id, task);
            self.changed = true;
        }
        id
    }

    pub fn contains(&self, kind: ResourceKind, id: u64) -> bool {
        match kind {
            ResourceKind::Promise => self.promises.contains_key(&id),
            ResourceKind::Listener => self.listeners.contains_key(&id),
            ResourceKind::Subprocess => u32::try_from(id)
                .map(|pid| self.subprocesses.contains_key(&pid))
                .unwrap_or(false),
            _ => self.tasks(kind).is_some_and(|t| t.contains_key(&id)),
        }
    }

    /// Copy of a registered task; the registration stays.
    pub fn task(&self, kind: ResourceKind, id: u64) -> Option<Task<V>> {
        self.tasks(kind).and_then(|t| t.get(&id).cloned())
    }

    /// Remove a registration. Returns `false` when it was already gone.
    pub fn deregister(&mut self, kind: ResourceKind, id: u64) -> bool {
        let removed = match kind {
            ResourceKind::Promise => self.promises.shift_remove(&id).is_some(),
            ResourceKind::Listener => self.listeners.shift_remove(&id).is_some(),
            ResourceKind::Subprocess => u32::try_from(id)
                .ok()
                .and_then(|pid| self.subprocesses.shift_remove(&pid))
                .is_some(),
            _ => self
                .tasks_mut(kind)
                .is_some_and(|t| t.shift_remove(&id).is_some()),
        };
        if removed {
            self.changed = true;
        }
        removed
    }

    /// Take the whole registry of one task kind.
    pub fn drain_tasks(&mut self, kind: ResourceKind) -> Vec<(u64, Task<V>)> {
        let drained: Vec<_> = self
            .tasks_mut(kind)
            .map(|t| std::mem::take(t).into_iter().collect())
            .unwrap_or_default();
        if !drained.is_empty() {
            self.changed = true;
        }
        drained
    }

    /// The oldest registration of a task kind.
    pub fn first_task(&self, kind: ResourceKind) -> Option<u64> {
        self.tasks(kind).and_then(|t| t.keys().next().copied())
    }

    // ── Promises ────────────────────────────────────────────────────────

    pub fn register_promise(&mut self, promise: V) -> u64 {
        let id = self.next_id();
        self.promises.insert(id, promise);
        self.changed = true;
        id
    }

    pub fn drain_promises(&mut self) -> Vec<V> {
        let drained: Vec<_> = std::mem::take(&mut self.promises).into_values().collect();
        if !drained.is_empty() {
            self.changed = true;
        }
        drained
    }

    // ── Subprocesses ────────────────────────────────────────────────────

    pub fn register_subprocess(&mut self, child: Child) -> u32 {
        let pid = child.id();
        debug!(pid, "tracking subprocess");
        self.subprocesses.insert(pid, child);
        self.changed = true;
        pid
    }

    /// Kill and forget a tracked process. Unknown pids are ignored.
    pub fn kill_subprocess(&mut self, pid: u32) -> bool {
        match self.subprocesses.shift_remove(&pid) {
            Some(child) => {
                terminate(pid, child);
                self.changed = true;
                true
            }
            None => false,
        }
    }

    /// Forget processes that exited on their own.
    pub fn reap_subprocesses(&mut self) {
        let before = self.subprocesses.len();
        self.subprocesses
            .retain(|_, child| !matches!(child.try_wait(), Ok(Some(_))));
        if self.subprocesses.len() != before {
            self.changed = true;
        }
    }

    /// Kill every tracked process. Returns how many there were.
    pub fn terminate_subprocesses(&mut self) -> usize {
        let drained: Vec<_> = std::mem::take(&mut self.subprocesses).into_iter().collect();
        if !drained.is_empty() {
            self.changed = true;
        }
        let count = drained.len();
        for (pid, child) in drained {
            terminate(pid, child);
        }
        count
    }

    // ── Listeners ───────────────────────────────────────────────────────

    pub fn add_listener(&mut self, event: &str, callback: V) -> u64 {
        let id = self.next_id();
        self.listeners.insert(
            id,
            Listener {
                event: event.to_string(),
                callback,
            },
        );
        self.changed = true;
        id
    }

    /// Remove the first listener registered with this exact callback.
    pub fn remove_listener(&mut self, event: &str, callback: &V) -> bool {
        let found = self
            .listeners
            .iter()
            .find(|(_, l)| l.event == event && l.callback == *callback)
            .map(|(id, _)| *id);
        match found {
            Some(id) => self.deregister(ResourceKind::Listener, id),
            None => false,
        }
    }

    pub fn listeners_for(&self, event: &str) -> Vec<V> {
        self.listeners
            .values()
            .filter(|l| l.event == event)
            .map(|l| l.callback.clone())
            .collect()
    }

    pub fn drain_listeners(&mut self) -> Vec<Listener<V>> {
        let drained: Vec<_> = std::mem::take(&mut self.listeners).into_values().collect();
        if !drained.is_empty() {
            self.changed = true;
        }
        drained
    }

    // ── Cleanup callbacks ───────────────────────────────────────────────

    pub fn add_cleanup(&mut self, target: V, callback: Option<V>) {
        self.cleanups.push(Cleanup { target, callback });
    }

    pub fn drain_cleanups(&mut self) -> Vec<Cleanup<V>> {
        std::mem::take(&mut self.cleanups)
    }

    // ── Reporting ───────────────────────────────────────────────────────

    pub fn stats(&self, required_modules: usize) -> LedgerStats {
        LedgerStats {
            timeouts: self.timeouts.len(),
            intervals: self.intervals.len(),
            immediates: self.immediates.len(),
            animation_frames: self.animation_frames.len(),
            idle_callbacks: self.idle_callbacks.len(),
            promises: self.promises.len(),
            subprocesses: self.subprocesses.len(),
            listeners: self.listeners.len(),
            required_modules,
        }
    }

    /// Flag a change the registries do not see (module loads).
    pub fn mark_changed(&mut self) {
        self.changed = true;
    }

    /// Whether any registry changed since the last call.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }
}

impl<V> Drop for ResourceLedger<V> {
    fn drop(&mut self) {
        for (pid, child) in std::mem::take(&mut self.subprocesses) {
            terminate(pid, child);
        }
    }
}

fn terminate(pid: u32, mut child: Child) {
    if let Err(e) = child.kill() {
        // Already exited.
        debug!(pid, error = %e, "kill failed");
    }
    if let Err(e) = child.wait() {
        warn!(pid, error = %e, "could not reap subprocess");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task<&'static str> {
        Task {
            callback: "tick",
            args: Vec::new(),
            period_ms: None,
        }
    }

    #[test]
    fn test_register_and_deregister_is_idempotent() {
        let mut ledger: ResourceLedger<&str> = ResourceLedger::new();
        let id = ledger.register_task(ResourceKind::Timeout, task());
        assert!(ledger.contains(ResourceKind::Timeout, id));
        assert!(ledger.deregister(ResourceKind::Timeout, id));
        assert!(!ledger.deregister(ResourceKind::Timeout, id));
        assert_eq!(ledger.stats(0).timeouts, 0);
    }

    #[test]
    fn test_ids_are_unique_across_kinds() {
        let mut ledger: ResourceLedger<&str> = ResourceLedger::new();
        let a = ledger.register_task(ResourceKind::Timeout, task());
        let b = ledger.register_task(ResourceKind::Interval, task());
        assert_ne!(a, b);
        assert!(!ledger.contains(ResourceKind::Timeout, b));
    }

    #[test]
    fn test_drain_empties_registry() {
        let mut ledger: ResourceLedger<&str> = ResourceLedger::new();
        ledger.register_task(ResourceKind::Interval, task());
        ledger.register_task(ResourceKind::Interval, task());
        assert_eq!(ledger.drain_tasks(ResourceKind::Interval).len(), 2);
        assert_eq!(ledger.stats(0).intervals, 0);
        assert!(ledger.drain_tasks(ResourceKind::Interval).is_empty());
    }

    #[test]
    fn test_listener_removal_matches_callback() {
        let mut ledger: ResourceLedger<&str> = ResourceLedger::new();
        ledger.add_listener("resize", "handler");
        ledger.add_listener("resize", "other");
        assert!(!ledger.remove_listener("click", &"handler"));
        assert!(ledger.remove_listener("resize", &"handler"));
        assert_eq!(ledger.listeners_for("resize"), ["other"]);
        assert_eq!(ledger.stats(0).listeners, 1);
    }

    #[test]
    fn test_changed_flag_resets() {
        let mut ledger: ResourceLedger<&str> = ResourceLedger::new();
        assert!(!ledger.take_changed());
        ledger.register_task(ResourceKind::Immediate, task());
        assert!(ledger.take_changed());
        assert!(!ledger.take_changed());
    }
}
