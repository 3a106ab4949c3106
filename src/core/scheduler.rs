/// Virtual-time task queue for cooperative, single-threaded timers.
///
/// Nothing here sleeps. The owner of the event loop reports elapsed time and
/// drains due tasks with [`Scheduler::pop_due`], which yields them in due
/// order (ties in scheduling order) and moves the clock to each task's due
/// time so tasks scheduled while firing are timed from the right instant.

use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// Handle to a scheduled task, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    now: u64,
    next_id: u64,
    queue: BTreeMap<(u64, u64), T>,
    due_at: FxHashMap<u64, u64>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now: 0,
            next_id: 0,
            queue: BTreeMap::new(),
            due_at: FxHashMap::default(),
        }
    }

    /// Current virtual time in milliseconds.
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn schedule(&mut self, delay_ms: u64, task: T) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;
        let at = self.now.saturating_add(delay_ms);
        self.queue.insert((at, id), task);
        self.due_at.insert(id, at);
        TaskId(id)
    }

    /// Cancel a task. Returns it if it was still pending.
    pub fn cancel(&mut self, id: TaskId) -> Option<T> {
        let at = self.due_at.remove(&id.0)?;
        self.queue.remove(&(at, id.0))
    }

    /// Cancel whatever task the slot holds and leave it empty.
    pub fn cancel_slot(&mut self, slot: &mut Option<TaskId>) {
        if let Some(id) = slot.take() {
            self.cancel(id);
        }
    }

    pub fn is_pending(&self, id: TaskId) -> bool {
        self.due_at.contains_key(&id.0)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Remove and return the earliest task due at or before `until`.
    pub fn pop_due(&mut self, until: u64) -> Option<(TaskId, T)> {
        let (&(at, id), _) = self.queue.first_key_value()?;
        if at > until {
            return None;
        }
        let task = self.queue.remove(&(at, id))?;
        self.due_at.remove(&id);
        self.now = self.now.max(at);
        Some((TaskId(id), task))
    }

    /// Move the clock forward once all due tasks have been drained.
    pub fn advance_to(&mut self, until: u64) {
        self.now = self.now.max(until);
    }

    /// Drop every pending task.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.due_at.clear();
    }
}
