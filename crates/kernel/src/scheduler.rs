use std::collections::BTreeMap;

/// Tick-delayed task queue.
///
/// Tasks are plain data; the owner decides what running one means. Nothing
/// runs concurrently: due tasks are handed back on the main tick thread.
#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    queue: BTreeMap<u64, Vec<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            queue: BTreeMap::new(),
        }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task` to become due `delay` ticks after `now`.
    pub fn schedule_in(&mut self, now: u64, delay: u64, task: T) {
        self.schedule_at(now.saturating_add(delay), task);
    }

    pub fn schedule_at(&mut self, tick: u64, task: T) {
        self.queue.entry(tick).or_default().push(task);
    }

    /// Remove and return every task due at or before `now`, oldest first.
    pub fn take_due(&mut self, now: u64) -> Vec<T> {
        let later = match now.checked_add(1) {
            Some(next) => self.queue.split_off(&next),
            None => BTreeMap::new(),
        };
        let due = std::mem::replace(&mut self.queue, later);
        due.into_values().flatten().collect()
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.queue.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop every queued task matching `pred`.
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&T) -> bool) {
        for tasks in self.queue.values_mut() {
            tasks.retain(|t| !pred(t));
        }
        self.queue.retain(|_, tasks| !tasks.is_empty());
    }
}
