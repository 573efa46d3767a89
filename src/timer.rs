//! Deferred work on a logical millisecond clock
//!
//! Every task carries the session generation it was scheduled under. The host
//! bumps the generation on reset and cancels everything older, and consumers
//! drop any fired task whose generation is no longer current.

/// Identifies a scheduled task so it can be cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone, PartialEq)]
pub struct Fired<T> {
    pub generation: u64,
    pub due_ms: u64,
    pub task: T,
}

#[derive(Debug, Clone)]
struct Scheduled<T> {
    handle: TimerHandle,
    generation: u64,
    due_ms: u64,
    task: T,
}

#[derive(Debug, Clone)]
pub struct TimerQueue<T> {
    pending: Vec<Scheduled<T>>,
    next_handle: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            next_handle: 0,
        }
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, generation: u64, due_ms: u64, task: T) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.push(Scheduled {
            handle,
            generation,
            due_ms,
            task,
        });
        handle
    }

    /// Returns true if the task was still pending
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|s| s.handle != handle);
        self.pending.len() != before
    }

    /// Drops every task scheduled under `generation`; returns how many
    pub fn cancel_generation(&mut self, generation: u64) -> usize {
        let before = self.pending.len();
        self.pending.retain(|s| s.generation != generation);
        before - self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Removes and returns every task due at or before `now_ms`, earliest
    /// first. Tasks due at the same instant fire in schedule order.
    pub fn pop_due(&mut self, now_ms: u64) -> Vec<Fired<T>> {
        let (mut due, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|s| s.due_ms <= now_ms);
        self.pending = rest;

        due.sort_by_key(|s| (s.due_ms, s.handle.0));
        due.into_iter()
            .map(|s| Fired {
                generation: s.generation,
                due_ms: s.due_ms,
                task: s.task,
            })
            .collect()
    }

    pub fn next_due(&self) -> Option<u64> {
        self.pending.iter().map(|s| s.due_ms).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
