//! Debouncer: keyed trailing-edge deadlines
//!
//! A plain data structure instead of ambient timers. Callers pass the clock in
//! (`now`, milliseconds) and ask what is due; the host arms one real timer per
//! returned deadline and calls [`Debouncer::take_due`] with that deadline when
//! it fires. Rescheduling a key replaces its pending task, so a timer armed for
//! an older deadline finds nothing due.

use std::collections::HashMap;
use std::hash::Hash;

/// Milliseconds on the host clock (`Date.now()` in the browser).
pub type Millis = u64;

#[derive(Debug, Clone)]
struct Pending<T> {
    deadline: Millis,
    seq: u64,
    task: T,
}

/// Pending tasks, at most one per key.
#[derive(Debug, Clone)]
pub struct Debouncer<K, T> {
    pending: HashMap<K, Pending<T>>,
    next_seq: u64,
}

impl<K, T> Default for Debouncer<K, T>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> Debouncer<K, T>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Schedule `task` under `key`, cancelling whatever was pending for it.
    /// Returns the new deadline.
    pub fn schedule(&mut self, key: K, task: T, delay: Millis, now: Millis) -> Millis {
        let deadline = now.saturating_add(delay);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(key, Pending { deadline, seq, task });
        deadline
    }

    /// Drop the pending task for `key`, returning it if there was one.
    pub fn cancel(&mut self, key: &K) -> Option<T> {
        self.pending.remove(key).map(|p| p.task)
    }

    /// Remove and return every task whose deadline is `<= now`, earliest first.
    pub fn take_due(&mut self, now: Millis) -> Vec<(K, T)> {
        let due_keys: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(k, _)| k.clone())
            .collect();

        let mut due: Vec<(K, Pending<T>)> = due_keys
            .into_iter()
            .filter_map(|k| self.pending.remove(&k).map(|p| (k, p)))
            .collect();
        due.sort_by_key(|(_, p)| (p.deadline, p.seq));
        due.into_iter().map(|(k, p)| (k, p.task)).collect()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_due_before_deadline() {
        let mut d: Debouncer<&str, u32> = Debouncer::new();
        assert_eq!(d.schedule("rescan", 1, 300, 1_000), 1_300);
        assert!(d.take_due(1_299).is_empty());
        assert_eq!(d.take_due(1_300), vec![("rescan", 1)]);
        assert!(d.take_due(u64::MAX).is_empty());
    }

    #[test]
    fn test_reschedule_replaces_task_and_deadline() {
        let mut d: Debouncer<&str, &str> = Debouncer::new();
        let first = d.schedule("q", "&al", 300, 0);
        d.schedule("q", "&ali", 300, 100);
        let last = d.schedule("q", "&alice", 300, 250);

        // the timer armed for the first deadline fires: nothing is due
        assert!(d.take_due(first).is_empty());
        assert_eq!(d.take_due(last), vec![("q", "&alice")]);
    }

    #[test]
    fn test_keys_are_independent() {
        let mut d: Debouncer<u8, char> = Debouncer::new();
        d.schedule(1, 'a', 300, 0);
        d.schedule(2, 'b', 150, 0);
        assert_eq!(d.take_due(150), vec![(2, 'b')]);

        d.schedule(2, 'c', 150, 200);
        assert_eq!(d.cancel(&1), Some('a'));
        assert_eq!(d.cancel(&1), None);
        assert_eq!(d.take_due(1_000), vec![(2, 'c')]);
    }

    #[test]
    fn test_due_tasks_come_out_earliest_first() {
        let mut d: Debouncer<u8, u8> = Debouncer::new();
        d.schedule(1, 10, 200, 0);
        d.schedule(2, 20, 100, 0);
        d.schedule(3, 30, 100, 0);
        let order: Vec<u8> = d.take_due(500).into_iter().map(|(_, t)| t).collect();
        assert_eq!(order, vec![20, 30, 10]);
    }
}
