use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use crate::core::{Callback, TimerHandle};

/// Deadline-ordered set of one-shot callbacks.
///
/// Ordering is `(deadline, id)`; ids are handed out monotonically, so callbacks
/// sharing a deadline fire in the order they were scheduled. Cancellation is
/// lazy: the heap entry stays until it reaches the top and is skipped there.
#[derive(Default)]
pub(crate) struct TimerQueue {
    heap:    BinaryHeap<Reverse<(Duration, u64)>>,
    pending: HashMap<u64, Callback>,
    next_id: u64,
}

impl TimerQueue {
    pub(crate) fn push(&mut self, deadline: Duration, callback: Callback) -> TimerHandle {
        self.next_id += 1;
        let id = self.next_id;
        self.heap.push(Reverse((deadline, id)));
        self.pending.insert(id, callback);
        TimerHandle(id)
    }

    /// Returns `true` if the handle was still pending.
    pub(crate) fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.pending.remove(&handle.0).is_some()
    }

    /// Earliest live deadline, discarding cancelled entries on the way.
    pub(crate) fn next_deadline(&mut self) -> Option<Duration> {
        while let Some(Reverse((deadline, id))) = self.heap.peek().copied() {
            if self.pending.contains_key(&id) {
                return Some(deadline);
            }
            self.heap.pop();
        }
        None
    }

    /// Removes and returns the earliest callback whose deadline is `<= now`.
    pub(crate) fn pop_due(&mut self, now: Duration) -> Option<(TimerHandle, Callback)> {
        let deadline = self.next_deadline()?;
        if deadline > now {
            return None;
        }
        let Reverse((_, id)) = self.heap.pop()?;
        let callback = self.pending.remove(&id)?;
        Some((TimerHandle(id), callback))
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ms(v: u64) -> Duration { Duration::from_millis(v) }

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(&'static str) -> Callback) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        let make = move |name: &'static str| -> Callback {
            let l = l.clone();
            Box::new(move || l.borrow_mut().push(name))
        };
        (log, make)
    }

    fn drain(q: &mut TimerQueue, now: Duration) {
        while let Some((_, cb)) = q.pop_due(now) {
            cb();
        }
    }

    #[test]
    fn fires_in_deadline_order() {
        let (log, make) = recorder();
        let mut q = TimerQueue::default();
        q.push(ms(30), make("c"));
        q.push(ms(10), make("a"));
        q.push(ms(20), make("b"));
        drain(&mut q, ms(100));
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn equal_deadlines_keep_schedule_order() {
        let (log, make) = recorder();
        let mut q = TimerQueue::default();
        q.push(ms(5), make("first"));
        q.push(ms(5), make("second"));
        drain(&mut q, ms(5));
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn not_yet_due_stays_queued() {
        let (log, make) = recorder();
        let mut q = TimerQueue::default();
        q.push(ms(50), make("late"));
        drain(&mut q, ms(49));
        assert!(log.borrow().is_empty());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn cancelled_entries_are_skipped() {
        let (log, make) = recorder();
        let mut q = TimerQueue::default();
        let h = q.push(ms(1), make("gone"));
        q.push(ms(2), make("kept"));
        assert!(q.cancel(h));
        assert!(!q.cancel(h));
        assert_eq!(q.next_deadline(), Some(ms(2)));
        drain(&mut q, ms(10));
        assert_eq!(*log.borrow(), vec!["kept"]);
        assert_eq!(q.len(), 0);
    }
}
