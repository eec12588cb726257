//! C1 — unbounded blocking FIFO. Grounded on
//! `examples/original_source/include/blockingqueue.hpp`.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// A mutex+condvar FIFO of task handles. Each queue owns its own lock, per
/// `SPEC_FULL.md` §5 — no lock from here is ever held across user code.
#[derive(Debug)]
pub struct BlockingFifo<T> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
}

impl<T> Default for BlockingFifo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BlockingFifo<T> {
    pub fn new() -> Self {
        BlockingFifo {
            items: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
        }
    }

    /// Unconditionally appends; wakes exactly one blocked consumer.
    pub fn put(&self, item: T) {
        let mut items = self.items.lock().unwrap();
        items.push_back(item);
        self.not_empty.notify_one();
    }

    /// Blocks until non-empty, then removes and returns the head.
    pub fn take(&self) -> T {
        let mut items = self.items.lock().unwrap();
        loop {
            if let Some(item) = items.pop_front() {
                return item;
            }
            items = self.not_empty.wait(items).unwrap();
        }
    }

    /// Non-blocking; `None` if empty.
    pub fn try_pop(&self) -> Option<T> {
        self.items.lock().unwrap().pop_front()
    }

    pub fn size(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }

    /// Blocks until the queue is non-empty or `stop` reports true,
    /// re-checking `stop` on every wake. Used by worker loops so a
    /// lifecycle transition can interrupt an otherwise-indefinite wait
    /// without requiring a task to also be `put` on every queue.
    pub fn wait_while_empty_or(&self, stop: impl Fn() -> bool) {
        let mut items = self.items.lock().unwrap();
        while items.is_empty() && !stop() {
            items = self.not_empty.wait(items).unwrap();
        }
    }

    /// Wakes every blocked consumer; used to broadcast a lifecycle
    /// transition.
    pub fn notify_all(&self) {
        let _guard = self.items.lock().unwrap();
        self.not_empty.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn put_then_take_round_trips_fifo_order() {
        let q = BlockingFifo::new();
        q.put(1);
        q.put(2);
        q.put(3);
        assert_eq!(q.take(), 1);
        assert_eq!(q.take(), 2);
        assert_eq!(q.take(), 3);
    }

    #[test]
    fn try_pop_on_empty_queue_returns_none() {
        let q: BlockingFifo<i32> = BlockingFifo::new();
        assert_eq!(q.try_pop(), None);
        assert!(q.is_empty());
        assert_eq!(q.size(), 0);
    }

    #[test]
    fn take_blocks_until_a_put_arrives() {
        let q = Arc::new(BlockingFifo::new());
        let q2 = Arc::clone(&q);
        let handle = thread::spawn(move || q2.take());
        thread::sleep(Duration::from_millis(20));
        q.put(7);
        assert_eq!(handle.join().unwrap(), 7);
    }

    #[test]
    fn wait_while_empty_or_unblocks_on_stop_signal() {
        let q: Arc<BlockingFifo<i32>> = Arc::new(BlockingFifo::new());
        let q2 = Arc::clone(&q);
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let stop2 = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            q2.wait_while_empty_or(|| stop2.load(std::sync::atomic::Ordering::SeqCst));
        });
        thread::sleep(Duration::from_millis(20));
        stop.store(true, std::sync::atomic::Ordering::SeqCst);
        q.notify_all();
        handle.join().unwrap();
    }
}
