//! C2 — counting semaphore. Grounded on
//! `examples/original_source/include/semaphore.hpp` (a `sem_t` wrapper);
//! realized here over a plain `Mutex<usize>` + `Condvar` rather than a
//! POSIX semaphore, since the crate has no reason to reach for `libc` for a
//! primitive `std` already expresses directly.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Outcome of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Acquired,
    Timeout,
}

/// A classic counting semaphore: `post` increments and wakes one waiter,
/// `wait` blocks until the count is positive then decrements it.
#[derive(Debug)]
pub struct CountingSemaphore {
    count: Mutex<usize>,
    available: Condvar,
}

impl CountingSemaphore {
    pub fn new(initial: usize) -> Self {
        CountingSemaphore {
            count: Mutex::new(initial),
            available: Condvar::new(),
        }
    }

    pub fn post(&self) {
        let mut count = self.count.lock().unwrap();
        *count += 1;
        self.available.notify_one();
    }

    pub fn wait(&self) {
        let mut count = self.count.lock().unwrap();
        while *count == 0 {
            count = self.available.wait(count).unwrap();
        }
        *count -= 1;
    }

    pub fn try_wait(&self) -> bool {
        let mut count = self.count.lock().unwrap();
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    pub fn timed_wait(&self, timeout: Duration) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock().unwrap();
        loop {
            if *count > 0 {
                *count -= 1;
                return WaitOutcome::Acquired;
            }
            let now = Instant::now();
            if now >= deadline {
                return WaitOutcome::Timeout;
            }
            let (guard, result) = self
                .available
                .wait_timeout(count, deadline - now)
                .unwrap();
            count = guard;
            if result.timed_out() && *count == 0 {
                return WaitOutcome::Timeout;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn try_wait_fails_on_empty_semaphore() {
        let sem = CountingSemaphore::new(0);
        assert!(!sem.try_wait());
    }

    #[test]
    fn post_then_wait_round_trips() {
        let sem = CountingSemaphore::new(0);
        sem.post();
        sem.wait();
        assert!(!sem.try_wait());
    }

    #[test]
    fn timed_wait_times_out_when_nothing_is_posted() {
        let sem = CountingSemaphore::new(0);
        assert_eq!(
            sem.timed_wait(Duration::from_millis(15)),
            WaitOutcome::Timeout
        );
    }

    #[test]
    fn wait_blocks_until_a_post_arrives() {
        let sem = Arc::new(CountingSemaphore::new(0));
        let sem2 = Arc::clone(&sem);
        let handle = thread::spawn(move || sem2.wait());
        thread::sleep(Duration::from_millis(20));
        sem.post();
        handle.join().unwrap();
    }
}
