//! C7 — the scheduled/timer pool. Grounded on
//! `examples/original_source/include/threadpoolexecutor.hpp`'s comment
//! that a scheduled variant "hides" the base executor's worker-management
//! surface (`execute`, `add_worker`, `worker_thread`, `set_max_pool_size`,
//! `keep_non_core_thread_alive`, `release_non_core_threads`) — realized
//! here as a standalone type that does not implement those operations at
//! all, rather than an inheritance hierarchy with overridden stubs
//! (`SPEC_FULL.md` §4.7).
//!
//! A single dispatcher thread (itself a `ManagedWorker`, C4) owns a
//! min-heap of pending firings and waits on a `CountingSemaphore` (C2)
//! until the nearest deadline or a new, sooner entry is posted. Firing
//! submits the due job to an internal fixed-size `PoolCore` (C5, reusing
//! the same execution/shutdown machinery as the plain pool) rather than
//! running it on the dispatcher thread itself, so a slow task cannot
//! delay the next tick.
//!
//! Fixed-rate entries compute their next firing instant *before* running
//! the job; fixed-delay entries compute it *after* the job returns —
//! per `SPEC_FULL.md` §4.7's explicit distinction. Java's
//! `ScheduledThreadPoolExecutor` defaults are followed for `shutdown()`:
//! already-queued one-shot firings still run to completion, but periodic
//! firings are dropped rather than continuing indefinitely.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::core_executor::{DispatchStyle, PoolCore};
use crate::config::PoolConfig;
use crate::ctl::{Ctl, RunState};
use crate::error::PoolError;
use crate::rejection::AbortPolicy;
use crate::semaphore::CountingSemaphore;
use crate::task::{JoinFuture, Task};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Recurrence {
    Once,
    FixedRate(Duration),
    FixedDelay(Duration),
}

struct TimerEntry {
    next_fire: Instant,
    seq: u64,
    recurrence: Recurrence,
    cancelled: Arc<AtomicBool>,
    job: Arc<dyn Fn() + Send + Sync>,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.next_fire == other.next_fire && self.seq == other.seq
    }
}
impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    // Reversed so `BinaryHeap` (a max-heap) pops the earliest deadline
    // first, ties broken by insertion order.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .next_fire
            .cmp(&self.next_fire)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A handle to a recurring (fixed-rate or fixed-delay) registration,
/// letting the caller cancel future firings.
#[derive(Debug, Clone)]
pub struct FixedRateHandle {
    cancelled: Arc<AtomicBool>,
}

impl FixedRateHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

pub struct ScheduledExecutor {
    ctl: Arc<Ctl>,
    heap: Arc<Mutex<BinaryHeap<TimerEntry>>>,
    sem: Arc<CountingSemaphore>,
    seq: Arc<AtomicU64>,
    inner: Arc<PoolCore>,
    dispatcher: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl ScheduledExecutor {
    pub fn new(pool_size: usize, name_prefix: impl Into<String>) -> Result<Self, PoolError> {
        let name_prefix = name_prefix.into();
        let config = PoolConfig::new(pool_size, pool_size, name_prefix.clone())?;
        let inner = PoolCore::new(config, Box::new(AbortPolicy), DispatchStyle::Plain);
        let ctl = Arc::new(Ctl::new_running());
        let heap = Arc::new(Mutex::new(BinaryHeap::new()));
        let sem = Arc::new(CountingSemaphore::new(0));

        let dispatcher = {
            let ctl = Arc::clone(&ctl);
            let heap = Arc::clone(&heap);
            let sem = Arc::clone(&sem);
            let inner = Arc::clone(&inner);
            std::thread::Builder::new()
                .name(format!("{name_prefix}dispatcher"))
                .spawn(move || dispatcher_loop(ctl, heap, sem, inner))
                .map_err(PoolError::WorkerStartFailed)?
        };

        Ok(ScheduledExecutor {
            ctl,
            heap,
            sem,
            seq: Arc::new(AtomicU64::new(0)),
            inner,
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }

    fn check_accepting(&self) -> Result<(), PoolError> {
        let state = self.ctl.run_state(Ordering::Acquire);
        if state >= RunState::Shutdown {
            return Err(PoolError::Rejected { state });
        }
        Ok(())
    }

    fn push(&self, entry: TimerEntry) {
        self.heap.lock().unwrap().push(entry);
        self.sem.post();
    }

    /// Runs `f` once, after `delay`.
    pub fn schedule<T: Send + 'static>(
        &self,
        delay: Duration,
        f: impl FnOnce() -> T + Send + 'static,
    ) -> Result<JoinFuture<T>, PoolError> {
        self.check_accepting()?;
        let (task, rx) = Task::with_result(f);
        let task = Mutex::new(Some(task));
        let job: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
            if let Some(task) = task.lock().unwrap().take() {
                task.run();
            }
        });
        self.push(TimerEntry {
            next_fire: Instant::now() + delay,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            recurrence: Recurrence::Once,
            cancelled: Arc::new(AtomicBool::new(false)),
            job,
        });
        Ok(JoinFuture::new(rx))
    }

    /// Runs `f` repeatedly; the next firing is computed as
    /// `previous_next_fire + period`, independent of how long a given run
    /// takes (so a slow run "catches up" rather than drifting later).
    pub fn schedule_at_fixed_rate(
        &self,
        initial_delay: Duration,
        period: Duration,
        f: impl Fn() + Send + Sync + 'static,
    ) -> Result<FixedRateHandle, PoolError> {
        self.check_accepting()?;
        self.schedule_recurring(initial_delay, Recurrence::FixedRate(period), f)
    }

    /// Runs `f` repeatedly; the next firing is computed as
    /// `completion_instant + period`, so runs never overlap and a slow
    /// run pushes every subsequent one later.
    pub fn schedule_with_fixed_delay(
        &self,
        initial_delay: Duration,
        period: Duration,
        f: impl Fn() + Send + Sync + 'static,
    ) -> Result<FixedRateHandle, PoolError> {
        self.check_accepting()?;
        self.schedule_recurring(initial_delay, Recurrence::FixedDelay(period), f)
    }

    fn schedule_recurring(
        &self,
        initial_delay: Duration,
        recurrence: Recurrence,
        f: impl Fn() + Send + Sync + 'static,
    ) -> Result<FixedRateHandle, PoolError> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.push(TimerEntry {
            next_fire: Instant::now() + initial_delay,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            recurrence,
            cancelled: Arc::clone(&cancelled),
            job: Arc::new(f),
        });
        Ok(FixedRateHandle { cancelled })
    }

    /// No new firings are accepted; firings already in the heap still
    /// run, except periodic ones, which are dropped rather than
    /// continuing forever (matching `ScheduledThreadPoolExecutor`'s
    /// default shutdown policy).
    pub fn shutdown(&self) {
        self.ctl.advance_run_state(RunState::Shutdown);
        {
            let mut heap = self.heap.lock().unwrap();
            let remaining: Vec<TimerEntry> = std::mem::take(&mut *heap).into_sorted_vec();
            for entry in remaining {
                if entry.recurrence == Recurrence::Once {
                    heap.push(entry);
                }
            }
        }
        self.inner.shutdown();
        self.sem.post();
    }

    /// Discards every pending firing immediately and stops the internal
    /// execution pool without waiting for in-flight work.
    pub fn stop(&self) {
        self.ctl.advance_run_state(RunState::Stop);
        self.heap.lock().unwrap().clear();
        self.inner.stop();
        self.sem.post();
        if let Some(handle) = self.dispatcher.lock().unwrap().take() {
            let _ = handle.join();
        }
        self.ctl.advance_run_state(RunState::Terminated);
    }

    pub fn is_shutdown(&self) -> bool {
        self.ctl.run_state(Ordering::Acquire) >= RunState::Shutdown
    }

    pub fn is_terminated(&self) -> bool {
        self.ctl.run_state(Ordering::Acquire) >= RunState::Terminated
            || (self.is_shutdown() && self.heap.lock().unwrap().is_empty() && self.inner.is_terminated())
    }

    pub fn get_task_count(&self) -> usize {
        self.heap.lock().unwrap().len() + self.inner.get_task_count()
    }
}

impl std::fmt::Debug for ScheduledExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledExecutor")
            .field("is_shutdown", &self.is_shutdown())
            .field("task_count", &self.get_task_count())
            .finish()
    }
}

impl Drop for ScheduledExecutor {
    fn drop(&mut self) {
        if !self.is_terminated() {
            self.stop();
        } else if let Some(handle) = self.dispatcher.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

fn dispatcher_loop(
    ctl: Arc<Ctl>,
    heap: Arc<Mutex<BinaryHeap<TimerEntry>>>,
    sem: Arc<CountingSemaphore>,
    inner: Arc<PoolCore>,
) {
    loop {
        if ctl.run_state(Ordering::Acquire) >= RunState::Stop {
            return;
        }

        let wait_for = {
            let heap = heap.lock().unwrap();
            heap.peek().map(|entry| entry.next_fire.saturating_duration_since(Instant::now()))
        };
        match wait_for {
            None => {
                sem.wait();
            }
            Some(d) if d.is_zero() => {}
            Some(d) => {
                sem.timed_wait(d);
            }
        }

        if ctl.run_state(Ordering::Acquire) >= RunState::Stop {
            return;
        }

        let due = {
            let mut heap = heap.lock().unwrap();
            match heap.peek() {
                Some(entry) if entry.next_fire <= Instant::now() => heap.pop(),
                _ => None,
            }
        };

        let Some(entry) = due else { continue };
        if entry.cancelled.load(Ordering::Acquire) {
            continue;
        }

        match entry.recurrence {
            Recurrence::Once => {
                let job = Arc::clone(&entry.job);
                let _ = inner.execute(move || job(), true);
            }
            Recurrence::FixedRate(period) => {
                reschedule(&heap, &sem, &entry, entry.next_fire + period);
                let job = Arc::clone(&entry.job);
                let _ = inner.execute(move || job(), true);
            }
            Recurrence::FixedDelay(period) => {
                let heap_for_job = Arc::clone(&heap);
                let sem_for_job = Arc::clone(&sem);
                let cancelled = Arc::clone(&entry.cancelled);
                let seq = entry.seq;
                let job_fn = Arc::clone(&entry.job);
                let job: Arc<dyn Fn() + Send + Sync> = job_fn;
                let _ = inner.execute(
                    move || {
                        job();
                        if !cancelled.load(Ordering::Acquire) {
                            let mut heap = heap_for_job.lock().unwrap();
                            heap.push(TimerEntry {
                                next_fire: Instant::now() + period,
                                seq,
                                recurrence: Recurrence::FixedDelay(period),
                                cancelled,
                                job,
                            });
                            drop(heap);
                            sem_for_job.post();
                        }
                    },
                    true,
                );
            }
        }
    }
}

fn reschedule(
    heap: &Mutex<BinaryHeap<TimerEntry>>,
    sem: &CountingSemaphore,
    entry: &TimerEntry,
    next_fire: Instant,
) {
    heap.lock().unwrap().push(TimerEntry {
        next_fire,
        seq: entry.seq,
        recurrence: entry.recurrence,
        cancelled: Arc::clone(&entry.cancelled),
        job: Arc::clone(&entry.job),
    });
    sem.post();
}
