//! C5 — the shared executor core. Grounded on
//! `examples/original_source/include/threadpoolexecutor.hpp` and
//! `src/threadpoolexecutor.cpp` (control-word bit packing, `addWorker`'s
//! CAS retry structure, `releaseNonCoreThreads`, `releaseWorkers`,
//! `advanceRunState`, `coreWorkerThread`/`workerThread`).
//!
//! Deliberate divergences from the literal C++ source, all required by
//! `SPEC_FULL.md`'s primacy over it (see `DESIGN.md` for the full
//! rationale):
//! - Per-queue locking, never a lock held across task execution (§5);
//!   the executor-level state lock is only ever held for bookkeeping.
//! - Modulo-full-queue-count routing for the non-core dispatch path (§9).
//! - A worker's own loop logic performs its `worker_count` decrement and
//!   drives `try_terminate` on exit, so that `shutdown()` alone (with no
//!   `stop()`) can still reach `TERMINATED` once queues drain (§4.5.4, §9).
//! - Core worker and queue slots are never removed, only retired in place,
//!   so a running core worker's captured index always addresses the same
//!   queue for its entire lifetime. Non-core slots are the one exception:
//!   `release_non_core_threads` truncates the trailing non-core entries
//!   once their workers have actually joined, so a freed index can be
//!   reused by a later `add_worker` call.
//! - State-lock handling around `join()`: the executor-level state mutex
//!   is never held while blocked in a worker's `JoinHandle::join` — handles
//!   are taken out of the worker vector under a brief lock and joined
//!   outside it (`release_workers`, `release_non_core_threads`), since a
//!   still-running worker re-acquires the same lock every loop iteration
//!   via `queue_at`/`queue_count` and would otherwise deadlock against a
//!   join held under that lock.
//!
//! This module houses `PoolCore`, the logic shared by the plain executor
//! (`Executor`, below) and the work-stealing variant
//! (`crate::work_stealing::WorkStealingExecutor`) — they differ only in
//! which queues a worker loop consults, selected by `DispatchStyle`.

use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::PoolConfig;
use crate::ctl::{Ctl, RunState};
use crate::error::PoolError;
use crate::queue::BlockingFifo;
use crate::rejection::{AbortPolicy, RejectionPolicy};
use crate::task::{JoinFuture, Task};
use crate::worker::ManagedWorker;

/// Selects whether a worker loop also probes its neighbor's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DispatchStyle {
    Plain,
    WorkStealing,
}

type Queue = Arc<BlockingFifo<Arc<Task>>>;

struct PoolState {
    queues: Vec<Option<Queue>>,
    workers: Vec<Option<ManagedWorker>>,
}

/// The shared internals of every non-scheduled executor variant.
pub(crate) struct PoolCore {
    ctl: Ctl,
    core_size: usize,
    max_size: AtomicUsize,
    name_prefix: String,
    dispatch: DispatchStyle,
    submit_id: AtomicU64,
    ever_pool_size: AtomicUsize,
    keep_non_core_alive: AtomicBool,
    state: Mutex<PoolState>,
    rejection_policy: Mutex<Box<dyn RejectionPolicy>>,
    // A dedicated park/notify pair. No executor-meaningful data lives
    // behind this lock; it exists solely so a worker can block until a
    // `put` or lifecycle transition occurs, without the per-queue FIFO
    // needing to know about cross-queue wakeups (required by C6's
    // neighbor probe). Never held across task execution.
    activity_lock: Mutex<()>,
    activity_cv: Condvar,
}

impl PoolCore {
    pub(crate) fn new(
        config: PoolConfig,
        rejection_policy: Box<dyn RejectionPolicy>,
        dispatch: DispatchStyle,
    ) -> Arc<PoolCore> {
        let initial_queues = (0..config.core_size)
            .map(|_| Some(Arc::new(BlockingFifo::new())))
            .collect::<Vec<_>>();
        Arc::new(PoolCore {
            ctl: Ctl::new_running(),
            core_size: config.core_size,
            max_size: AtomicUsize::new(config.max_size),
            name_prefix: config.name_prefix,
            dispatch,
            submit_id: AtomicU64::new(0),
            ever_pool_size: AtomicUsize::new(0),
            keep_non_core_alive: AtomicBool::new(true),
            state: Mutex::new(PoolState {
                queues: initial_queues,
                workers: Vec::new(),
            }),
            rejection_policy: Mutex::new(rejection_policy),
            activity_lock: Mutex::new(()),
            activity_cv: Condvar::new(),
        })
    }

    fn notify_activity(&self) {
        let _guard = self.activity_lock.lock().unwrap();
        self.activity_cv.notify_all();
    }

    fn park_worker(&self, stop: impl Fn() -> bool) {
        let guard = self.activity_lock.lock().unwrap();
        if stop() {
            return;
        }
        // Bounded as a defensive backstop; real wakeups arrive promptly
        // through `notify_activity`.
        let _ = self
            .activity_cv
            .wait_timeout(guard, Duration::from_millis(50))
            .unwrap();
    }

    fn worker_name(&self, index: usize) -> String {
        format!("{}{}", self.name_prefix, index)
    }

    fn queue_at(&self, index: usize) -> Option<Queue> {
        self.state.lock().unwrap().queues.get(index).cloned().flatten()
    }

    fn queue_count(&self) -> usize {
        self.state.lock().unwrap().queues.len()
    }

    /// Indices in `range` whose worker slot is populated and still
    /// running its loop body.
    fn live_worker_indices(&self, range: Range<usize>) -> Vec<usize> {
        let state = self.state.lock().unwrap();
        range
            .filter(|&i| {
                state
                    .workers
                    .get(i)
                    .and_then(|w| w.as_ref())
                    .is_some_and(ManagedWorker::is_alive)
            })
            .collect()
    }

    // ---- submission -----------------------------------------------------

    pub(crate) fn execute(
        self: &Arc<Self>,
        f: impl FnOnce() + Send + 'static,
        use_core: bool,
    ) -> Result<bool, PoolError> {
        let task = Arc::new(Task::bare(f));
        self.submit_task(task, use_core)
    }

    pub(crate) fn submit<T: Send + 'static>(
        self: &Arc<Self>,
        f: impl FnOnce() -> T + Send + 'static,
        use_core: bool,
    ) -> Result<JoinFuture<T>, PoolError> {
        let (task, rx) = Task::with_result(f);
        let task = Arc::new(task);
        self.submit_task(task, use_core)?;
        Ok(JoinFuture::new(rx))
    }

    /// Bulk submission: dispatches every task in order via the same
    /// routing path as an individual submission.
    pub(crate) fn execute_batch(
        self: &Arc<Self>,
        tasks: Vec<Arc<Task>>,
        use_core: bool,
    ) -> Result<(), PoolError> {
        for task in tasks {
            self.submit_task(task, use_core)?;
        }
        Ok(())
    }

    fn submit_task(self: &Arc<Self>, task: Arc<Task>, use_core: bool) -> Result<bool, PoolError> {
        let state = self.ctl.run_state(Ordering::Acquire);
        if state >= RunState::Shutdown {
            self.rejection_policy.lock().unwrap().reject(&task, state)?;
            return Ok(false);
        }
        if self.add_worker(Arc::clone(&task), use_core)? {
            return Ok(true);
        }
        let state = self.ctl.run_state(Ordering::Acquire);
        self.rejection_policy.lock().unwrap().reject(&task, state)?;
        Ok(false)
    }

    /// `add_worker(task, use_core)` per `SPEC_FULL.md` §4.5.3: either
    /// starts a brand-new worker (core range up to `core_size`, overall
    /// pool up to `max_size`) seeded with `task`, or — once that bound is
    /// saturated — routes `task` onto an existing live worker's queue,
    /// round-robin.
    fn add_worker(self: &Arc<Self>, task: Arc<Task>, use_core: bool) -> Result<bool, PoolError> {
        loop {
            let observed_state = self.ctl.run_state(Ordering::Acquire);
            if observed_state >= RunState::Shutdown {
                return Ok(false);
            }

            let bound = if use_core {
                self.core_size
            } else {
                self.max_size.load(Ordering::Acquire)
            };

            if self.ctl.worker_count(Ordering::Acquire) >= bound {
                let range_end = if use_core { self.core_size } else { self.queue_count() };
                let candidates = self.live_worker_indices(0..range_end);
                let Some(&idx) = candidates.get(self.submit_id.fetch_add(1, Ordering::Relaxed) as usize % candidates.len().max(1)) else {
                    return Ok(false);
                };
                if let Some(queue) = self.queue_at(idx) {
                    queue.put(task);
                    self.notify_activity();
                    return Ok(true);
                }
                return Ok(false);
            }

            // Reserve a worker slot: index assignment and the
            // worker_count CAS happen under the same state lock so two
            // concurrent callers can never be handed the same index.
            let mut state_guard = self.state.lock().unwrap();
            if self.ctl.run_state(Ordering::Acquire) != observed_state {
                continue;
            }
            let c = self.ctl.load(Ordering::Acquire);
            if self.ctl.worker_count(Ordering::Acquire) >= bound {
                continue;
            }
            if !self.ctl.compare_and_increment_worker_count(c) {
                continue;
            }
            let index = state_guard.workers.len();
            let queue = if index < state_guard.queues.len() {
                Arc::clone(state_guard.queues[index].as_ref().expect("core queue preallocated"))
            } else {
                let q: Queue = Arc::new(BlockingFifo::new());
                state_guard.queues.push(Some(Arc::clone(&q)));
                q
            };
            state_guard.workers.push(None);
            drop(state_guard);

            queue.put(Arc::clone(&task));
            return self.spawn_worker_at(index);
        }
    }

    fn spawn_worker_at(self: &Arc<Self>, index: usize) -> Result<bool, PoolError> {
        let pool = Arc::clone(self);
        let name = self.worker_name(index);
        match ManagedWorker::spawn(index, name, move || run_worker_loop(pool, index)) {
            Ok(worker) => {
                self.state.lock().unwrap().workers[index] = Some(worker);
                self.ever_pool_size.fetch_add(1, Ordering::Relaxed);
                self.notify_activity();
                Ok(true)
            }
            Err(io_err) => {
                self.ctl.decrement_worker_count();
                Err(PoolError::WorkerStartFailed(io_err))
            }
        }
    }

    // ---- worker exit --------------------------------------------------------

    fn on_worker_exit(&self, index: usize) {
        self.ctl.decrement_worker_count();
        tracing::debug!(index, "worker exiting");
        self.try_terminate();
    }

    /// The STOP/SHUTDOWN -> TIDYING -> TERMINATED half of the state
    /// machine, shared by `shutdown()`, `stop()`, and every worker's own
    /// exit path. See `SPEC_FULL.md` §4.5.6 and §9.
    fn try_terminate(&self) {
        loop {
            let c = self.ctl.load(Ordering::Acquire);
            let state = self.ctl.run_state(Ordering::Acquire);
            if state < RunState::Shutdown || state >= RunState::Tidying {
                return;
            }
            if state == RunState::Shutdown && self.any_queue_non_empty() {
                return;
            }
            if self.ctl.worker_count(Ordering::Acquire) != 0 {
                self.notify_activity();
                return;
            }
            if self.ctl.compare_exchange_to_tidying(c) {
                tracing::debug!("pool tidying");
                self.terminated_hook();
                self.ctl.store_terminated();
                tracing::debug!("pool terminated");
                return;
            }
        }
    }

    fn terminated_hook(&self) {
        // User-overridable hook point in the source design; this
        // implementation has no default behavior beyond the log lines
        // around it.
    }

    fn any_queue_non_empty(&self) -> bool {
        self.state
            .lock()
            .unwrap()
            .queues
            .iter()
            .flatten()
            .any(|q| !q.is_empty())
    }

    // ---- pre-start / resize ----------------------------------------------

    pub(crate) fn pre_start_core_threads(self: &Arc<Self>) -> Result<usize, PoolError> {
        for index in 0..self.core_size {
            loop {
                let c = self.ctl.load(Ordering::Acquire);
                if self.ctl.worker_count(Ordering::Acquire) > index {
                    break;
                }
                let mut state_guard = self.state.lock().unwrap();
                if state_guard.workers.len() > index {
                    break;
                }
                if !self.ctl.compare_and_increment_worker_count(c) {
                    continue;
                }
                state_guard.workers.push(None);
                drop(state_guard);
                self.spawn_worker_at(index)?;
                break;
            }
        }
        Ok(self.ever_pool_size.load(Ordering::Acquire))
    }

    pub(crate) fn set_max_pool_size(&self, n: usize) {
        if n == 0 || n < self.core_size {
            return;
        }
        self.max_size.store(n, Ordering::Release);
        if self.ctl.worker_count(Ordering::Acquire) > n {
            self.release_non_core_threads();
        }
    }

    pub(crate) fn keep_non_core_thread_alive(&self, value: bool) {
        self.keep_non_core_alive.store(value, Ordering::Release);
    }

    /// Signals every non-core worker to retire itself once its queue
    /// drains, then joins each of them unconditionally and removes their
    /// slots (`SPEC_FULL.md` §4.5.5, §9, matching
    /// `ThreadPoolExecutor::releaseNonCoreThreads` in
    /// `examples/original_source/src/threadpoolexecutor.cpp`, which joins
    /// by `joinable()` rather than by an idle check — a live worker's idle
    /// flag is `false` for its entire run, per `src/worker.rs`'s
    /// prelude/epilogue, so gating the join on `is_idle()` would never
    /// join a running worker at all).
    ///
    /// The join handles are taken out of the worker vector under a brief
    /// lock and joined outside it, so a worker still looping (reading its
    /// own queue via `queue_at`/`queue_count`, both of which also lock
    /// `self.state`) can never deadlock against this call.
    pub(crate) fn release_non_core_threads(&self) {
        self.keep_non_core_alive.store(false, Ordering::Release);
        self.notify_activity();

        let handles: Vec<JoinHandle<()>> = {
            let mut state = self.state.lock().unwrap();
            state
                .workers
                .iter_mut()
                .skip(self.core_size)
                .filter_map(|slot| slot.as_mut().and_then(ManagedWorker::take_handle))
                .collect()
        };
        for handle in handles {
            let _ = handle.join();
        }

        // Every handle above has now returned from its loop body (it only
        // exits once its own queue is empty and `keep_non_core_alive` is
        // observed false), so each slot's queue is guaranteed empty and the
        // trailing non-core entries can be dropped.
        let mut state = self.state.lock().unwrap();
        while state.workers.len() > self.core_size {
            state.workers.pop();
            state.queues.pop();
        }
    }

    // ---- shutdown machine --------------------------------------------------

    pub(crate) fn shutdown(&self) {
        self.ctl.advance_run_state(RunState::Shutdown);
        self.notify_activity();
        tracing::debug!("shutdown requested");
        self.try_terminate();
    }

    pub(crate) fn stop(&self) {
        self.ctl.advance_run_state(RunState::Stop);
        self.notify_activity();
        tracing::debug!("stop requested");
        if self.ctl.worker_count(Ordering::Acquire) != 0 {
            self.release_workers();
        }
        self.try_terminate();
    }

    /// Joins every worker handle still on record. Workers decrement their
    /// own count on the way out (§4.5.4); this only reclaims OS resources.
    ///
    /// Handles are taken out of the worker vector under a brief lock and
    /// joined outside it (`SPEC_FULL.md` §5: the state mutex is never held
    /// while joining a worker). Holding the lock across `join()` would
    /// deadlock: a worker still looping calls `queue_at`/`queue_count`
    /// (also under `self.state`) on every iteration, and with the lock
    /// held for the whole join loop that worker could never observe
    /// `run_state >= Stop` and exit.
    fn release_workers(&self) {
        self.notify_activity();
        let handles: Vec<JoinHandle<()>> = {
            let mut state = self.state.lock().unwrap();
            state.workers.iter_mut().flatten().filter_map(ManagedWorker::take_handle).collect()
        };
        for handle in handles {
            let _ = handle.join();
        }
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.ctl.run_state(Ordering::Acquire) >= RunState::Shutdown
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.ctl.run_state(Ordering::Acquire) >= RunState::Terminated
    }

    // ---- observational surface --------------------------------------------

    pub(crate) fn get_active_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .workers
            .iter()
            .flatten()
            .filter(|w| w.is_alive() && !w.is_idle())
            .count()
    }

    pub(crate) fn get_ever_pool_size(&self) -> usize {
        self.ever_pool_size.load(Ordering::Acquire)
    }

    pub(crate) fn get_core_pool_size(&self) -> usize {
        self.core_size
    }

    pub(crate) fn get_task_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .queues
            .iter()
            .flatten()
            .map(|q| q.size())
            .sum()
    }

    pub(crate) fn set_rejection_policy(&self, policy: Box<dyn RejectionPolicy>) {
        *self.rejection_policy.lock().unwrap() = policy;
    }
}

impl fmt::Display for PoolCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.ctl.run_state(Ordering::Acquire);
        write!(
            f,
            "STATE={state:?} EVER_POOL_SIZE={} CORE_POOL_SIZE={} MAX_POOL_SIZE={} TASK_QUEUE_SIZE={}",
            self.get_ever_pool_size(),
            self.core_size,
            self.max_size.load(Ordering::Acquire),
            self.get_task_count(),
        )
    }
}

impl Drop for PoolCore {
    fn drop(&mut self) {
        if !self.is_terminated() {
            self.stop();
        }
    }
}

/// The body run by every worker thread, core or non-core, plain or
/// work-stealing (`SPEC_FULL.md` §4.5.4 and §4.6).
fn run_worker_loop(pool: Arc<PoolCore>, index: usize) {
    let is_core = index < pool.core_size;
    loop {
        if pool.ctl.run_state(Ordering::Acquire) >= RunState::Stop {
            break;
        }
        let Some(queue) = pool.queue_at(index) else {
            break;
        };
        let neighbor = if pool.dispatch == DispatchStyle::WorkStealing && pool.queue_count() > 1 {
            let n = (index + 1) % pool.queue_count();
            pool.queue_at(n)
        } else {
            None
        };

        let queues_empty = queue.is_empty() && neighbor.as_ref().map_or(true, |n| n.is_empty());
        if queues_empty {
            pool.park_worker(|| pool.ctl.run_state(Ordering::Acquire) != RunState::Running);
        }

        let popped = queue
            .try_pop()
            .or_else(|| neighbor.as_ref().and_then(|nb| nb.try_pop()));

        match popped {
            Some(task) => task.run(),
            None => {
                let state = pool.ctl.run_state(Ordering::Acquire);
                if state >= RunState::Shutdown {
                    // Quiescent shutdown with nothing left to do: this
                    // worker (core or non-core) has no further reason to
                    // keep blocking, since no new submissions can ever
                    // arrive again. See `SPEC_FULL.md` §4.5.4 / §9.
                    break;
                }
                if !is_core && !pool.keep_non_core_alive.load(Ordering::Acquire) {
                    break;
                }
                // Spurious wake with nothing to do; loop again.
            }
        }
    }
    pool.on_worker_exit(index);
}

/// The plain executor: round-robin dispatch over per-worker queues, no
/// stealing.
pub struct Executor {
    pub(crate) core: Arc<PoolCore>,
}

impl Executor {
    /// Constructs with the default rejection policy (`AbortPolicy`). No
    /// workers are spawned eagerly; call `pre_start_core_threads()` for
    /// that.
    pub fn new(core_size: usize, max_size: usize, name_prefix: impl Into<String>) -> Result<Self, PoolError> {
        Self::with_rejection_policy(core_size, max_size, name_prefix, Box::new(AbortPolicy))
    }

    pub fn with_rejection_policy(
        core_size: usize,
        max_size: usize,
        name_prefix: impl Into<String>,
        rejection_policy: Box<dyn RejectionPolicy>,
    ) -> Result<Self, PoolError> {
        let config = PoolConfig::new(core_size, max_size, name_prefix)?;
        Ok(Executor {
            core: PoolCore::new(config, rejection_policy, DispatchStyle::Plain),
        })
    }

    pub(crate) fn from_core(core: Arc<PoolCore>) -> Self {
        Executor { core }
    }

    pub fn execute(&self, f: impl FnOnce() + Send + 'static) -> Result<bool, PoolError> {
        self.core.execute(f, true)
    }

    pub fn execute_with(&self, f: impl FnOnce() + Send + 'static, use_core: bool) -> Result<bool, PoolError> {
        self.core.execute(f, use_core)
    }

    pub fn submit<T: Send + 'static>(&self, f: impl FnOnce() -> T + Send + 'static) -> Result<JoinFuture<T>, PoolError> {
        self.core.submit(f, true)
    }

    pub fn submit_with<T: Send + 'static>(
        &self,
        f: impl FnOnce() -> T + Send + 'static,
        use_core: bool,
    ) -> Result<JoinFuture<T>, PoolError> {
        self.core.submit(f, use_core)
    }

    /// Submits every closure in order, using the same routing path as an
    /// individual `execute` call.
    pub fn execute_batch(&self, tasks: Vec<Box<dyn FnOnce() + Send + 'static>>) -> Result<(), PoolError> {
        let tasks = tasks.into_iter().map(|f| Arc::new(Task::bare(f))).collect();
        self.core.execute_batch(tasks, true)
    }

    pub fn pre_start_core_threads(&self) -> Result<usize, PoolError> {
        self.core.pre_start_core_threads()
    }

    pub fn set_max_pool_size(&self, n: usize) {
        self.core.set_max_pool_size(n);
    }

    pub fn keep_non_core_thread_alive(&self, value: bool) {
        self.core.keep_non_core_thread_alive(value);
    }

    pub fn release_non_core_threads(&self) {
        self.core.release_non_core_threads();
    }

    pub fn set_rejected_execution_handler(&self, policy: Box<dyn RejectionPolicy>) {
        self.core.set_rejection_policy(policy);
    }

    pub fn shutdown(&self) {
        self.core.shutdown();
    }

    pub fn stop(&self) {
        self.core.stop();
    }

    pub fn is_shutdown(&self) -> bool {
        self.core.is_shutdown()
    }

    pub fn is_terminated(&self) -> bool {
        self.core.is_terminated()
    }

    pub fn get_active_count(&self) -> usize {
        self.core.get_active_count()
    }

    pub fn get_ever_pool_size(&self) -> usize {
        self.core.get_ever_pool_size()
    }

    pub fn get_core_pool_size(&self) -> usize {
        self.core.get_core_pool_size()
    }

    pub fn get_task_count(&self) -> usize {
        self.core.get_task_count()
    }
}

impl fmt::Display for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.core)
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor").field("state", &self.to_string()).finish()
    }
}
