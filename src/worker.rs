//! C4 — managed worker thread. Grounded on
//! `examples/original_source/include/thread.hpp` (`executeRun`/
//! `executeFunc` prelude+epilogue, `idle_`/`lastActiveTime_`/`uniqueId_`
//! fields, `isRunning` via signal 0). `start()`'s "at most once" contract
//! is realized idiomatically as a single associated function that
//! constructs and starts atomically (`ManagedWorker::spawn`), since there
//! is no separate unstarted state in Rust to misuse a second time.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::thread_ident;

static NEXT_UNIQUE_ID: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

/// Shared, observable state of a worker, readable by the executor without
/// touching the `JoinHandle` itself.
#[derive(Debug)]
struct WorkerStatus {
    idle: AtomicBool,
    native_tid: AtomicI32,
    last_active: Mutex<Instant>,
    alive: AtomicBool,
}

impl WorkerStatus {
    fn new() -> Self {
        WorkerStatus {
            idle: AtomicBool::new(true),
            native_tid: AtomicI32::new(-1),
            last_active: Mutex::new(Instant::now()),
            alive: AtomicBool::new(true),
        }
    }
}

/// One OS thread wrapping a user-supplied body, with the idle/last-active/
/// tid bookkeeping the executor core reads to answer `get_active_count()`
/// and friends.
#[derive(Debug)]
pub struct ManagedWorker {
    pub index: usize,
    name: String,
    status: Arc<WorkerStatus>,
    handle: Option<JoinHandle<()>>,
}

impl ManagedWorker {
    /// Constructs and starts the worker in one step. `body` is run inside
    /// the prelude/epilogue described in `SPEC_FULL.md` §4.4; a panic
    /// inside `body` is not expected (worker-loop bodies themselves must
    /// not panic — only the tasks they run, which contain their own
    /// `catch_unwind`), but the epilogue restores `idle=true` regardless,
    /// matching "the idle flag is restored even if the body fails."
    pub fn spawn(
        index: usize,
        name: String,
        body: impl FnOnce() + Send + 'static,
    ) -> io::Result<Self> {
        let status = Arc::new(WorkerStatus::new());
        let prelude_status = Arc::clone(&status);
        let epilogue_status = Arc::clone(&status);
        let thread_name = name.clone();

        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            thread_ident::set_current_thread_name(&thread_name);
            prelude_status.native_tid.store(thread_ident::current_native_tid(), Ordering::Release);
            prelude_status.idle.store(false, Ordering::Release);
            *prelude_status.last_active.lock().unwrap() = Instant::now();

            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(body));

            epilogue_status.idle.store(true, Ordering::Release);
            epilogue_status.native_tid.store(-1, Ordering::Release);
            epilogue_status.alive.store(false, Ordering::Release);

            if let Err(payload) = result {
                tracing::error!("worker loop body panicked unexpectedly");
                std::panic::resume_unwind(payload);
            }
        })?;

        NEXT_UNIQUE_ID.fetch_add(1, Ordering::Relaxed);

        Ok(ManagedWorker {
            index,
            name,
            status,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_idle(&self) -> bool {
        self.status.idle.load(Ordering::Acquire)
    }

    /// Whether the worker's loop body has not yet returned. Unlike
    /// `is_running`, this is a plain flag set by the body's own
    /// prelude/epilogue rather than an OS-level probe, so it stays
    /// accurate even before the `JoinHandle` has been reaped.
    pub fn is_alive(&self) -> bool {
        self.status.alive.load(Ordering::Acquire)
    }

    pub fn last_active_time(&self) -> Instant {
        *self.status.last_active.lock().unwrap()
    }

    pub fn get_pid(&self) -> i32 {
        self.status.native_tid.load(Ordering::Acquire)
    }

    /// Probes liveness by sending signal 0 to the native thread handle.
    /// Returns `false` once the handle has already been joined.
    #[cfg(unix)]
    pub fn is_running(&self) -> bool {
        use std::os::unix::thread::JoinHandleExt;
        match &self.handle {
            Some(h) => thread_ident::is_thread_alive(h.as_pthread_t() as libc::pthread_t),
            None => false,
        }
    }

    #[cfg(not(unix))]
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Blocks until the body returns. A no-op if already joined or
    /// detached.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Removes the join handle without waiting on it, leaving the caller
    /// responsible for joining. Used by release paths that must not hold
    /// the executor's state lock across a blocking join.
    pub(crate) fn take_handle(&mut self) -> Option<JoinHandle<()>> {
        self.handle.take()
    }

    /// Releases ownership of the OS thread without waiting for it.
    pub fn detach(&mut self) {
        self.handle = None;
    }

    pub fn is_joinable(&self) -> bool {
        self.handle.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn spawned_worker_runs_its_body_and_becomes_idle_again() {
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = Arc::clone(&ran);
        let mut worker = ManagedWorker::spawn(0, "wp-test".into(), move || {
            ran2.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        worker.join();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(worker.is_idle());
        assert!(!worker.is_joinable());
    }

    #[test]
    fn idle_is_false_while_the_body_is_running() {
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let mut worker = ManagedWorker::spawn(0, "wp-test".into(), move || {
            rx.recv().ok();
        })
        .unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(!worker.is_idle());
        tx.send(()).unwrap();
        worker.join();
        assert!(worker.is_idle());
    }
}
