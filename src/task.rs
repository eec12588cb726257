//! C3 — the polymorphic one-shot task handle. Grounded on
//! `examples/original_source/include/runnable.hpp` and
//! `include/functor_wrapper.hpp` (type erasure via a virtual `call()`,
//! move-only ownership, empty check). The modern erased-closure idiom
//! (`Box<dyn FnOnce() + Send + 'static>`, not the obsolete `FnBox` pattern
//! seen in `examples/other_examples/171b631a_zhaoshiling1017-tikv__...`) is
//! grounded on
//! `examples/other_examples/1e9f7cc3_data-tracks-DataTracks__threading-src-pool.rs.rs`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Mutex;

use crate::error::PoolError;

type Thunk = Box<dyn FnOnce() + Send + 'static>;

/// A unit of work that can be handed to a queue and executed at most once.
///
/// Both construction modes described in `SPEC_FULL.md` §4.3 ("bare" and
/// "future-carrying") collapse to the same erased closure here: a
/// future-carrying task is simply a bare closure that happens to close over
/// an `mpsc::Sender` and perform its own catch/publish sequence.
pub struct Task {
    inner: Mutex<Option<Thunk>>,
}

impl Task {
    /// Wraps a callable with no result.
    pub fn bare(f: impl FnOnce() + Send + 'static) -> Self {
        Task {
            inner: Mutex::new(Some(Box::new(f))),
        }
    }

    /// Wraps a callable whose result (or panic) is published on a oneshot
    /// channel, returning the consumer end.
    pub fn with_result<T: Send + 'static>(
        f: impl FnOnce() -> T + Send + 'static,
    ) -> (Self, mpsc::Receiver<Result<T, PoolError>>) {
        let (tx, rx) = mpsc::channel();
        let task = Task::bare(move || {
            let outcome = catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
                let message = panic_message(&payload);
                tracing::error!(error = %message, "task panicked; worker continues");
                PoolError::TaskPanicked(message)
            });
            // A dropped receiver (consumer discarded the future) is not an
            // error here: the task still ran, nobody is listening.
            let _ = tx.send(outcome);
        });
        (task, rx)
    }

    /// Invokes the inner callable if it has not already run; a second call
    /// is a no-op. Any panic not already caught by `with_result` is caught
    /// here too, so a bare task can never unwind into worker-loop code.
    pub fn run(&self) {
        let thunk = self.inner.lock().unwrap().take();
        if let Some(f) = thunk {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
                let message = panic_message(&payload);
                tracing::error!(error = %message, "task panicked; worker continues");
            }
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// The consumer end of a `submit`-returned future, wrapping the oneshot
/// channel per `SPEC_FULL.md` §9 ("the oneshot result channel").
#[derive(Debug)]
pub struct JoinFuture<T> {
    rx: mpsc::Receiver<Result<T, PoolError>>,
}

impl<T> JoinFuture<T> {
    pub(crate) fn new(rx: mpsc::Receiver<Result<T, PoolError>>) -> Self {
        JoinFuture { rx }
    }

    /// Blocks until the task has run, returning its value or failure. A
    /// producer dropped before sending (task discarded by a shutdown, or
    /// the pool itself dropped) surfaces as `PoolError::BrokenChannel`.
    pub fn join(self) -> Result<T, PoolError> {
        match self.rx.recv() {
            Ok(outcome) => outcome,
            Err(_) => Err(PoolError::BrokenChannel),
        }
    }
}
