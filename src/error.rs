//! The crate's error taxonomy, gathered into a single enum per kind in
//! `SPEC_FULL.md` §7.

use std::io;

use crate::ctl::RunState;

/// Everything that can go wrong at the boundary of this crate.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Construction parameters violated `core_size >= 0`, `max_size >= 1`,
    /// or `max_size >= core_size`.
    #[error("bad pool construction: core_size={core_size}, max_size={max_size}")]
    BadConstruction { core_size: usize, max_size: usize },

    /// The pool was not running at acceptance time.
    #[error("task rejected: pool state is {state:?}")]
    Rejected { state: RunState },

    /// A custom rejection policy chose to fail the submission.
    #[error("task rejected by policy: {reason}")]
    RejectedByPolicy { reason: String },

    /// The task panicked; this is the value delivered through a future's
    /// result channel (never returned from `submit`/`execute` themselves).
    #[error("task panicked: {0}")]
    TaskPanicked(String),

    /// A future's producer was dropped without ever sending a result.
    #[error("result channel broken: task was discarded before it ran")]
    BrokenChannel,

    /// The OS refused to start a new worker thread.
    #[error("failed to start worker thread: {0}")]
    WorkerStartFailed(#[source] io::Error),
}
