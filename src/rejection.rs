//! C8 — rejection policy. Grounded on
//! `examples/original_source/include/threadpoolexecutor.hpp`'s
//! `RejectedExecutionHandler` (default `rejectedExecution` throws). The two
//! extra stock policies below are the standard companion strategies from
//! this design's Java-style lineage (`ThreadPoolExecutor.DiscardPolicy`,
//! `.CallerRunsPolicy`), added per `SPEC_FULL.md` §4.8.

use std::fmt;

use crate::ctl::RunState;
use crate::error::PoolError;
use crate::task::Task;

/// A pluggable strategy invoked when a task cannot be accepted onto any
/// queue.
pub trait RejectionPolicy: Send + Sync + fmt::Debug {
    /// Called with the task that could not be accepted and the run-state
    /// observed at rejection time. Implementations may run the task
    /// synchronously, drop it, or fail outright.
    fn reject(&self, task: &Task, state: RunState) -> Result<(), PoolError>;
}

/// The default policy: surfaces a failure naming the pool's non-running
/// state, per `SPEC_FULL.md` §4.8 and error kind 2 in §7.
#[derive(Debug, Default)]
pub struct AbortPolicy;

impl RejectionPolicy for AbortPolicy {
    fn reject(&self, _task: &Task, state: RunState) -> Result<(), PoolError> {
        Err(PoolError::Rejected { state })
    }
}

/// Silently drops the task without running it.
#[derive(Debug, Default)]
pub struct DiscardPolicy;

impl RejectionPolicy for DiscardPolicy {
    fn reject(&self, _task: &Task, _state: RunState) -> Result<(), PoolError> {
        Ok(())
    }
}

/// Runs the task synchronously on the caller's own thread instead of
/// failing the submission.
#[derive(Debug, Default)]
pub struct CallerRunsPolicy;

impl RejectionPolicy for CallerRunsPolicy {
    fn reject(&self, task: &Task, _state: RunState) -> Result<(), PoolError> {
        task.run();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_policy_surfaces_rejected_with_the_observed_state() {
        let task = Task::bare(|| {});
        let err = AbortPolicy.reject(&task, RunState::Shutdown).unwrap_err();
        assert!(matches!(err, PoolError::Rejected { state: RunState::Shutdown }));
    }

    #[test]
    fn discard_policy_drops_the_task_without_running_it() {
        let ran = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let ran2 = std::sync::Arc::clone(&ran);
        let task = Task::bare(move || ran2.store(true, std::sync::atomic::Ordering::SeqCst));
        DiscardPolicy.reject(&task, RunState::Stop).unwrap();
        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn caller_runs_policy_executes_the_task_inline() {
        let ran = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let ran2 = std::sync::Arc::clone(&ran);
        let task = Task::bare(move || ran2.store(true, std::sync::atomic::Ordering::SeqCst));
        CallerRunsPolicy.reject(&task, RunState::Stop).unwrap();
        assert!(ran.load(std::sync::atomic::Ordering::SeqCst));
    }
}
