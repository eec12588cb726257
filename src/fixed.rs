//! The fixed-size pool. `examples/original_source/include/fixedthreadpoolexecutor.hpp`
//! declares this type but its `.cpp` counterpart was never filled in beyond
//! field declarations — an unfinished stub in the original. Implemented
//! here the way its name and field list imply: core and max bounds pinned
//! equal, in the spirit of Java's `Executors.newFixedThreadPool` (an
//! `[SUPPLEMENT]` per `SPEC_FULL.md` §9's resolved Open Question).

use crate::core_executor::{DispatchStyle, Executor, PoolCore};
use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::rejection::{AbortPolicy, RejectionPolicy};
use crate::task::JoinFuture;

/// A pool whose worker count never varies: `core_size == max_size`, so no
/// worker is ever started or released past construction other than on
/// shutdown.
pub struct FixedExecutor {
    inner: Executor,
}

impl FixedExecutor {
    pub fn new(size: usize, name_prefix: impl Into<String>) -> Result<Self, PoolError> {
        Self::with_rejection_policy(size, name_prefix, Box::new(AbortPolicy))
    }

    pub fn with_rejection_policy(
        size: usize,
        name_prefix: impl Into<String>,
        rejection_policy: Box<dyn RejectionPolicy>,
    ) -> Result<Self, PoolError> {
        let config = PoolConfig::new(size, size, name_prefix)?;
        let core = PoolCore::new(config, rejection_policy, DispatchStyle::Plain);
        Ok(FixedExecutor {
            inner: Executor::from_core(core),
        })
    }

    pub fn execute(&self, f: impl FnOnce() + Send + 'static) -> Result<bool, PoolError> {
        self.inner.execute(f)
    }

    pub fn submit<T: Send + 'static>(&self, f: impl FnOnce() -> T + Send + 'static) -> Result<JoinFuture<T>, PoolError> {
        self.inner.submit(f)
    }

    pub fn pre_start_core_threads(&self) -> Result<usize, PoolError> {
        self.inner.pre_start_core_threads()
    }

    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    pub fn stop(&self) {
        self.inner.stop();
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown()
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }

    pub fn get_active_count(&self) -> usize {
        self.inner.get_active_count()
    }

    pub fn get_task_count(&self) -> usize {
        self.inner.get_task_count()
    }

    pub fn get_ever_pool_size(&self) -> usize {
        self.inner.get_ever_pool_size()
    }

    pub fn get_core_pool_size(&self) -> usize {
        self.inner.get_core_pool_size()
    }

    pub fn set_rejected_execution_handler(&self, policy: Box<dyn RejectionPolicy>) {
        self.inner.set_rejected_execution_handler(policy);
    }
}

impl std::fmt::Display for FixedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::fmt::Debug for FixedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedExecutor").field("state", &self.to_string()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_and_max_size_are_forced_equal() {
        let pool = FixedExecutor::new(4, "fx-").unwrap();
        pool.pre_start_core_threads().unwrap();
        assert_eq!(pool.inner.get_core_pool_size(), 4);
        pool.shutdown();
        pool.stop();
    }

    #[test]
    fn runs_submitted_work() {
        let pool = FixedExecutor::new(2, "fx-").unwrap();
        let future = pool.submit(|| 7).unwrap();
        assert_eq!(future.join().unwrap(), 7);
        pool.shutdown();
        pool.stop();
    }
}
