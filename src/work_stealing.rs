//! C6 — the work-stealing variant. Shares every piece of `PoolCore`
//! (control word, submission path, shutdown machine) with the plain
//! executor; the only behavioral difference is `DispatchStyle::WorkStealing`,
//! which makes each worker loop also probe its one neighbor queue
//! `(own_index + 1) mod queue_count` before parking, per `SPEC_FULL.md`
//! §4.6 — a single hop, no randomized victim selection, matching the
//! distilled spec's explicit Non-goal against a full deque-based
//! Chase-Lev stealer.

use crate::core_executor::{DispatchStyle, PoolCore};
use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::rejection::{AbortPolicy, RejectionPolicy};
use crate::task::JoinFuture;
use std::sync::Arc;

pub struct WorkStealingExecutor {
    core: Arc<PoolCore>,
}

impl WorkStealingExecutor {
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
        Ok(WorkStealingExecutor {
            core: PoolCore::new(config, rejection_policy, DispatchStyle::WorkStealing),
        })
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

    pub fn pre_start_core_threads(&self) -> Result<usize, PoolError> {
        self.core.pre_start_core_threads()
    }

    pub fn set_max_pool_size(&self, n: usize) {
        self.core.set_max_pool_size(n);
    }

    pub fn release_non_core_threads(&self) {
        self.core.release_non_core_threads();
    }

    pub fn keep_non_core_thread_alive(&self, value: bool) {
        self.core.keep_non_core_thread_alive(value);
    }

    pub fn set_rejected_execution_handler(&self, policy: Box<dyn RejectionPolicy>) {
        self.core.set_rejection_policy(policy);
    }

    pub fn get_ever_pool_size(&self) -> usize {
        self.core.get_ever_pool_size()
    }

    pub fn get_core_pool_size(&self) -> usize {
        self.core.get_core_pool_size()
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

    pub fn get_task_count(&self) -> usize {
        self.core.get_task_count()
    }
}

impl std::fmt::Display for WorkStealingExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.core)
    }
}

impl std::fmt::Debug for WorkStealingExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkStealingExecutor").field("state", &self.to_string()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn a_busy_worker_s_queue_drains_via_its_idle_neighbor() {
        let pool = WorkStealingExecutor::new(2, 2, "ws-").unwrap();
        pool.pre_start_core_threads().unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let order = Arc::new(Mutex::new(Vec::new()));
        let started = Arc::new(AtomicUsize::new(0));

        // Pin five short tasks onto worker 0's own queue via repeated
        // `execute` calls while it is already busy with a longer task;
        // the idle neighbor (worker 1) should steal and run some of them.
        let busy_order = Arc::clone(&order);
        pool.execute(move || {
            std::thread::sleep(Duration::from_millis(50));
            busy_order.lock().unwrap().push(usize::MAX);
        })
        .unwrap();
        std::thread::sleep(Duration::from_millis(5));

        for i in 0..5 {
            let order = Arc::clone(&order);
            let started = Arc::clone(&started);
            pool.execute_with(
                move || {
                    started.fetch_add(1, Ordering::SeqCst);
                    order.lock().unwrap().push(i);
                },
                true,
            )
            .unwrap();
        }

        for _ in 0..200 {
            if started.load(Ordering::SeqCst) == 5 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(started.load(Ordering::SeqCst), 5);
        pool.shutdown();
        pool.stop();
    }

    #[test]
    fn construction_rejects_bad_bounds() {
        assert!(WorkStealingExecutor::new(2, 1, "ws-").is_err());
    }
}
