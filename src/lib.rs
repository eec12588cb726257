//! In-process worker-pool executors: a plain pool, a work-stealing pool, a
//! scheduled/timer pool, and a fixed variant, all built on one shared
//! control-word lifecycle core. See `SPEC_FULL.md` for the full design.

#![cfg_attr(not(test), deny(clippy::unwrap_in_result))]

mod config;
mod core_executor;
mod ctl;
mod error;
mod fixed;
mod logging;
mod queue;
mod rejection;
mod scheduled;
mod semaphore;
mod task;
mod thread_ident;
mod work_stealing;
mod worker;

pub use config::PoolConfig;
pub use core_executor::Executor;
pub use ctl::RunState;
pub use error::PoolError;
pub use fixed::FixedExecutor;
pub use rejection::{AbortPolicy, CallerRunsPolicy, DiscardPolicy, RejectionPolicy};
pub use scheduled::{FixedRateHandle, ScheduledExecutor};
pub use task::JoinFuture;
pub use thread_ident::{get_current_thread_name, set_current_thread_name};
pub use work_stealing::WorkStealingExecutor;
