//! The atomic control word: run-state packed into the high 3 bits and
//! worker count packed into the low 29 bits of a single `i32`, exactly
//! mirroring `examples/original_source/include/threadpoolexecutor.hpp`'s
//! `ctl_` bit layout (signed so `RUNNING` sorts below every other state).

use std::sync::atomic::{AtomicI32, Ordering};

pub const COUNT_BITS: u32 = 29;
pub const CAPACITY: i32 = (1 << COUNT_BITS) - 1;

const RUNNING: i32 = -1 << COUNT_BITS;
const SHUTDOWN: i32 = 0;
const STOP: i32 = 1 << COUNT_BITS;
const TIDYING: i32 = 2 << COUNT_BITS;
const TERMINATED: i32 = 3 << COUNT_BITS;

/// Lifecycle state, in the order the control word's high bits sort them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunState {
    Running,
    Shutdown,
    Stop,
    Tidying,
    Terminated,
}

impl RunState {
    fn from_raw(rs: i32) -> Self {
        match rs {
            RUNNING => RunState::Running,
            SHUTDOWN => RunState::Shutdown,
            STOP => RunState::Stop,
            TIDYING => RunState::Tidying,
            TERMINATED => RunState::Terminated,
            _ => unreachable!("control word run-state bits out of range: {rs:#x}"),
        }
    }

    fn to_raw(self) -> i32 {
        match self {
            RunState::Running => RUNNING,
            RunState::Shutdown => SHUTDOWN,
            RunState::Stop => STOP,
            RunState::Tidying => TIDYING,
            RunState::Terminated => TERMINATED,
        }
    }
}

fn run_state_of(c: i32) -> i32 {
    c & !CAPACITY
}

fn worker_count_of(c: i32) -> i32 {
    c & CAPACITY
}

fn ctl_of(rs: i32, wc: i32) -> i32 {
    rs | wc
}

/// The atomic control word shared by every executor variant.
#[derive(Debug)]
pub struct Ctl(AtomicI32);

impl Ctl {
    pub fn new_running() -> Self {
        Ctl(AtomicI32::new(ctl_of(RUNNING, 0)))
    }

    pub fn load(&self, order: Ordering) -> i32 {
        self.0.load(order)
    }

    pub fn run_state(&self, order: Ordering) -> RunState {
        RunState::from_raw(run_state_of(self.load(order)))
    }

    pub fn worker_count(&self, order: Ordering) -> usize {
        worker_count_of(self.load(order)) as usize
    }

    /// `compareAndIncrementWorkerCount`.
    pub fn compare_and_increment_worker_count(&self, expect: i32) -> bool {
        self.0
            .compare_exchange(expect, expect + 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `compareAndDecrementWorkerCount`.
    pub fn compare_and_decrement_worker_count(&self, expect: i32) -> bool {
        self.0
            .compare_exchange(expect, expect - 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Spin-CAS decrement used by every worker-exit path.
    pub fn decrement_worker_count(&self) {
        loop {
            let c = self.load(Ordering::Acquire);
            if self.compare_and_decrement_worker_count(c) {
                return;
            }
        }
    }

    /// Monotone, idempotent: no-op if the current state is already at or
    /// past `target`.
    pub fn advance_run_state(&self, target: RunState) {
        loop {
            let c = self.load(Ordering::Acquire);
            if RunState::from_raw(run_state_of(c)) >= target {
                return;
            }
            let next = ctl_of(target.to_raw(), worker_count_of(c));
            if self
                .0
                .compare_exchange(c, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
        }
    }

    /// Attempts `current -> (Tidying, 0)`; used by `try_terminate` once
    /// `worker_count` has reached 0.
    pub fn compare_exchange_to_tidying(&self, current: i32) -> bool {
        self.0
            .compare_exchange(
                current,
                ctl_of(RunState::Tidying.to_raw(), 0),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn store_terminated(&self) {
        self.0
            .store(ctl_of(RunState::Terminated.to_raw(), 0), Ordering::Release);
    }
}
