//! The single-threaded cooperative driver.
//!
//! One OS thread owns a FIFO ready-queue of continuations. Each tick pops
//! the front task and steps it once:
//!
//! - `Done` drops the continuation;
//! - `Fork` pushes the parent's continuation to the **front** and appends
//!   the child to the **back** — the forker keeps going, the child lines up
//!   behind all pending work (this ordering is part of the public contract);
//! - `Yield` appends the continuation to the back;
//! - `Sleep` becomes a poll-the-clock/yield spin until the deadline;
//! - `NewLock` constructs a cooperative FIFO lock and continues at the
//!   front.
//!
//! The run ends when the queue empties. A task panic anywhere aborts the
//! run with that failure.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::error::Failure;
use crate::runtime::{Clock, MonotonicClock};
use crate::sync::Lock;
use crate::task::{Step, Task};
use crate::tracing_compat::debug;

/// The cooperative driver. Holds the clock used to resolve sleeps.
pub struct CoopScheduler {
    clock: Arc<dyn Clock>,
}

impl CoopScheduler {
    /// Creates a driver over the monotonic system clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clock: Arc::new(MonotonicClock),
        }
    }

    /// Creates a driver over a caller-supplied clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Drives `task` (and everything it forks) to completion.
    ///
    /// Returns the root task's value, or the failure that aborted the run.
    pub fn run<A: Send + 'static>(&self, task: Task<A>) -> Result<A, Failure> {
        let slot: Arc<Mutex<Option<A>>> = Arc::new(Mutex::new(None));
        let root = {
            let slot = Arc::clone(&slot);
            task.map(move |value| {
                *slot.lock() = Some(value);
            })
        };

        let mut ready: VecDeque<Task<()>> = VecDeque::new();
        ready.push_back(root);
        let mut ticks: u64 = 0;

        while let Some(task) = ready.pop_front() {
            ticks += 1;
            match catch_unwind(AssertUnwindSafe(|| task.step())) {
                Ok(Step::Done(())) => {}
                Ok(Step::Fork(child, next)) => {
                    ready.push_front(next);
                    ready.push_back(child);
                }
                Ok(Step::Yield(next)) => ready.push_back(next),
                Ok(Step::Sleep(dur, next)) => {
                    let deadline = self.clock.now() + dur;
                    ready.push_front(sleep_spin(Arc::clone(&self.clock), deadline, next));
                }
                Ok(Step::NewLock(assign, next)) => {
                    assign(Lock::cooperative());
                    ready.push_front(next);
                }
                Err(payload) => return Err(Failure::from_panic(payload)),
            }
        }

        debug!(ticks, "cooperative run finished");
        let value = slot
            .lock()
            .take()
            .expect("ready queue drained before the root task finished");
        Ok(value)
    }
}

impl Default for CoopScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `task` on a fresh cooperative driver with the monotonic clock.
pub fn run<A: Send + 'static>(task: Task<A>) -> Result<A, Failure> {
    CoopScheduler::new().run(task)
}

fn sleep_spin(clock: Arc<dyn Clock>, deadline: Instant, next: Task<()>) -> Task<()> {
    Task::from_fn(move || {
        if clock.now() >= deadline {
            next.step()
        } else {
            Step::Yield(sleep_spin(clock, deadline, next))
        }
    })
}
