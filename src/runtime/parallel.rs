//! The multi-threaded driver.
//!
//! Maps the step language directly onto OS threads: a `Fork` spawns the
//! child on its own thread and joins it after the parent's continuation
//! finishes, so the fork node completes only when both sides have; `Yield`
//! hints the OS scheduler; `Sleep` sleeps the worker; `NewLock` hands out a
//! blocking semaphore-backed lock. Observable sync/send/receive semantics
//! are identical to the cooperative driver's — only parallelism and timing
//! differ.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use crate::error::Failure;
use crate::sync::Lock;
use crate::task::{Step, Task};
use crate::tracing_compat::trace;

/// The parallel driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParallelScheduler;

impl ParallelScheduler {
    /// Creates the driver. It holds no state; sleeps use the OS clock.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Drives `task` to completion, spawning a thread per fork.
    pub fn run<A>(&self, task: Task<A>) -> Result<A, Failure> {
        drive(task)
    }
}

/// Runs `task` on the parallel driver.
pub fn run<A>(task: Task<A>) -> Result<A, Failure> {
    drive(task)
}

fn drive<A>(mut task: Task<A>) -> Result<A, Failure> {
    loop {
        task = match catch_unwind(AssertUnwindSafe(|| task.step())) {
            Ok(Step::Done(value)) => return Ok(value),
            Ok(Step::Fork(child, next)) => {
                trace!("forking worker thread");
                let handle = thread::spawn(move || drive(child));
                let parent = drive(next);
                let child = match handle.join() {
                    Ok(outcome) => outcome,
                    Err(payload) => Err(Failure::from_panic(payload)),
                };
                return match (parent, child) {
                    (Ok(value), Ok(())) => Ok(value),
                    (Err(failure), _) | (_, Err(failure)) => Err(failure),
                };
            }
            Ok(Step::Yield(next)) => {
                thread::yield_now();
                next
            }
            Ok(Step::Sleep(dur, next)) => {
                thread::sleep(dur);
                next
            }
            Ok(Step::NewLock(assign, next)) => {
                assign(Lock::blocking());
                next
            }
            Err(payload) => return Err(Failure::from_panic(payload)),
        };
    }
}
