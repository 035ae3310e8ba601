//! Scheduler-flavored mutual exclusion.
//!
//! A [`Lock`] is constructed by the driver in response to a
//! [`new_lock`](crate::task::new_lock) step, in the flavor that matches the
//! driver:
//!
//! - the cooperative driver builds a **FIFO token queue**: acquiring
//!   enqueues a fresh token and spin-yields until the token reaches the
//!   head, so grants follow the order the scheduler observed the acquires;
//! - the parallel driver builds a **blocking lock** over
//!   [`Semaphore`](crate::sync::Semaphore), parking the worker thread.
//!
//! Acquisition is a task (`lock.acquire()` suspends until granted) and so is
//! release: the returned [`LockGuard`] satisfies the [`Release`] contract,
//! which is what [`task::using`](crate::task::using) consumes to guarantee
//! release on every exit path. Releasing a guard twice is a programming
//! error and panics.

use core::fmt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex as ParkingMutex;

use crate::sync::Semaphore;
use crate::task::{Step, Task};
use crate::tracing_compat::trace;

/// A resource whose release is itself a task.
///
/// [`task::using`](crate::task::using) runs `release` exactly once on every
/// exit path, including failure.
pub trait Release {
    /// Builds the task that releases this resource.
    fn release(&self) -> Task<()>;
}

trait LockCore: Send + Sync {
    fn acquire(self: Arc<Self>) -> Task<LockGuard>;
    fn try_acquire(self: Arc<Self>) -> Option<LockGuard>;
    fn release(&self, token: u64);
    fn is_held(&self) -> bool;
    fn waiters(&self) -> usize;
}

/// A mutual-exclusion handle produced by the scheduler.
///
/// Cloning yields another handle to the same lock.
#[derive(Clone)]
pub struct Lock {
    core: Arc<dyn LockCore>,
}

impl Lock {
    /// Builds the cooperative FIFO flavor. Used by the single-threaded
    /// driver.
    pub(crate) fn cooperative() -> Self {
        Self {
            core: Arc::new(FifoLock::new()),
        }
    }

    /// Builds the blocking flavor. Used by the parallel driver.
    pub(crate) fn blocking() -> Self {
        Self {
            core: Arc::new(SemLock::new()),
        }
    }

    /// Acquires the lock, suspending the calling task until granted.
    #[must_use]
    pub fn acquire(&self) -> Task<LockGuard> {
        Arc::clone(&self.core).acquire()
    }

    /// Attempts to acquire the lock without waiting.
    #[must_use]
    pub fn try_acquire(&self) -> Task<Option<LockGuard>> {
        let core = Arc::clone(&self.core);
        Task::from_fn(move || Step::Done(core.try_acquire()))
    }

    /// Returns true if some task currently holds the lock.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.core.is_held()
    }

    /// Returns the number of acquires waiting behind the current holder.
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.core.waiters()
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock")
            .field("held", &self.is_held())
            .field("waiters", &self.waiters())
            .finish()
    }
}

/// Proof of lock ownership; release it with [`Release::release`] or let
/// [`task::using`](crate::task::using) do so.
pub struct LockGuard {
    core: Arc<dyn LockCore>,
    token: u64,
}

impl Release for LockGuard {
    fn release(&self) -> Task<()> {
        let core = Arc::clone(&self.core);
        let token = self.token;
        Task::from_fn(move || {
            core.release(token);
            Step::Done(())
        })
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").field("token", &self.token).finish()
    }
}

// ---------------------------------------------------------------------------
// Cooperative FIFO flavor
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct FifoState {
    queue: VecDeque<u64>,
    next_token: u64,
}

struct FifoLock {
    state: ParkingMutex<FifoState>,
}

impl FifoLock {
    fn new() -> Self {
        Self {
            state: ParkingMutex::new(FifoState {
                queue: VecDeque::with_capacity(4),
                next_token: 0,
            }),
        }
    }

    fn enqueue(&self) -> u64 {
        let mut state = self.state.lock();
        let token = state.next_token;
        state.next_token += 1;
        state.queue.push_back(token);
        token
    }
}

impl LockCore for FifoLock {
    fn acquire(self: Arc<Self>) -> Task<LockGuard> {
        Task::from_fn(move || {
            let token = self.enqueue();
            wait_turn(self, token).step()
        })
    }

    fn try_acquire(self: Arc<Self>) -> Option<LockGuard> {
        let mut state = self.state.lock();
        if state.queue.is_empty() {
            let token = state.next_token;
            state.next_token += 1;
            state.queue.push_back(token);
            drop(state);
            Some(LockGuard { core: self, token })
        } else {
            None
        }
    }

    fn release(&self, token: u64) {
        let mut state = self.state.lock();
        match state.queue.front() {
            Some(&head) if head == token => {
                state.queue.pop_front();
            }
            _ => panic!("lock released twice or by a non-holder"),
        }
    }

    fn is_held(&self) -> bool {
        !self.state.lock().queue.is_empty()
    }

    fn waiters(&self) -> usize {
        self.state.lock().queue.len().saturating_sub(1)
    }
}

fn wait_turn(lock: Arc<FifoLock>, token: u64) -> Task<LockGuard> {
    Task::from_fn(move || {
        let at_head = lock.state.lock().queue.front() == Some(&token);
        if at_head {
            trace!(token, "fifo lock granted");
            Step::Done(LockGuard { core: lock, token })
        } else {
            Step::Yield(wait_turn(lock, token))
        }
    })
}

// ---------------------------------------------------------------------------
// Blocking flavor
// ---------------------------------------------------------------------------

struct SemLock {
    sem: Semaphore,
    held: AtomicBool,
}

impl SemLock {
    fn new() -> Self {
        Self {
            sem: Semaphore::new(1),
            held: AtomicBool::new(false),
        }
    }
}

impl LockCore for SemLock {
    fn acquire(self: Arc<Self>) -> Task<LockGuard> {
        Task::from_fn(move || {
            self.sem.acquire();
            self.held.store(true, Ordering::SeqCst);
            trace!("blocking lock granted");
            Step::Done(LockGuard {
                core: self,
                token: 0,
            })
        })
    }

    fn try_acquire(self: Arc<Self>) -> Option<LockGuard> {
        if self.sem.try_acquire() {
            self.held.store(true, Ordering::SeqCst);
            Some(LockGuard {
                core: self,
                token: 0,
            })
        } else {
            None
        }
    }

    fn release(&self, _token: u64) {
        assert!(
            self.held.swap(false, Ordering::SeqCst),
            "lock released twice or by a non-holder"
        );
        self.sem.release();
    }

    fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    fn waiters(&self) -> usize {
        self.sem.waiters()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cooperative;
    use crate::task;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_fifo_uncontended_acquire() {
        let program = task::new_lock().bind(|lock| {
            let probe = lock.clone();
            task::using(lock.acquire(), move |_guard| {
                assert!(probe.is_held());
                Task::ready(())
            })
            .map(move |()| lock)
        });
        let lock = cooperative::run(program).expect("run failed");
        assert!(!lock.is_held());
    }

    #[test]
    fn test_fifo_grant_order_matches_request_order() {
        let order = Arc::new(ParkingMutex::new(Vec::new()));
        let program = task::new_lock().bind({
            let order = Arc::clone(&order);
            move |lock| {
                let mut spawned = Task::ready(());
                for id in 0..3 {
                    let lock = lock.clone();
                    let order = Arc::clone(&order);
                    spawned = spawned.then(task::fork(task::using(
                        lock.acquire(),
                        move |_guard| {
                            order.lock().push(id);
                            task::yield_now()
                        },
                    )));
                }
                spawned
            }
        });
        cooperative::run(program).expect("run failed");
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_using_releases_on_failure() {
        let reacquired = Arc::new(AtomicBool::new(false));
        let program = task::new_lock().bind({
            let reacquired = Arc::clone(&reacquired);
            move |lock| {
                let after = lock.clone();
                task::using(lock.acquire(), |_guard| task::fail::<()>("inside")).catch(
                    move |_| {
                        // The failure path released the lock, so a fresh
                        // try_acquire succeeds.
                        let reacquired = Arc::clone(&reacquired);
                        after.try_acquire().map(move |guard| {
                            reacquired.store(guard.is_some(), Ordering::SeqCst);
                        })
                    },
                )
            }
        });
        cooperative::run(program).expect("run failed");
        assert!(reacquired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_double_release_panics() {
        let program = task::new_lock().bind(|lock| {
            lock.acquire().bind(|guard| {
                let again = guard.release();
                guard.release().then(again)
            })
        });
        let err = cooperative::run(program).unwrap_err();
        assert!(err.message().is_some_and(|m| m.contains("released twice")));
    }

    #[test]
    fn test_mutual_exclusion_under_cooperative_driver() {
        let active = Arc::new(AtomicUsize::new(0));
        let observed_overlap = Arc::new(AtomicBool::new(false));
        let program = task::new_lock().bind({
            let active = Arc::clone(&active);
            let overlap = Arc::clone(&observed_overlap);
            move |lock| {
                let mut spawned = Task::ready(());
                for _ in 0..4 {
                    let lock = lock.clone();
                    let active = Arc::clone(&active);
                    let overlap = Arc::clone(&overlap);
                    spawned = spawned.then(task::fork(task::using(
                        lock.acquire(),
                        move |_guard| {
                            let enter = Arc::clone(&active);
                            let exit = Arc::clone(&active);
                            let overlap = Arc::clone(&overlap);
                            Task::delay(move || {
                                if enter.fetch_add(1, Ordering::SeqCst) != 0 {
                                    overlap.store(true, Ordering::SeqCst);
                                }
                                task::yield_now()
                            })
                            .bind(move |()| {
                                exit.fetch_sub(1, Ordering::SeqCst);
                                Task::ready(())
                            })
                        },
                    )));
                }
                spawned
            }
        });
        cooperative::run(program).expect("run failed");
        assert!(!observed_overlap.load(Ordering::SeqCst));
    }
}
