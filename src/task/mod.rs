//! Task descriptions and their composition primitives.
//!
//! A [`Task<A>`] is an immutable description of a computation producing an
//! `A`. Stepping a task evaluates one thunk and yields a [`Step`]: either a
//! terminal value or a scheduling node the driver must interpret (fork,
//! yield, sleep, lock construction). All sequencing combinators commute past
//! the scheduling nodes, so a driver only ever has to understand the five
//! step shapes.
//!
//! # Purity
//!
//! Construction is side-effect free: anything effectful lives behind a
//! [`Task::delay`] or [`Task::from_fn`] thunk and runs only when the driver
//! steps the node. Stepping consumes the description — ownership makes the
//! single-use discipline structural rather than conventional.
//!
//! # Failure
//!
//! A step that panics is a failed task. [`Task::catch`] intercepts the
//! unwind (trapped with `catch_unwind`, the same way the drivers isolate
//! task panics); [`Task::finally`] runs a finalizer on both the success and
//! the failure path; an unhandled failure aborts the whole run.
//!
//! # Example
//!
//! ```ignore
//! use rendez::task::{self, Task};
//!
//! let greeting = Task::ready(40)
//!     .bind(|n| Task::delay(move || Task::ready(n + 2)))
//!     .map(|n| format!("answer: {n}"));
//! ```

use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::Failure;
use crate::sync::{Lock, Release};

/// Callback through which the scheduler hands a freshly built lock to the
/// task that requested it.
pub type LockAssign = Box<dyn FnOnce(Lock) + Send + 'static>;

/// The result of stepping a task once.
///
/// Everything except `Done` is a scheduling node: the driver interprets it
/// and re-queues the embedded continuation.
pub enum Step<A> {
    /// The task finished with a value.
    Done(A),
    /// Spawn the first task as a sibling and continue with the second.
    Fork(Task<()>, Task<A>),
    /// Relinquish control voluntarily; resume with the continuation later.
    Yield(Task<A>),
    /// Resume the continuation no earlier than the duration from now.
    Sleep(Duration, Task<A>),
    /// Ask the scheduler for a fresh, backend-appropriate lock. The lock is
    /// passed to the callback before the continuation runs.
    NewLock(LockAssign, Task<A>),
}

/// An immutable description of a computation producing an `A`.
///
/// See the [module docs](self) for the model. Tasks are inert until handed
/// to one of the drivers in [`crate::runtime`].
pub struct Task<A> {
    thunk: Box<dyn FnOnce() -> Step<A> + Send + 'static>,
}

impl<A> Task<A> {
    /// Builds a task from a raw step thunk.
    ///
    /// This is the primitive the other constructors reduce to. The thunk
    /// must not have observable effects at construction time; they belong
    /// inside the closure.
    pub fn from_fn(f: impl FnOnce() -> Step<A> + Send + 'static) -> Self {
        Self { thunk: Box::new(f) }
    }

    /// Evaluates one step of the task, consuming the description.
    ///
    /// Drivers call this; user code rarely needs to.
    #[must_use]
    pub fn step(self) -> Step<A> {
        (self.thunk)()
    }
}

impl<A: Send + 'static> Task<A> {
    /// A task that immediately finishes with `value`.
    #[must_use]
    pub fn ready(value: A) -> Self {
        Self::from_fn(move || Step::Done(value))
    }

    /// Defers construction of a task until it is stepped.
    ///
    /// Every control structure whose continuation is not literally at hand
    /// is built through `delay`, so its effects cannot leak out of
    /// construction.
    pub fn delay(f: impl FnOnce() -> Self + Send + 'static) -> Self {
        Self::from_fn(move || f().step())
    }

    /// Sequential composition: run `self`, feed its result to `k`.
    ///
    /// `bind` commutes past every scheduling node, so forks, yields, sleeps
    /// and lock requests inside `self` surface to the driver unchanged.
    pub fn bind<B, K>(self, k: K) -> Task<B>
    where
        B: Send + 'static,
        K: FnOnce(A) -> Task<B> + Send + 'static,
    {
        Task::from_fn(move || match self.step() {
            Step::Done(value) => k(value).step(),
            Step::Fork(child, next) => Step::Fork(child, next.bind(k)),
            Step::Yield(next) => Step::Yield(next.bind(k)),
            Step::Sleep(dur, next) => Step::Sleep(dur, next.bind(k)),
            Step::NewLock(assign, next) => Step::NewLock(assign, next.bind(k)),
        })
    }

    /// Applies a function to the task's result.
    pub fn map<B, F>(self, f: F) -> Task<B>
    where
        B: Send + 'static,
        F: FnOnce(A) -> B + Send + 'static,
    {
        self.bind(move |value| Task::ready(f(value)))
    }

    /// Sequences another task after this one, discarding this result.
    pub fn then<B: Send + 'static>(self, next: Task<B>) -> Task<B> {
        self.bind(move |_| next)
    }

    /// Intercepts a failure raised while stepping `self` or any of its
    /// continuations, switching to `handler`.
    ///
    /// The handler is pushed transparently into every scheduling node, so a
    /// task may fork, yield, or sleep any number of times before failing and
    /// the failure is still caught. A failure raised by the handler itself
    /// is not re-caught here.
    pub fn catch<H>(self, handler: H) -> Self
    where
        H: FnOnce(Failure) -> Self + Send + 'static,
    {
        Self::from_fn(move || match catch_unwind(AssertUnwindSafe(|| self.step())) {
            Ok(Step::Done(value)) => Step::Done(value),
            Ok(Step::Fork(child, next)) => Step::Fork(child, next.catch(handler)),
            Ok(Step::Yield(next)) => Step::Yield(next.catch(handler)),
            Ok(Step::Sleep(dur, next)) => Step::Sleep(dur, next.catch(handler)),
            Ok(Step::NewLock(assign, next)) => Step::NewLock(assign, next.catch(handler)),
            Err(payload) => handler(Failure::from_panic(payload)).step(),
        })
    }

    /// Runs `fin` exactly once after `self`, on the success path and the
    /// failure path alike. On failure the original unwind resumes after the
    /// finalizer completes.
    pub fn finally(self, fin: Task<()>) -> Self {
        Self::from_fn(move || match catch_unwind(AssertUnwindSafe(|| self.step())) {
            Ok(Step::Done(value)) => fin.map(move |()| value).step(),
            Ok(Step::Fork(child, next)) => Step::Fork(child, next.finally(fin)),
            Ok(Step::Yield(next)) => Step::Yield(next.finally(fin)),
            Ok(Step::Sleep(dur, next)) => Step::Sleep(dur, next.finally(fin)),
            Ok(Step::NewLock(assign, next)) => Step::NewLock(assign, next.finally(fin)),
            Err(payload) => fin
                .bind(move |()| Task::from_fn(move || resume_unwind(payload)))
                .step(),
        })
    }
}

/// Spawns `child` as a sibling task and continues immediately.
///
/// Under the cooperative driver the forking task keeps running and the
/// child is appended behind all currently-pending work; this ordering is
/// part of the public contract. The parallel driver runs both concurrently
/// and joins the child before the whole fork node is considered complete.
pub fn fork(child: Task<()>) -> Task<()> {
    Task::from_fn(move || Step::Fork(child, Task::ready(())))
}

/// Relinquishes control for one scheduling turn.
#[must_use]
pub fn yield_now() -> Task<()> {
    Task::from_fn(|| Step::Yield(Task::ready(())))
}

/// Suspends the task for at least `dur`. Other tasks run meanwhile.
#[must_use]
pub fn sleep(dur: Duration) -> Task<()> {
    Task::from_fn(move || Step::Sleep(dur, Task::ready(())))
}

/// Requests a fresh lock from the scheduler.
///
/// The returned lock's flavor matches the driver: a cooperative FIFO under
/// the single-threaded driver, a blocking semaphore under the parallel one.
#[must_use]
pub fn new_lock() -> Task<Lock> {
    Task::from_fn(|| {
        let slot: Arc<Mutex<Option<Lock>>> = Arc::new(Mutex::new(None));
        let assign_slot = Arc::clone(&slot);
        Step::NewLock(
            Box::new(move |lock| {
                *assign_slot.lock() = Some(lock);
            }),
            Task::from_fn(move || {
                let lock = slot
                    .lock()
                    .take()
                    .expect("scheduler assigns the lock before running the continuation");
                Step::Done(lock)
            }),
        )
    })
}

/// A task that fails with `message` when stepped.
pub fn fail<A: Send + 'static>(message: impl Into<String> + Send + 'static) -> Task<A> {
    Task::from_fn(move || std::panic::panic_any(message.into()))
}

/// Scoped acquisition: runs `body` with the resource and releases it exactly
/// once on the way out, whether `body` completes or fails.
pub fn using<R, A, F>(resource: Task<R>, body: F) -> Task<A>
where
    R: Release + Send + 'static,
    A: Send + 'static,
    F: FnOnce(R) -> Task<A> + Send + 'static,
{
    resource.bind(move |r| {
        let fin = r.release();
        body(r).finally(fin)
    })
}

/// Loops `body` while `pred` returns true.
pub fn repeat_while<P, B>(mut pred: P, mut body: B) -> Task<()>
where
    P: FnMut() -> bool + Send + 'static,
    B: FnMut() -> Task<()> + Send + 'static,
{
    Task::delay(move || {
        if pred() {
            body().bind(move |()| repeat_while(pred, body))
        } else {
            Task::ready(())
        }
    })
}

/// Runs `f` over every item of `iter`, in order.
pub fn for_each<I, T, F>(iter: I, f: F) -> Task<()>
where
    I: IntoIterator<Item = T> + Send + 'static,
    I::IntoIter: Send + 'static,
    T: Send + 'static,
    F: FnMut(T) -> Task<()> + Send + 'static,
{
    Task::delay(move || drain(iter.into_iter(), f))
}

fn drain<It, T, F>(mut it: It, mut f: F) -> Task<()>
where
    It: Iterator<Item = T> + Send + 'static,
    T: Send + 'static,
    F: FnMut(T) -> Task<()> + Send + 'static,
{
    Task::delay(move || match it.next() {
        Some(item) => f(item).bind(move |()| drain(it, f)),
        None => Task::ready(()),
    })
}
