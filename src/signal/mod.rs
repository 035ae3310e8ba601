//! First-class synchronous events.
//!
//! A [`Signal<A>`] describes an event that, when it fires, produces an `A`.
//! Signals are inert values: nothing happens until a task
//! [`sync`](Signal::sync)s one. They compose — [`Signal::map`] rewrites the
//! produced value, [`Signal::defer`] delays construction, and
//! [`choose`](crate::combinator::choose) selects among alternatives — and
//! composition never commits to anything.
//!
//! # The trio
//!
//! Every signal is three operations ([`SignalCore`]):
//!
//! - **poll** — a side-effect-free probe: could the signal commit right now?
//! - **commit** — an atomic attempt to consume the event, run under the
//!   signal's own serialization (a channel's lock, for instance). `Some` on
//!   success, `None` if the event can no longer fire this way.
//! - **block** — installs a subscription so a *future* firing can complete
//!   the sync: the firing path settles the claim cell and calls the
//!   delivery callback.
//!
//! Poll exists so the common fast path (a counterparty is already waiting)
//! skips subscription bookkeeping entirely; commit lets an in-progress
//! firing consume the counterparty atomically; block hands responsibility
//! to whoever fires next.
//!
//! # Syncing
//!
//! [`Signal::sync`] is the commitment protocol: poll, then commit on the
//! fast path; otherwise allocate a fresh [`Claim`] and a result slot, block
//! the signal against them, and yield until a delivery fills the slot.
//! Because every branch of a selection blocks against the *same* claim
//! cell, at most one branch can ever deliver.

mod claim;

pub use claim::{Claim, ClaimState};

use std::sync::Arc;

use parking_lot::Mutex;

use crate::task::{Step, Task};

/// Delivery callback a firing path invokes with the produced value.
pub type Deliver<A> = Arc<dyn Fn(A) + Send + Sync>;

/// The three primitive operations every signal implements.
///
/// Library signals (channels, deadlines) implement this; user code can too,
/// as long as it honors the claim protocol: settle the claim with a
/// successful CAS *before* delivering, and never deliver through a claim
/// someone else settled.
pub trait SignalCore<A>: Send + Sync {
    /// Best-effort, side-effect-free readiness probe.
    fn poll(&self) -> bool;

    /// Atomic attempt to consume the event now.
    fn commit(self: Arc<Self>) -> Task<Option<A>>;

    /// Installs a subscription for a future firing.
    fn block(self: Arc<Self>, claim: Arc<Claim>, deliver: Deliver<A>) -> Task<()>;
}

/// A composable description of a synchronous event producing an `A`.
pub struct Signal<A> {
    core: Arc<dyn SignalCore<A>>,
}

impl<A> Clone for Signal<A> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<A: Send + 'static> Signal<A> {
    /// Wraps a [`SignalCore`] implementation.
    #[must_use]
    pub fn new(core: Arc<dyn SignalCore<A>>) -> Self {
        Self { core }
    }

    /// A signal that is always ready and fires with `value`.
    ///
    /// Single-use: the value is consumed by the first successful firing.
    #[must_use]
    pub fn always(value: A) -> Self {
        Self::new(Arc::new(Always {
            value: Mutex::new(Some(value)),
        }))
    }

    /// A signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        Self::new(Arc::new(Never))
    }

    /// Rewrites the value this signal produces.
    #[must_use]
    pub fn map<B, F>(self, f: F) -> Signal<B>
    where
        B: Send + 'static,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        Signal::new(Arc::new(MapCore {
            inner: self,
            f: Arc::new(f),
        }))
    }

    /// Delays construction of a signal until it is first used, then
    /// memoizes it. All three operations forward to the produced signal.
    ///
    /// Needed so composing signals (a deadline inside a selection, say)
    /// does not force their construction at composition time.
    #[must_use]
    pub fn defer(thunk: impl FnOnce() -> Self + Send + 'static) -> Self {
        Self::new(Arc::new(DeferCore {
            state: Mutex::new(DeferState::Thunk(Some(Box::new(thunk)))),
        }))
    }

    /// Side-effect-free readiness probe.
    #[must_use]
    pub fn poll(&self) -> bool {
        self.core.poll()
    }

    /// Atomic attempt to consume the event now.
    #[must_use]
    pub fn commit(&self) -> Task<Option<A>> {
        Arc::clone(&self.core).commit()
    }

    /// Installs a subscription against `claim`, delivering through
    /// `deliver` when a future firing settles it.
    #[must_use]
    pub fn block(&self, claim: Arc<Claim>, deliver: Deliver<A>) -> Task<()> {
        Arc::clone(&self.core).block(claim, deliver)
    }

    /// Suspends the calling task until the signal fires, producing its
    /// value.
    ///
    /// Fast path: if [`poll`](Self::poll) reports ready, try
    /// [`commit`](Self::commit) directly. Otherwise (or if the commit
    /// raced and returned `None`) install a subscription with a fresh
    /// claim and yield until the delivery lands.
    #[must_use]
    pub fn sync(self) -> Task<A> {
        Task::delay(move || {
            if self.poll() {
                let fallback = self.clone();
                self.commit().bind(move |committed| match committed {
                    Some(value) => Task::ready(value),
                    None => block_and_wait(fallback),
                })
            } else {
                block_and_wait(self)
            }
        })
    }
}

fn block_and_wait<A: Send + 'static>(signal: Signal<A>) -> Task<A> {
    let claim = Arc::new(Claim::new());
    let slot: Arc<Mutex<Option<A>>> = Arc::new(Mutex::new(None));
    let deliver: Deliver<A> = {
        let slot = Arc::clone(&slot);
        Arc::new(move |value| {
            *slot.lock() = Some(value);
        })
    };
    signal
        .block(claim, deliver)
        .bind(move |()| await_slot(slot))
}

fn await_slot<A: Send + 'static>(slot: Arc<Mutex<Option<A>>>) -> Task<A> {
    Task::from_fn(move || {
        let delivered = slot.lock().take();
        match delivered {
            Some(value) => Step::Done(value),
            None => Step::Yield(await_slot(slot)),
        }
    })
}

// ---------------------------------------------------------------------------
// Primitive cores
// ---------------------------------------------------------------------------

struct Always<A> {
    value: Mutex<Option<A>>,
}

impl<A: Send + 'static> SignalCore<A> for Always<A> {
    fn poll(&self) -> bool {
        self.value.lock().is_some()
    }

    fn commit(self: Arc<Self>) -> Task<Option<A>> {
        Task::from_fn(move || Step::Done(self.value.lock().take()))
    }

    fn block(self: Arc<Self>, claim: Arc<Claim>, deliver: Deliver<A>) -> Task<()> {
        fire_always(self, claim, deliver)
    }
}

fn fire_always<A: Send + 'static>(
    core: Arc<Always<A>>,
    claim: Arc<Claim>,
    deliver: Deliver<A>,
) -> Task<()> {
    Task::from_fn(move || {
        if core.value.lock().is_none() {
            return Step::Done(());
        }
        match claim.try_sync() {
            Ok(()) => {
                if let Some(value) = core.value.lock().take() {
                    deliver(value);
                }
                Step::Done(())
            }
            Err(ClaimState::Synced) => Step::Done(()),
            Err(ClaimState::Claimed) => Step::Yield(fire_always(core, claim, deliver)),
            Err(ClaimState::Waiting) => unreachable!("failed CAS cannot observe the from-state"),
        }
    })
}

struct Never;

impl<A: Send + 'static> SignalCore<A> for Never {
    fn poll(&self) -> bool {
        false
    }

    fn commit(self: Arc<Self>) -> Task<Option<A>> {
        Task::ready(None)
    }

    fn block(self: Arc<Self>, _claim: Arc<Claim>, _deliver: Deliver<A>) -> Task<()> {
        Task::ready(())
    }
}

struct MapCore<A, B> {
    inner: Signal<A>,
    f: Arc<dyn Fn(A) -> B + Send + Sync>,
}

impl<A, B> SignalCore<B> for MapCore<A, B>
where
    A: Send + 'static,
    B: Send + 'static,
{
    fn poll(&self) -> bool {
        self.inner.poll()
    }

    fn commit(self: Arc<Self>) -> Task<Option<B>> {
        let f = Arc::clone(&self.f);
        self.inner.commit().map(move |committed| committed.map(|a| f(a)))
    }

    fn block(self: Arc<Self>, claim: Arc<Claim>, deliver: Deliver<B>) -> Task<()> {
        let f = Arc::clone(&self.f);
        let wrapped: Deliver<A> = Arc::new(move |a| deliver(f(a)));
        self.inner.block(claim, wrapped)
    }
}

enum DeferState<A> {
    Thunk(Option<Box<dyn FnOnce() -> Signal<A> + Send>>),
    Ready(Signal<A>),
}

struct DeferCore<A> {
    state: Mutex<DeferState<A>>,
}

impl<A: Send + 'static> DeferCore<A> {
    fn force(&self) -> Signal<A> {
        let mut state = self.state.lock();
        if let DeferState::Ready(signal) = &*state {
            return signal.clone();
        }
        let thunk = match &mut *state {
            DeferState::Thunk(thunk) => thunk.take().expect("defer thunk runs once"),
            DeferState::Ready(_) => unreachable!("checked above"),
        };
        let signal = thunk();
        *state = DeferState::Ready(signal.clone());
        signal
    }
}

impl<A: Send + 'static> SignalCore<A> for DeferCore<A> {
    fn poll(&self) -> bool {
        self.force().poll()
    }

    fn commit(self: Arc<Self>) -> Task<Option<A>> {
        Task::delay(move || self.force().commit())
    }

    fn block(self: Arc<Self>, claim: Arc<Claim>, deliver: Deliver<A>) -> Task<()> {
        Task::delay(move || self.force().block(claim, deliver))
    }
}
