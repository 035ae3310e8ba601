//! Non-deterministic selection among signals.
//!
//! [`choose`] combines two signals into one that fires with whichever
//! becomes available; [`select`] folds a whole list. Both sides of a choose
//! block against the *same* claim cell, which is what makes the selection
//! commit to exactly one branch: the first firing path to settle the cell
//! wins, every other subscription withdraws at its next scan.
//!
//! # Branch order
//!
//! The order in which the two branches are polled, committed, and blocked is
//! randomized once, at construction, so a signal built from the same source
//! never systematically starves its right-hand side. Repeated syncs of one
//! choose instance therefore see a stable order; pin `RENDEZ_SEED` to make
//! the order reproducible across runs.

use std::sync::Arc;

use crate::signal::{Claim, Deliver, Signal, SignalCore};
use crate::task::Task;
use crate::util;

/// Fires with whichever of the two signals becomes available first.
///
/// Commit tries the branches in construction order and stops at the first
/// `Some`; block installs both subscriptions against one shared claim.
#[must_use]
pub fn choose<A: Send + 'static>(a: Signal<A>, b: Signal<A>) -> Signal<A> {
    let (first, second) = if util::coin_flip() { (b, a) } else { (a, b) };
    Signal::new(Arc::new(ChooseCore { first, second }))
}

/// Fires with the first available of any number of signals.
///
/// A left fold of [`choose`] over [`Signal::never`]; an empty iterator
/// yields a signal that never fires.
#[must_use]
pub fn select<A, I>(signals: I) -> Signal<A>
where
    A: Send + 'static,
    I: IntoIterator<Item = Signal<A>>,
{
    signals.into_iter().fold(Signal::never(), choose)
}

struct ChooseCore<A> {
    first: Signal<A>,
    second: Signal<A>,
}

impl<A: Send + 'static> SignalCore<A> for ChooseCore<A> {
    fn poll(&self) -> bool {
        self.first.poll() || self.second.poll()
    }

    fn commit(self: Arc<Self>) -> Task<Option<A>> {
        let second = self.second.clone();
        self.first.commit().bind(move |committed| match committed {
            Some(value) => Task::ready(Some(value)),
            None => second.commit(),
        })
    }

    fn block(self: Arc<Self>, claim: Arc<Claim>, deliver: Deliver<A>) -> Task<()> {
        let second = self.second.clone();
        let second_claim = Arc::clone(&claim);
        let second_deliver = Arc::clone(&deliver);
        self.first
            .block(claim, deliver)
            .bind(move |()| second.block(second_claim, second_deliver))
    }
}
