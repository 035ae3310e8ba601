//! Deadline signals and the timeout combinator.
//!
//! [`after`] builds a signal that fires once a duration has elapsed,
//! measured from the signal's first use (its construction is deferred).
//! [`timeout`] races a signal against a deadline: `Some(value)` on
//! rendezvous, `None` on expiry.
//!
//! The deadline's block path forks a watcher task that sleeps out the
//! remaining time and then settles the claim with the usual retry loop, so
//! a deadline participates in a selection exactly like a channel operation
//! does.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::combinator::choose;
use crate::signal::{Claim, ClaimState, Deliver, Signal, SignalCore};
use crate::task::{self, Step, Task};

/// A signal that fires once `dur` has elapsed.
///
/// The countdown starts at the signal's first use, not at construction —
/// composing it into a selection ahead of time costs nothing.
#[must_use]
pub fn after(dur: Duration) -> Signal<()> {
    Signal::defer(move || {
        Signal::new(Arc::new(DeadlineCore {
            deadline: Instant::now() + dur,
        }))
    })
}

/// Races `signal` against a deadline of `dur`.
///
/// Produces `Some(value)` if the signal fires first, `None` once the
/// deadline passes.
#[must_use]
pub fn timeout<A: Send + 'static>(dur: Duration, signal: Signal<A>) -> Signal<Option<A>> {
    choose(signal.map(Some), after(dur).map(|()| None))
}

struct DeadlineCore {
    deadline: Instant,
}

impl SignalCore<()> for DeadlineCore {
    fn poll(&self) -> bool {
        Instant::now() >= self.deadline
    }

    fn commit(self: Arc<Self>) -> Task<Option<()>> {
        Task::from_fn(move || {
            Step::Done(if Instant::now() >= self.deadline {
                Some(())
            } else {
                None
            })
        })
    }

    fn block(self: Arc<Self>, claim: Arc<Claim>, deliver: Deliver<()>) -> Task<()> {
        Task::from_fn(move || {
            let remaining = self.deadline.saturating_duration_since(Instant::now());
            let watcher = task::sleep(remaining).bind(move |()| fire_deadline(claim, deliver));
            Step::Fork(watcher, Task::ready(()))
        })
    }
}

fn fire_deadline(claim: Arc<Claim>, deliver: Deliver<()>) -> Task<()> {
    Task::from_fn(move || match claim.try_sync() {
        Ok(()) => {
            deliver(());
            Step::Done(())
        }
        // Some other branch of the selection already fired.
        Err(ClaimState::Synced) => Step::Done(()),
        Err(ClaimState::Claimed) => Step::Yield(fire_deadline(claim, deliver)),
        Err(ClaimState::Waiting) => unreachable!("failed CAS cannot observe the from-state"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cooperative;

    fn run<A: Send + 'static>(task: Task<A>) -> A {
        cooperative::run(task).expect("run failed")
    }

    #[test]
    fn test_after_fires_once_elapsed() {
        let started = Instant::now();
        run(after(Duration::from_millis(20)).sync());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_after_countdown_starts_at_first_use() {
        let sig = after(Duration::from_millis(15));
        std::thread::sleep(Duration::from_millis(30));
        // Construction happened 30ms ago, but the clock starts at first use.
        let started = Instant::now();
        assert!(!sig.poll());
        run(sig.sync());
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_timeout_yields_value_when_signal_ready() {
        let sig = timeout(Duration::from_millis(500), Signal::always(4));
        assert_eq!(run(sig.sync()), Some(4));
    }

    #[test]
    fn test_timeout_yields_none_when_nothing_fires() {
        let started = Instant::now();
        let sig: Signal<Option<u8>> = timeout(Duration::from_millis(40), Signal::never());
        assert_eq!(run(sig.sync()), None);
        assert!(started.elapsed() >= Duration::from_millis(40));
    }
}
