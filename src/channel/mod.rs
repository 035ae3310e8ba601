//! Rendezvous channels.
//!
//! A [`Channel<A>`] is a capacity-zero meeting point: a send and a receive
//! complete in one coordinated step, and neither side proceeds until both
//! are present. [`Channel::send`] and [`Channel::receive`] produce
//! [`Signal`]s, so channel operations compose with
//! [`choose`](crate::combinator::choose) and time out with
//! [`timeout`](crate::combinator::timeout) like any other event.
//!
//! # Protocol
//!
//! The channel owns two queues of pending subscriptions — senders
//! (claim, notify callback, value) and receivers (claim, deliver callback)
//! — plus a task-level [`Lock`] requested from the scheduler at
//! construction. Every commit and block runs with that lock held for the
//! whole scan, including the cooperative yields of the claim-retry loops;
//! the queues' own mutex is only a memory guard and is never held across a
//! yield or a callback.
//!
//! **Commit** walks the counterpart queue from the front and tries the fast
//! CAS `Waiting → Synced` on each entry: success completes the rendezvous;
//! a `Synced` entry is a leftover from a selection that fired elsewhere and
//! is dropped; a `Claimed` entry is contended, so the scan yields and
//! retries.
//!
//! **Block** looks for a counterpart whose claim is not the caller's own
//! cell (a selection may put both ends of one channel under a single
//! claim), then runs the double CAS: reserve the caller's cell
//! (`Waiting → Claimed`), settle the counterpart (`Waiting → Synced`), then
//! confirm the reservation. Losing the second CAS to `Synced` retracts and
//! drops the dead entry; losing it to `Claimed` retracts, yields, and
//! retries. If the caller's own cell is no longer `Waiting`, some other
//! branch of its selection is firing, so the block abandons without
//! enqueueing. Only when no counterpart exists is the subscription
//! appended.
//!
//! The double CAS is what makes "exactly one branch of a selection fires"
//! hold even when two selections target each other through several
//! channels at once.
//!
//! # Ordering
//!
//! Within one channel, rendezvous follow queue order modulo retries forced
//! by contended claims; across channels nothing is promised.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex as ParkingMutex;

use crate::signal::{Claim, ClaimState, Deliver, Signal, SignalCore};
use crate::sync::Lock;
use crate::task::{self, Step, Task};
use crate::tracing_compat::trace;

/// Creates a rendezvous channel.
///
/// Construction is a task: the channel's lock comes from the scheduler, in
/// the flavor matching the driver.
#[must_use]
pub fn channel<A: Send + 'static>() -> Task<Channel<A>> {
    task::new_lock().map(|lock| Channel {
        shared: Arc::new(Shared {
            lock,
            queues: ParkingMutex::new(Queues {
                senders: VecDeque::new(),
                receivers: VecDeque::new(),
            }),
        }),
    })
}

/// A capacity-zero rendezvous point.
///
/// Cloning yields another handle to the same channel.
pub struct Channel<A> {
    shared: Arc<Shared<A>>,
}

impl<A> Clone for Channel<A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A: Send + 'static> Channel<A> {
    /// The signal that offers `value` to a receiver.
    ///
    /// Fires with `()` once some receive takes the value. Single-use: the
    /// value is consumed by the first successful rendezvous, and syncing a
    /// clone of a fired send signal suspends forever.
    #[must_use]
    pub fn send(&self, value: A) -> Signal<()> {
        Signal::new(Arc::new(SendCore {
            shared: Arc::clone(&self.shared),
            value: ParkingMutex::new(Some(value)),
        }))
    }

    /// The signal that takes a value from a sender.
    #[must_use]
    pub fn receive(&self) -> Signal<A> {
        Signal::new(Arc::new(ReceiveCore {
            shared: Arc::clone(&self.shared),
        }))
    }
}

impl<A> core::fmt::Debug for Channel<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let queues = self.shared.queues.lock();
        f.debug_struct("Channel")
            .field("senders", &queues.senders.len())
            .field("receivers", &queues.receivers.len())
            .finish()
    }
}

struct Shared<A> {
    lock: Lock,
    queues: ParkingMutex<Queues<A>>,
}

struct Queues<A> {
    senders: VecDeque<BlockedSend<A>>,
    receivers: VecDeque<BlockedReceive<A>>,
}

struct BlockedSend<A> {
    claim: Arc<Claim>,
    notify: Deliver<()>,
    value: A,
}

struct BlockedReceive<A> {
    claim: Arc<Claim>,
    deliver: Deliver<A>,
}

// ---------------------------------------------------------------------------
// Send side
// ---------------------------------------------------------------------------

struct SendCore<A> {
    shared: Arc<Shared<A>>,
    value: ParkingMutex<Option<A>>,
}

impl<A: Send + 'static> SignalCore<()> for SendCore<A> {
    fn poll(&self) -> bool {
        let queues = self.shared.queues.lock();
        queues.receivers.iter().any(|r| !r.claim.is_synced())
    }

    fn commit(self: Arc<Self>) -> Task<Option<()>> {
        let lock = self.shared.lock.clone();
        task::using(lock.acquire(), move |_guard| send_commit_scan(self))
    }

    fn block(self: Arc<Self>, claim: Arc<Claim>, notify: Deliver<()>) -> Task<()> {
        let lock = self.shared.lock.clone();
        task::using(lock.acquire(), move |_guard| {
            send_block_scan(self, claim, notify)
        })
    }
}

/// Commit walk over the receiver queue. Runs with the channel lock held.
fn send_commit_scan<A: Send + 'static>(core: Arc<SendCore<A>>) -> Task<Option<()>> {
    Task::from_fn(move || {
        if core.value.lock().is_none() {
            // Already fired through another handle.
            return Step::Done(None);
        }
        loop {
            let mut queues = core.shared.queues.lock();
            let Some(front) = queues.receivers.front() else {
                return Step::Done(None);
            };
            match front.claim.try_sync() {
                Ok(()) => {
                    let receiver = queues.receivers.pop_front().expect("front exists");
                    drop(queues);
                    let value = core
                        .value
                        .lock()
                        .take()
                        .expect("value present under the channel lock");
                    (receiver.deliver)(value);
                    trace!("send committed against a waiting receiver");
                    return Step::Done(Some(()));
                }
                Err(ClaimState::Synced) => {
                    // Leftover of a selection that fired elsewhere.
                    queues.receivers.pop_front();
                }
                Err(ClaimState::Claimed) => {
                    drop(queues);
                    return Step::Yield(send_commit_scan(Arc::clone(&core)));
                }
                Err(ClaimState::Waiting) => {
                    unreachable!("failed CAS cannot observe the from-state")
                }
            }
        }
    })
}

/// Block scan over the receiver queue. Runs with the channel lock held.
fn send_block_scan<A: Send + 'static>(
    core: Arc<SendCore<A>>,
    claim: Arc<Claim>,
    notify: Deliver<()>,
) -> Task<()> {
    Task::from_fn(move || {
        loop {
            let mut queues = core.shared.queues.lock();
            let candidate = queues
                .receivers
                .iter()
                .position(|r| !Arc::ptr_eq(&r.claim, &claim));
            let Some(index) = candidate else {
                let Some(value) = core.value.lock().take() else {
                    // Already fired through another handle; nothing to offer.
                    return Step::Done(());
                };
                queues.senders.push_back(BlockedSend {
                    claim: Arc::clone(&claim),
                    notify: Arc::clone(&notify),
                    value,
                });
                return Step::Done(());
            };

            if claim.try_claim().is_err() {
                // Another branch of our selection is firing (or has fired);
                // leave the candidate alone and install nothing.
                return Step::Done(());
            }
            let other = Arc::clone(&queues.receivers[index].claim);
            match other.try_sync() {
                Ok(()) => {
                    claim.confirm();
                    let receiver = queues.receivers.remove(index).expect("candidate exists");
                    drop(queues);
                    let value = core
                        .value
                        .lock()
                        .take()
                        .expect("value present under the channel lock");
                    (notify)(());
                    (receiver.deliver)(value);
                    trace!("blocked send matched a waiting receiver");
                    return Step::Done(());
                }
                Err(ClaimState::Synced) => {
                    claim.retract();
                    queues.receivers.remove(index);
                }
                Err(ClaimState::Claimed) => {
                    claim.retract();
                    drop(queues);
                    let next_claim = Arc::clone(&claim);
                    let next_notify = Arc::clone(&notify);
                    return Step::Yield(send_block_scan(
                        Arc::clone(&core),
                        next_claim,
                        next_notify,
                    ));
                }
                Err(ClaimState::Waiting) => {
                    unreachable!("failed CAS cannot observe the from-state")
                }
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Receive side
// ---------------------------------------------------------------------------

struct ReceiveCore<A> {
    shared: Arc<Shared<A>>,
}

impl<A: Send + 'static> SignalCore<A> for ReceiveCore<A> {
    fn poll(&self) -> bool {
        let queues = self.shared.queues.lock();
        queues.senders.iter().any(|s| !s.claim.is_synced())
    }

    fn commit(self: Arc<Self>) -> Task<Option<A>> {
        let lock = self.shared.lock.clone();
        task::using(lock.acquire(), move |_guard| receive_commit_scan(self))
    }

    fn block(self: Arc<Self>, claim: Arc<Claim>, deliver: Deliver<A>) -> Task<()> {
        let lock = self.shared.lock.clone();
        task::using(lock.acquire(), move |_guard| {
            receive_block_scan(self, claim, deliver)
        })
    }
}

/// Commit walk over the sender queue. Runs with the channel lock held.
fn receive_commit_scan<A: Send + 'static>(core: Arc<ReceiveCore<A>>) -> Task<Option<A>> {
    Task::from_fn(move || {
        loop {
            let mut queues = core.shared.queues.lock();
            let Some(front) = queues.senders.front() else {
                return Step::Done(None);
            };
            match front.claim.try_sync() {
                Ok(()) => {
                    let sender = queues.senders.pop_front().expect("front exists");
                    drop(queues);
                    (sender.notify)(());
                    trace!("receive committed against a waiting sender");
                    return Step::Done(Some(sender.value));
                }
                Err(ClaimState::Synced) => {
                    queues.senders.pop_front();
                }
                Err(ClaimState::Claimed) => {
                    drop(queues);
                    return Step::Yield(receive_commit_scan(Arc::clone(&core)));
                }
                Err(ClaimState::Waiting) => {
                    unreachable!("failed CAS cannot observe the from-state")
                }
            }
        }
    })
}

/// Block scan over the sender queue. Runs with the channel lock held.
fn receive_block_scan<A: Send + 'static>(
    core: Arc<ReceiveCore<A>>,
    claim: Arc<Claim>,
    deliver: Deliver<A>,
) -> Task<()> {
    Task::from_fn(move || {
        loop {
            let mut queues = core.shared.queues.lock();
            let candidate = queues
                .senders
                .iter()
                .position(|s| !Arc::ptr_eq(&s.claim, &claim));
            let Some(index) = candidate else {
                queues.receivers.push_back(BlockedReceive {
                    claim: Arc::clone(&claim),
                    deliver: Arc::clone(&deliver),
                });
                return Step::Done(());
            };

            if claim.try_claim().is_err() {
                return Step::Done(());
            }
            let other = Arc::clone(&queues.senders[index].claim);
            match other.try_sync() {
                Ok(()) => {
                    claim.confirm();
                    let sender = queues.senders.remove(index).expect("candidate exists");
                    drop(queues);
                    (sender.notify)(());
                    (deliver)(sender.value);
                    trace!("blocked receive matched a waiting sender");
                    return Step::Done(());
                }
                Err(ClaimState::Synced) => {
                    claim.retract();
                    queues.senders.remove(index);
                }
                Err(ClaimState::Claimed) => {
                    claim.retract();
                    drop(queues);
                    let next_claim = Arc::clone(&claim);
                    let next_deliver = Arc::clone(&deliver);
                    return Step::Yield(receive_block_scan(
                        Arc::clone(&core),
                        next_claim,
                        next_deliver,
                    ));
                }
                Err(ClaimState::Waiting) => {
                    unreachable!("failed CAS cannot observe the from-state")
                }
            }
        }
    })
}
