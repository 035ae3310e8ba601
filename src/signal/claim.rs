//! The three-state claim cell coordinating signal selection.
//!
//! Every suspended sync owns one claim cell, shared by all subscriptions
//! that sync installed (one per selection branch). Whichever firing path
//! first moves the cell from `Waiting` to `Synced` delivers; every other
//! subscription later observes `Synced` and withdraws itself.
//!
//! Transitions are compare-and-swap only, sequentially consistent:
//!
//! ```text
//!   Waiting ──try_claim──► Claimed ──confirm──► Synced   (terminal)
//!      ▲                      │
//!      └──────retract─────────┘
//!   Waiting ──────────try_sync (fast path)────► Synced
//! ```
//!
//! `Claimed` is a transient reservation taken by a firing path while it
//! settles the counterparty's cell; the holder must either `confirm` or
//! `retract`, never abandon it.

use std::sync::atomic::{AtomicU8, Ordering};

const WAITING: u8 = 0;
const CLAIMED: u8 = 1;
const SYNCED: u8 = 2;

/// Observable state of a [`Claim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimState {
    /// No firing path has touched the subscription yet.
    Waiting,
    /// A firing path holds a transient reservation on the subscription.
    Claimed,
    /// The subscription fired (or lost); no further delivery may happen.
    Synced,
}

/// A shared, atomically updated subscription state.
#[derive(Debug)]
pub struct Claim {
    state: AtomicU8,
}

impl Claim {
    /// Creates a claim in the `Waiting` state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(WAITING),
        }
    }

    /// Reads the current state.
    #[must_use]
    pub fn state(&self) -> ClaimState {
        decode(self.state.load(Ordering::SeqCst))
    }

    /// Returns true once the claim has settled.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.state() == ClaimState::Synced
    }

    /// Attempts `Waiting` → `Claimed`. On failure returns the state that was
    /// observed instead.
    pub fn try_claim(&self) -> Result<(), ClaimState> {
        self.transition(WAITING, CLAIMED)
    }

    /// Attempts the fast path `Waiting` → `Synced`. On failure returns the
    /// observed state.
    pub fn try_sync(&self) -> Result<(), ClaimState> {
        self.transition(WAITING, SYNCED)
    }

    /// Completes a reservation: `Claimed` → `Synced`.
    ///
    /// Only the path that took the reservation may call this; any other
    /// observed state is a protocol violation.
    pub fn confirm(&self) {
        assert!(
            self.transition(CLAIMED, SYNCED).is_ok(),
            "confirm on a claim this path does not hold"
        );
    }

    /// Abandons a reservation: `Claimed` → `Waiting`.
    ///
    /// Only the path that took the reservation may call this.
    pub fn retract(&self) {
        assert!(
            self.transition(CLAIMED, WAITING).is_ok(),
            "retract on a claim this path does not hold"
        );
    }

    fn transition(&self, from: u8, to: u8) -> Result<(), ClaimState> {
        self.state
            .compare_exchange(from, to, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(decode)
    }
}

impl Default for Claim {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(raw: u8) -> ClaimState {
    match raw {
        WAITING => ClaimState::Waiting,
        CLAIMED => ClaimState::Claimed,
        SYNCED => ClaimState::Synced,
        _ => unreachable!("claim state is only ever one of the three constants"),
    }
}
