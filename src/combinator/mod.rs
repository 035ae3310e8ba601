//! Signal and task combinators.
//!
//! - [`choose`] / [`select`]: non-deterministic selection among signals,
//!   committed to exactly once through a shared claim cell.
//! - [`after`] / [`timeout`]: deadline signals and the rendezvous-or-expiry
//!   race built from them.
//! - [`both`]: joint completion of two tasks over a private channel.

mod choose;
mod join;
mod timeout;

pub use choose::{choose, select};
pub use join::both;
pub use timeout::{after, timeout};
