//! Rendez: cooperative tasks, first-class synchronous signals, and
//! rendezvous channels.
//!
//! # Overview
//!
//! Rendez is a library runtime for communicating tasks in the CSP style. A
//! program is assembled from three ingredients:
//!
//! - [`Task<A>`](task::Task): an immutable description of a computation,
//!   interpreted by a scheduler. Suspension points are explicit scheduling
//!   nodes (fork, yield, sleep, lock construction), never preemption.
//! - [`Signal<A>`](signal::Signal): a first-class description of a
//!   synchronous event. Signals compose — [`choose`](combinator::choose)
//!   picks non-deterministically among alternatives *before* any of them is
//!   committed to — and [`Signal::sync`](signal::Signal::sync) turns a signal
//!   into a task that suspends until the event fires.
//! - [`Channel<A>`](channel::Channel): a capacity-zero rendezvous point. A
//!   send and a receive complete in a single coordinated step; neither side
//!   proceeds until both are present.
//!
//! # Core Guarantees
//!
//! - **Exactly-one commitment**: a signal suspended under a selection over
//!   several channel operations fires at most once; the losing subscriptions
//!   observe the shared claim cell as settled and withdraw themselves.
//! - **Matched rendezvous**: every successful send pairs with exactly one
//!   receive and the receiver observes the value the sender offered.
//! - **Release on every path**: [`task::using`] runs the release task exactly
//!   once, on normal completion and on failure alike.
//! - **Scheduler equivalence**: the single-threaded and the multi-threaded
//!   drivers implement identical observable semantics for sync, send, and
//!   receive; they differ only in parallelism and timing.
//!
//! # Module Structure
//!
//! - [`task`]: task descriptions, sequencing, failure handling, loops
//! - [`runtime`]: the cooperative and the parallel drivers, plus the clock seam
//! - [`signal`]: the signal trio (poll/commit/block) and the claim cell
//! - [`combinator`]: choose/select, deadline signals, timeout, join
//! - [`channel`]: the rendezvous channel protocol
//! - [`sync`]: scheduler-flavored locks and the blocking semaphore
//! - [`error`]: failure payloads surfaced by aborted runs
//! - [`util`]: deterministic RNG for branch ordering
//! - [`tracing_compat`]: feature-gated structured logging shim
//! - [`test_logging`]: event capture for debugging concurrency tests
//!
//! # Example
//!
//! ```ignore
//! use rendez::{channel, runtime, task};
//!
//! let program = channel::channel::<&str>().bind(|ch| {
//!     let tx = ch.clone();
//!     task::fork(tx.send("ping").sync())
//!         .then(ch.receive().sync())
//! });
//! assert_eq!(runtime::cooperative::run(program).unwrap(), "ping");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod channel;
pub mod combinator;
pub mod error;
pub mod runtime;
pub mod signal;
pub mod sync;
pub mod task;
pub mod test_logging;
pub mod tracing_compat;
pub mod util;

pub use channel::{channel, Channel};
pub use combinator::{after, both, choose, select, timeout};
pub use error::Failure;
pub use runtime::{Clock, CoopScheduler, MonotonicClock, ParallelScheduler};
pub use signal::{Claim, ClaimState, Deliver, Signal, SignalCore};
pub use sync::{Lock, LockGuard, Release, Semaphore};
pub use task::{Step, Task};
