//! Synchronization primitives.
//!
//! - [`Lock`]: mutual exclusion whose acquire and release are task-level
//!   operations; constructed by the driver in the flavor it needs
//!   (cooperative FIFO queue or blocking semaphore).
//! - [`LockGuard`]: proof of ownership satisfying the [`Release`] contract.
//! - [`Semaphore`]: the blocking counting semaphore behind the parallel
//!   flavor, usable on its own.

mod lock;
mod semaphore;

pub use lock::{Lock, LockGuard, Release};
pub use semaphore::Semaphore;
