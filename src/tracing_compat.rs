//! Tracing compatibility layer for structured logging.
//!
//! Provides a unified logging interface that works whether or not the
//! `tracing-integration` feature is enabled:
//!
//! - **With the feature**: re-exports the macros from the `tracing` crate.
//! - **Without it**: no-op macros that compile to nothing, so instrumented
//!   code has zero runtime cost.
//!
//! # Usage
//!
//! ```rust,ignore
//! use rendez::tracing_compat::{debug, trace};
//!
//! trace!(token, "lock granted");
//! debug!("cooperative run finished");
//! ```
//!
//! Enable the real thing in `Cargo.toml`:
//!
//! ```toml
//! rendez = { version = "0.1", features = ["tracing-integration"] }
//! ```

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    //! No-op macro implementations used when tracing is disabled.

    /// No-op trace-level logging macro.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op debug-level logging macro.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// No-op info-level logging macro.
    #[macro_export]
    macro_rules! info {
        ($($arg:tt)*) => {};
    }

    /// No-op warn-level logging macro.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }

    /// No-op error-level logging macro.
    #[macro_export]
    macro_rules! error {
        ($($arg:tt)*) => {};
    }

    pub use crate::{debug, error, info, trace, warn};
}

#[cfg(not(feature = "tracing-integration"))]
pub use noop::*;
