//! Failure payloads for aborted task runs.
//!
//! A task body fails by panicking while its step thunk is evaluated. The
//! interpreter traps the unwind at every step; [`Task::catch`] can intercept
//! it, and an uncaught failure aborts the whole run, surfacing here as a
//! [`Failure`]. The payload is preserved intact so callers can recover a
//! typed error they raised with [`panic_any`](std::panic::panic_any).
//!
//! [`Task::catch`]: crate::task::Task::catch

use core::fmt;
use std::any::Any;

/// The payload of a failed task step.
///
/// Wraps whatever the failing code panicked with. String panics (the common
/// case, from `panic!` or [`crate::task::fail`]) are rendered by `Display`;
/// anything else can be recovered with [`Failure::downcast_ref`] or
/// [`Failure::into_payload`].
pub struct Failure {
    payload: Box<dyn Any + Send + 'static>,
}

impl Failure {
    /// Wraps a caught unwind payload.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send + 'static>) -> Self {
        Self { payload }
    }

    /// Returns the failure message if the payload was a string.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        if let Some(s) = self.payload.downcast_ref::<&'static str>() {
            Some(s)
        } else {
            self.payload.downcast_ref::<String>().map(String::as_str)
        }
    }

    /// Borrows the payload as a concrete type, if it is one.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// Consumes the failure, returning the raw panic payload.
    #[must_use]
    pub fn into_payload(self) -> Box<dyn Any + Send + 'static> {
        self.payload
    }

    /// Re-raises the failure, unwinding with the original payload.
    ///
    /// Useful inside a [`Task::catch`](crate::task::Task::catch) handler that
    /// only wants to intercept some failures.
    pub fn rethrow(self) -> ! {
        std::panic::resume_unwind(self.payload)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(msg) => f.debug_tuple("Failure").field(&msg).finish(),
            None => f.debug_tuple("Failure").field(&"<non-string payload>").finish(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(msg) => write!(f, "task failed: {msg}"),
            None => write!(f, "task failed with a non-string payload"),
        }
    }
}

impl std::error::Error for Failure {}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(payload: Box<dyn Any + Send>) -> Failure {
        Failure::from_panic(payload)
    }

    #[test]
    fn test_message_from_static_str() {
        let failure = capture(Box::new("boom"));
        assert_eq!(failure.message(), Some("boom"));
    }

    #[test]
    fn test_message_from_string() {
        let failure = capture(Box::new(String::from("owned boom")));
        assert_eq!(failure.message(), Some("owned boom"));
    }

    #[test]
    fn test_non_string_payload_downcasts() {
        let failure = capture(Box::new(42_u32));
        assert_eq!(failure.message(), None);
        assert_eq!(failure.downcast_ref::<u32>(), Some(&42));
    }

    #[test]
    fn test_display_includes_message() {
        let failure = capture(Box::new("exploded"));
        assert!(failure.to_string().contains("exploded"));
    }

    #[test]
    fn test_into_payload_round_trips() {
        let failure = capture(Box::new(7_i64));
        let payload = failure.into_payload();
        assert_eq!(payload.downcast_ref::<i64>(), Some(&7));
    }
}
