//! Event capture for debugging concurrency tests.
//!
//! Interleaving bugs rarely reproduce under a debugger, so tests record
//! what happened as it happens and print the whole timeline only when an
//! assertion fails. [`TestLogger`] captures timestamped, categorized
//! events; the [`test_log!`], [`assert_log!`] and [`assert_eq_log!`]
//! macros wire it into ordinary test flow.
//!
//! # Example
//!
//! ```ignore
//! use rendez::test_logging::TestLogger;
//!
//! let logger = TestLogger::new();
//! test_log!(logger, "setup", "spawning {} workers", 4);
//! assert_log!(logger, outcome.is_ok(), "run failed: {:?}", outcome);
//! ```

use std::fmt::Write as _;
use std::sync::Mutex;
use std::time::Instant;

/// Captures categorized events with elapsed-time stamps.
#[derive(Debug)]
pub struct TestLogger {
    start: Instant,
    events: Mutex<Vec<Event>>,
}

#[derive(Debug)]
struct Event {
    at_micros: u128,
    category: &'static str,
    message: String,
}

impl TestLogger {
    /// Creates an empty logger; the clock starts now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Records one event.
    pub fn log(&self, category: &'static str, message: String) {
        self.events.lock().expect("lock poisoned").push(Event {
            at_micros: self.start.elapsed().as_micros(),
            category,
            message,
        });
    }

    /// Returns the number of captured events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().expect("lock poisoned").len()
    }

    /// Returns true if nothing has been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Renders the full timeline, one event per line.
    #[must_use]
    pub fn report(&self) -> String {
        let events = self.events.lock().expect("lock poisoned");
        let mut out = String::new();
        let _ = writeln!(out, "=== test event timeline ({} events) ===", events.len());
        for event in events.iter() {
            let _ = writeln!(
                out,
                "{:>10}us [{}] {}",
                event.at_micros, event.category, event.message
            );
        }
        out
    }

    /// Discards all captured events.
    pub fn clear(&self) {
        self.events.lock().expect("lock poisoned").clear();
    }
}

impl Default for TestLogger {
    fn default() -> Self {
        Self::new()
    }
}

/// Records a formatted event on a [`TestLogger`].
#[macro_export]
macro_rules! test_log {
    ($logger:expr, $cat:literal, $($arg:tt)*) => {
        $logger.log($cat, format!($($arg)*));
    };
}

/// Asserts a condition, printing the captured timeline on failure.
#[macro_export]
macro_rules! assert_log {
    ($logger:expr, $cond:expr) => {
        if !$cond {
            eprintln!("{}", $logger.report());
            panic!("assertion failed: {}", stringify!($cond));
        }
    };
    ($logger:expr, $cond:expr, $($arg:tt)*) => {
        if !$cond {
            eprintln!("{}", $logger.report());
            panic!($($arg)*);
        }
    };
}

/// Asserts equality, printing the captured timeline on failure.
#[macro_export]
macro_rules! assert_eq_log {
    ($logger:expr, $left:expr, $right:expr) => {
        if $left != $right {
            eprintln!("{}", $logger.report());
            panic!(
                "assertion failed: `(left == right)`\n  left: {:?}\n right: {:?}",
                $left, $right
            );
        }
    };
}
