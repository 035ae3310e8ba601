//! Timeout E2E suite.
//!
//! A receive on a channel with no sender, raced against a deadline, must
//! produce `None` — after the deadline but within a generous upper bound —
//! on both drivers.

use rendez::combinator::timeout;
use rendez::runtime::{cooperative, parallel};
use rendez::{channel, Failure, Task};
use std::time::{Duration, Instant};

fn receive_with_deadline() -> Task<Option<u8>> {
    channel::channel::<u8>()
        .bind(|ch| timeout(Duration::from_millis(50), ch.receive()).sync())
}

fn assert_timed_out(run: impl FnOnce(Task<Option<u8>>) -> Result<Option<u8>, Failure>) {
    let started = Instant::now();
    let outcome = run(receive_with_deadline()).expect("run failed");
    let elapsed = started.elapsed();
    assert_eq!(outcome, None);
    assert!(
        elapsed >= Duration::from_millis(50),
        "deadline fired early: {elapsed:?}"
    );
    assert!(
        elapsed < Duration::from_millis(500),
        "deadline fired far too late: {elapsed:?}"
    );
}

#[test]
fn test_timeout_bounds_on_cooperative_driver() {
    assert_timed_out(cooperative::run);
}

#[test]
fn test_timeout_bounds_on_parallel_driver() {
    assert_timed_out(parallel::run);
}

#[test]
fn test_timeout_prefers_rendezvous_when_sender_present() {
    let program = channel::channel::<u8>().bind(|ch| {
        let tx = ch.clone();
        rendez::task::fork(tx.send(42).sync())
            .then(timeout(Duration::from_millis(200), ch.receive()).sync())
    });
    assert_eq!(cooperative::run(program).expect("run failed"), Some(42));
}
