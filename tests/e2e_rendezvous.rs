//! Rendezvous E2E suite.
//!
//! Exercises the channel protocol end to end:
//! - **Ping-pong**: one send, one receive, the value crosses intact.
//! - **Triangle selection**: three tasks selecting over three channels with
//!   per-iteration deadlines; the run never deadlocks and the send/receive
//!   ledgers balance.
//! - **Self-selection safety**: a selection holding both ends of one
//!   channel never rendezvouses with itself, even against a concurrent
//!   external party.

use parking_lot::Mutex;
use rendez::combinator::{select, timeout};
use rendez::runtime::{cooperative, parallel};
use rendez::task::{self, Task};
use rendez::test_logging::TestLogger;
use rendez::{assert_log, channel, test_log};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_ping_pong_delivers_exactly_the_sent_text() {
    let printed = Arc::new(Mutex::new(Vec::new()));
    let program = channel::channel::<&str>().bind({
        let printed = Arc::clone(&printed);
        move |ch| {
            let tx = ch.clone();
            let sink = Arc::clone(&printed);
            task::fork(tx.send("x").sync())
                .then(task::fork(ch.receive().sync().bind(move |text| {
                    sink.lock().push(text);
                    Task::ready(())
                })))
        }
    });
    cooperative::run(program).expect("run failed");
    assert_eq!(*printed.lock(), vec!["x"]);
}

#[test]
fn test_ping_pong_on_the_parallel_driver() {
    let program = channel::channel::<String>().bind(|ch| {
        let tx = ch.clone();
        task::fork(tx.send(String::from("over threads")).sync()).then(ch.receive().sync())
    });
    assert_eq!(
        parallel::run(program).expect("run failed"),
        "over threads"
    );
}

/// One corner of the triangle: receives on `rx`, offers `first` and
/// `second` on the two other channels, everything under one selection with
/// a per-iteration deadline so the loop always terminates.
fn triangle_child(
    rx: rendez::Channel<char>,
    first: (rendez::Channel<char>, char),
    second: (rendez::Channel<char>, char),
    rounds: usize,
    printed: Arc<Mutex<Vec<char>>>,
    sends: Arc<AtomicUsize>,
    receives: Arc<AtomicUsize>,
) -> Task<()> {
    let counter = Arc::new(AtomicUsize::new(0));
    task::repeat_while(
        move || counter.fetch_add(1, Ordering::SeqCst) < rounds,
        move || {
            let event = select(vec![
                rx.receive().map(Some),
                first.0.send(first.1).map(|()| None),
                second.0.send(second.1).map(|()| None),
            ]);
            let printed = Arc::clone(&printed);
            let sends = Arc::clone(&sends);
            let receives = Arc::clone(&receives);
            timeout(Duration::from_millis(5), event)
                .sync()
                .bind(move |outcome| {
                    match outcome {
                        Some(Some(letter)) => {
                            printed.lock().push(letter);
                            receives.fetch_add(1, Ordering::SeqCst);
                        }
                        Some(None) => {
                            sends.fetch_add(1, Ordering::SeqCst);
                        }
                        None => {}
                    }
                    Task::ready(())
                })
        },
    )
}

#[test]
fn test_triangle_selection_balances_and_terminates() {
    const ROUNDS: usize = 20;
    let logger = TestLogger::new();
    let printed = Arc::new(Mutex::new(Vec::new()));
    let sends = Arc::new(AtomicUsize::new(0));
    let receives = Arc::new(AtomicUsize::new(0));

    let program = channel::channel::<char>().bind({
        let printed = Arc::clone(&printed);
        let sends = Arc::clone(&sends);
        let receives = Arc::clone(&receives);
        move |c1| {
            channel::channel::<char>().bind(move |c2| {
                channel::channel::<char>().bind(move |c3| {
                    let a = triangle_child(
                        c3.clone(),
                        (c1.clone(), 'a'),
                        (c2.clone(), 'b'),
                        ROUNDS,
                        Arc::clone(&printed),
                        Arc::clone(&sends),
                        Arc::clone(&receives),
                    );
                    let b = triangle_child(
                        c1.clone(),
                        (c2.clone(), 'c'),
                        (c3.clone(), 'd'),
                        ROUNDS,
                        Arc::clone(&printed),
                        Arc::clone(&sends),
                        Arc::clone(&receives),
                    );
                    let c = triangle_child(
                        c2,
                        (c3, 'e'),
                        (c1, 'f'),
                        ROUNDS,
                        printed,
                        sends,
                        receives,
                    );
                    task::fork(a).then(task::fork(b)).then(c)
                })
            })
        }
    });

    // Completing at all is the no-deadlock assertion.
    cooperative::run(program).expect("run failed");

    let printed = printed.lock();
    let sends = sends.load(Ordering::SeqCst);
    let receives = receives.load(Ordering::SeqCst);
    test_log!(logger, "ledger", "printed={printed:?} sends={sends} receives={receives}");

    assert_log!(
        logger,
        printed.iter().all(|c| ('a'..='f').contains(c)),
        "unexpected letter in {printed:?}"
    );
    assert_log!(
        logger,
        printed.len() == receives,
        "every successful receive prints exactly one letter"
    );
    assert_log!(
        logger,
        sends == receives,
        "every rendezvous pairs one send branch with one receive branch: {sends} != {receives}"
    );
}

#[test]
fn test_self_selection_cannot_pair_with_itself() {
    // A selection holding both ends of one channel, against an external
    // receive: the only legal rendezvous is the selection's send with the
    // external receive.
    let program = channel::channel::<u8>().bind(|ch| {
        let chooser = select(vec![ch.send(1).map(|()| None), ch.receive().map(Some)]);
        let external = ch.receive();
        task::fork(chooser.sync().bind(|got| {
            // The send branch fired; the receive branch withdrew.
            assert_eq!(got, None);
            Task::ready(())
        }))
        .then(external.sync())
    });
    assert_eq!(cooperative::run(program).expect("run failed"), 1);
}

#[test]
fn test_self_selection_on_the_parallel_driver() {
    let program = channel::channel::<u8>().bind(|ch| {
        let chooser = select(vec![ch.send(1).map(|()| None), ch.receive().map(Some)]);
        let external = ch.receive();
        task::fork(chooser.sync().map(|_| ())).then(external.sync())
    });
    assert_eq!(parallel::run(program).expect("run failed"), 1);
}
