//! Joint completion of two tasks.
//!
//! [`both`] forks one task as a sibling and rendezvouses with it over a
//! private channel, so the pair completes together and both results come
//! back. Built entirely out of the public fork/channel/sync surface.

use crate::channel;
use crate::task::{self, Task};

/// Runs `a` and `b` concurrently and produces both results.
///
/// `b` is forked as a sibling; its result comes back over a private
/// rendezvous channel once `a` has finished. A failure in either side
/// aborts the run unless caught inside that side.
#[must_use]
pub fn both<A, B>(a: Task<A>, b: Task<B>) -> Task<(A, B)>
where
    A: Send + 'static,
    B: Send + 'static,
{
    channel::channel::<B>().bind(move |results| {
        let tx = results.clone();
        let sibling = b.bind(move |value| tx.send(value).sync());
        task::fork(sibling)
            .then(a)
            .bind(move |left| results.receive().sync().map(move |right| (left, right)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{cooperative, parallel};

    #[test]
    fn test_both_returns_both_results() {
        let program = both(Task::ready(1), Task::ready("two"));
        assert_eq!(cooperative::run(program).expect("run failed"), (1, "two"));
    }

    #[test]
    fn test_both_with_yielding_sides() {
        let left = task::yield_now().map(|()| 10);
        let right = task::yield_now().then(task::yield_now()).map(|()| 20);
        let program = both(left, right);
        assert_eq!(cooperative::run(program).expect("run failed"), (10, 20));
    }

    #[test]
    fn test_both_on_parallel_driver() {
        let program = both(Task::ready('a'), Task::ready('b'));
        assert_eq!(parallel::run(program).expect("run failed"), ('a', 'b'));
    }
}
