//! Internal utilities.
//!
//! Currently just the deterministic RNG that orders [`choose`] branches.
//!
//! [`choose`]: crate::combinator::choose

mod det_rng;

pub use det_rng::DetRng;

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Environment variable that pins the branch-ordering seed for a run.
pub const SEED_ENV_VAR: &str = "RENDEZ_SEED";

/// Flips the thread-local coin used to order selection branches.
///
/// The generator is seeded once per thread: from [`SEED_ENV_VAR`] when set
/// (reproducible runs), otherwise from wall-clock entropy. Successive flips
/// on one thread follow the xorshift64 sequence.
pub(crate) fn coin_flip() -> bool {
    thread_local! {
        static RNG: RefCell<DetRng> = RefCell::new(DetRng::new(initial_seed()));
    }
    RNG.with(|rng| rng.borrow_mut().next_bool())
}

fn initial_seed() -> u64 {
    static THREAD_SALT: AtomicU64 = AtomicU64::new(0);
    let salt = THREAD_SALT.fetch_add(0x9E37_79B9_7F4A_7C15, Ordering::Relaxed);

    if let Ok(raw) = std::env::var(SEED_ENV_VAR) {
        if let Ok(seed) = raw.trim().parse::<u64>() {
            return seed ^ salt;
        }
    }

    let entropy = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0xDEAD_BEEF, |d| u64::from(d.subsec_nanos()) ^ d.as_secs());
    entropy ^ salt
}
