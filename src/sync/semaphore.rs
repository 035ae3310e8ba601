//! Blocking counting semaphore.
//!
//! Backs the lock flavor handed out by the parallel driver: acquisition
//! parks the calling OS thread until a permit frees up. Wakeup order is
//! whatever the condvar provides; the cooperative FIFO lock is the flavor
//! that guarantees queue order.

use parking_lot::{Condvar, Mutex as ParkingMutex};

#[derive(Debug)]
struct SemaphoreState {
    permits: usize,
    waiters: usize,
}

/// A counting semaphore that blocks the calling thread.
#[derive(Debug)]
pub struct Semaphore {
    state: ParkingMutex<SemaphoreState>,
    condvar: Condvar,
}

impl Semaphore {
    /// Creates a semaphore with the given number of permits.
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Self {
            state: ParkingMutex::new(SemaphoreState {
                permits,
                waiters: 0,
            }),
            condvar: Condvar::new(),
        }
    }

    /// Returns the number of currently available permits.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.state.lock().permits
    }

    /// Returns the number of threads currently parked in `acquire`.
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.state.lock().waiters
    }

    /// Takes one permit, blocking the calling thread until one is available.
    pub fn acquire(&self) {
        let mut state = self.state.lock();
        while state.permits == 0 {
            state.waiters += 1;
            self.condvar.wait(&mut state);
            state.waiters -= 1;
        }
        state.permits -= 1;
    }

    /// Takes one permit without blocking. Returns false if none were free.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        if state.permits == 0 {
            false
        } else {
            state.permits -= 1;
            true
        }
    }

    /// Returns one permit and wakes a parked waiter, if any.
    pub fn release(&self) {
        let mut state = self.state.lock();
        state.permits += 1;
        drop(state);
        self.condvar.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_acquire_consumes_permit() {
        let sem = Semaphore::new(2);
        sem.acquire();
        assert_eq!(sem.available_permits(), 1);
        sem.acquire();
        assert_eq!(sem.available_permits(), 0);
    }

    #[test]
    fn test_try_acquire_fails_when_empty() {
        let sem = Semaphore::new(1);
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
        sem.release();
        assert!(sem.try_acquire());
    }

    #[test]
    fn test_release_unblocks_waiter() {
        let sem = Arc::new(Semaphore::new(0));
        let waiter_sem = Arc::clone(&sem);
        let waiter = thread::spawn(move || {
            waiter_sem.acquire();
        });
        // Give the waiter time to park before releasing.
        thread::sleep(Duration::from_millis(20));
        sem.release();
        waiter.join().expect("waiter panicked");
        assert_eq!(sem.available_permits(), 0);
    }

    #[test]
    fn test_mutual_exclusion_across_threads() {
        let sem = Arc::new(Semaphore::new(1));
        let inside = Arc::new(ParkingMutex::new(0_u32));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let sem = Arc::clone(&sem);
            let inside = Arc::clone(&inside);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    sem.acquire();
                    let mut n = inside.lock();
                    *n += 1;
                    drop(n);
                    sem.release();
                }
            }));
        }
        for h in handles {
            h.join().expect("worker panicked");
        }
        assert_eq!(*inside.lock(), 400);
    }
}
