//! A minimal counting semaphore, used as the per-thread hand-off primitive
//! (spec.md §4.H / §9): each simulation thread blocks on its own semaphore
//! whenever it isn't the one scheduled thread.

use parking_lot::{Condvar, Mutex};

pub struct Semaphore {
    permits: Mutex<u32>,
    available: Condvar,
}

impl Semaphore {
    pub fn new(initial: u32) -> Self {
        Self {
            permits: Mutex::new(initial),
            available: Condvar::new(),
        }
    }

    /// Blocks until a permit is available, then consumes it.
    pub fn acquire(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.available.wait(&mut permits);
        }
        *permits -= 1;
    }

    /// Grants one permit and wakes a waiter.
    pub fn release(&self) {
        let mut permits = self.permits.lock();
        *permits += 1;
        self.available.notify_one();
    }
}
