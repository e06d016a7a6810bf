//! Generation-counted completion latch
//!
//! Each active object owns one latch. A worker calling `complete()` arms a
//! new generation and parks until the scheduler thread has released that
//! generation, i.e. until the matching completion hook has run. Releasing an
//! older generation never frees a newer waiter, so a hook that re-arms its
//! object and lets a fresh worker complete cannot hand that worker an early
//! acknowledgement.

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

#[derive(Debug, Default, Clone, Copy)]
struct Generations {
    /// Last generation handed out by `arm`
    armed: u64,
    /// Every generation up to and including this one is released
    released: u64,
}

/// Signal a worker thread waits on until its completion is dispatched
pub struct Latch {
    generations: Mutex<Generations>,
    /// Wakes threads parked in `wait`
    cond: Condvar,
}

impl Latch {
    /// Create a latch with nothing armed
    pub fn new() -> Self {
        Self {
            generations: Mutex::new(Generations::default()),
            cond: Condvar::new(),
        }
    }

    /// Arm the next generation and return its ticket
    pub fn arm(&self) -> u64 {
        let mut generations = self.generations.lock();
        generations.armed += 1;
        generations.armed
    }

    /// Most recently armed generation
    pub fn armed(&self) -> u64 {
        self.generations.lock().armed
    }

    /// Release every generation up to and including `ticket`
    pub fn release_through(&self, ticket: u64) {
        let mut generations = self.generations.lock();
        if ticket > generations.released {
            generations.released = ticket.min(generations.armed);
            self.cond.notify_all();
        }
    }

    /// Release every generation armed so far
    pub fn release(&self) {
        let mut generations = self.generations.lock();
        generations.released = generations.armed;
        self.cond.notify_all();
    }

    /// Block until `ticket` is released
    pub fn wait(&self, ticket: u64) {
        let mut generations = self.generations.lock();
        while generations.released < ticket {
            self.cond.wait(&mut generations);
        }
    }

    /// Block until `ticket` is released or the timeout elapses.
    ///
    /// Returns whether the ticket was released.
    pub fn wait_for(&self, ticket: u64, timeout: Duration) -> bool {
        let mut generations = self.generations.lock();
        if generations.released < ticket {
            self.cond
                .wait_while_for(&mut generations, |g| g.released < ticket, timeout);
        }
        generations.released >= ticket
    }

    /// Whether `ticket` has been released
    pub fn is_released(&self, ticket: u64) -> bool {
        self.generations.lock().released >= ticket
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Latch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let generations = *self.generations.lock();
        f.debug_struct("Latch")
            .field("armed", &generations.armed)
            .field("released", &generations.released)
            .finish()
    }
}
