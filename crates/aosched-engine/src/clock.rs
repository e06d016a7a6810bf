//! Time sources for the scheduler
//!
//! Every expiry and due-check goes through a [`Clock`]. Production code uses
//! [`SystemClock`]; tests drive a [`ManualClock`] so timer behaviour can be
//! verified without sleeping.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of "now" for timer expiries and wait deadlines
pub trait Clock: Send + Sync + Debug {
    /// Current instant according to this clock
    fn now(&self) -> Instant;
}

/// Monotonic wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Simulated clock that only moves when told to
///
/// Clones share the same time, so a test can hand one clone to the scheduler
/// and keep another to advance it.
#[derive(Debug, Clone)]
pub struct ManualClock {
    /// Fixed anchor; `now()` is `origin + elapsed`
    origin: Instant,
    /// Elapsed simulated time in nanoseconds
    elapsed_ns: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock anchored at the current instant with zero elapsed time
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed_ns: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Advance time by the given duration
    pub fn advance(&self, duration: Duration) {
        let delta = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_ns.fetch_add(delta, Ordering::SeqCst);
    }

    /// Advance time by the given number of milliseconds
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Simulated time elapsed since the clock was created
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns.load(Ordering::SeqCst))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}
