//! One-shot and periodic timers
//!
//! Timers live in the scheduler's registry, ordered by expiry and then by
//! registration sequence, and are fired by `dispatch()` on the scheduler
//! thread. A periodic timer advances its expiry from the previous expiry,
//! never from "now", so late dispatches do not accumulate drift.

use crate::error::{violated, HookResult, Violation};
use crate::scheduler::Scheduler;
use parking_lot::Mutex;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Smallest period a periodic timer may have
const MIN_PERIOD: Duration = Duration::from_nanos(1);

/// Unique identifier for a timer
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

static NEXT_TIMER_ID: AtomicU64 = AtomicU64::new(1);

impl TimerId {
    /// Generate a new unique TimerId
    pub fn new() -> Self {
        TimerId(NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric ID value
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Create a TimerId from a u64 value
    pub fn from_u64(id: u64) -> Self {
        TimerId(id)
    }
}

impl Default for TimerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Behaviour run on the scheduler thread when a timer fires
pub trait TimerHandler: Send {
    /// Called on the scheduler thread. For a periodic timer the next expiry
    /// is already registered, so the handler may `delete()` it.
    fn fire(&mut self, timer: &Timer) -> HookResult;
}

impl<F> TimerHandler for F
where
    F: FnMut(&Timer) -> HookResult + Send,
{
    fn fire(&mut self, timer: &Timer) -> HookResult {
        self(timer)
    }
}

/// One-shot timer registered without a callback
struct Noop;

impl TimerHandler for Noop {
    fn fire(&mut self, _timer: &Timer) -> HookResult {
        Ok(())
    }
}

/// Default behaviour of a periodic timer registered without a handler
struct MissingHandler;

impl TimerHandler for MissingHandler {
    fn fire(&mut self, timer: &Timer) -> HookResult {
        violated(Violation::MissingTimerHandler { timer: timer.id() })
    }
}

pub(crate) type SharedHandler = Arc<Mutex<Box<dyn TimerHandler>>>;

/// Registry entry for a timer
pub(crate) struct TimerEntry {
    pub(crate) id: TimerId,
    /// Registration sequence, the tie-break for equal expiries
    pub(crate) seq: u64,
    pub(crate) expiry: Instant,
    pub(crate) period: Option<Duration>,
    pub(crate) handler: SharedHandler,
}

impl TimerEntry {
    pub(crate) fn new(
        seq: u64,
        expiry: Instant,
        period: Option<Duration>,
        handler: Box<dyn TimerHandler>,
    ) -> Self {
        Self {
            id: TimerId::new(),
            seq,
            expiry,
            period,
            handler: Arc::new(Mutex::new(handler)),
        }
    }

    /// Ordering key within the registry
    pub(crate) fn key(&self) -> (Instant, u64) {
        (self.expiry, self.seq)
    }
}

/// Handle to a timer registered with a [`Scheduler`]
#[derive(Clone)]
pub struct Timer {
    id: TimerId,
    period: Option<Duration>,
    scheduler: Scheduler,
}

impl Timer {
    /// Register a one-shot timer that runs `callback` once, `delay` from now
    pub fn once<F>(scheduler: &Scheduler, delay: Duration, callback: F) -> Timer
    where
        F: FnMut(&Timer) -> HookResult + Send + 'static,
    {
        scheduler.register_timer(delay, None, Box::new(callback))
    }

    /// Register a one-shot timer driven by a [`TimerHandler`]; `None` fires as a no-op
    pub fn once_with(
        scheduler: &Scheduler,
        delay: Duration,
        handler: Option<Box<dyn TimerHandler>>,
    ) -> Timer {
        let handler = handler.unwrap_or_else(|| Box::new(Noop));
        scheduler.register_timer(delay, None, handler)
    }

    pub(crate) fn from_parts(id: TimerId, period: Option<Duration>, scheduler: Scheduler) -> Self {
        Self {
            id,
            period,
            scheduler,
        }
    }

    /// Unique identifier
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Period of a periodic timer, `None` for a one-shot
    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    /// Whether this timer re-registers itself after firing
    pub fn is_periodic(&self) -> bool {
        self.period.is_some()
    }

    /// Scheduler this timer is registered with
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Next expiry, or `None` once fired (one-shot) or deleted
    pub fn expiry(&self) -> Option<Instant> {
        self.scheduler.timer_expiry(self.id)
    }

    /// Whether the timer is still in the registry
    pub fn is_registered(&self) -> bool {
        self.expiry().is_some()
    }

    /// Remove the timer from the registry.
    ///
    /// Returns whether it was still registered.
    pub fn delete(&self) -> bool {
        self.scheduler.unregister_timer(self.id)
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("id", &self.id)
            .field("period", &self.period)
            .finish()
    }
}

/// Timer that fires at expiry, expiry + period, expiry + 2 * period, ...
///
/// Lives until deleted. Derefs to [`Timer`] for the common operations.
#[derive(Clone, Debug)]
pub struct PeriodicTimer {
    timer: Timer,
}

impl PeriodicTimer {
    /// Register a periodic timer that runs `callback` every `period`
    pub fn new<F>(scheduler: &Scheduler, period: Duration, callback: F) -> Self
    where
        F: FnMut(&Timer) -> HookResult + Send + 'static,
    {
        Self::with_handler(scheduler, period, callback)
    }

    /// Register a periodic timer driven by a [`TimerHandler`] implementation
    pub fn with_handler(
        scheduler: &Scheduler,
        period: Duration,
        handler: impl TimerHandler + 'static,
    ) -> Self {
        let period = period.max(MIN_PERIOD);
        Self {
            timer: scheduler.register_timer(period, Some(period), Box::new(handler)),
        }
    }

    /// Register a periodic timer with the default handler.
    ///
    /// Firing it is a fatal violation.
    pub fn without_handler(scheduler: &Scheduler, period: Duration) -> Self {
        Self::with_handler(scheduler, period, MissingHandler)
    }

    /// Period between firings
    pub fn interval(&self) -> Duration {
        self.timer.period.unwrap_or(MIN_PERIOD)
    }

    /// Unwrap into the plain timer handle
    pub fn into_timer(self) -> Timer {
        self.timer
    }
}

impl Deref for PeriodicTimer {
    type Target = Timer;

    fn deref(&self) -> &Timer {
        &self.timer
    }
}
