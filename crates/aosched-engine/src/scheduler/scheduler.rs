//! Scheduler: registries, wake monitor and the dispatch loop

use crate::clock::{Clock, SystemClock};
use crate::error::{violated, DispatchError, EngineResult, Violation};
use crate::scheduler::object::ObjectCell;
use crate::scheduler::timer::{SharedHandler, TimerEntry};
use crate::scheduler::{
    ActiveObject, CompletionHook, ObjectId, ObjectState, Timer, TimerHandler, TimerId,
};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

/// Diagnostic hook called before the scheduler thread blocks
pub type DumpHook = Box<dyn FnMut(&SchedulerStats) + Send>;

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Time source for timer expiries and wait deadlines
    pub clock: Arc<dyn Clock>,

    /// Prefix for the names of worker threads spawned through the scheduler
    pub worker_name_prefix: String,
}

impl SchedulerOptions {
    /// Use the given clock
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Use the given worker thread name prefix
    pub fn with_worker_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.worker_name_prefix = prefix.into();
        self
    }
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            worker_name_prefix: "aosched-worker".to_string(),
        }
    }
}

/// Point-in-time view of the scheduler, handed to the dump hook
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Registered objects that are idle
    pub idle: usize,

    /// Registered objects waiting on a worker
    pub active: usize,

    /// Registered objects waiting to be dispatched
    pub completed: usize,

    /// Registered timers
    pub timers: usize,

    /// Time until the earliest timer expires (zero if already due)
    pub next_expiry_in: Option<Duration>,
}

/// Everything guarded by the monitor
struct Registry {
    /// Active objects in registration order
    objects: Vec<Arc<ObjectCell>>,
    /// Timers sorted by `(expiry, seq)`
    timers: Vec<TimerEntry>,
    /// Next registration sequence number
    next_seq: u64,
}

impl Registry {
    fn new() -> Self {
        Self {
            objects: Vec::new(),
            timers: Vec::new(),
            next_seq: 0,
        }
    }

    /// A completed object whose hook is not already running further up the stack
    fn any_ready(&self) -> bool {
        self.objects
            .iter()
            .any(|cell| cell.state() == ObjectState::Completed && !cell.hook().is_locked())
    }

    fn is_quiescent(&self) -> bool {
        self.timers.is_empty()
            && self
                .objects
                .iter()
                .all(|cell| cell.state() == ObjectState::Idle)
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn insert_timer(&mut self, entry: TimerEntry) {
        let key = entry.key();
        let at = self.timers.partition_point(|e| e.key() <= key);
        self.timers.insert(at, entry);
    }

    fn remove_timer(&mut self, id: TimerId) -> Option<TimerEntry> {
        let at = self.timers.iter().position(|e| e.id == id)?;
        Some(self.timers.remove(at))
    }

    fn next_expiry(&self) -> Option<Instant> {
        self.timers.first().map(|e| e.expiry)
    }

    /// Earliest expiry among timers whose handler is not already running
    fn next_ready_expiry(&self) -> Option<Instant> {
        self.timers
            .iter()
            .find(|e| !e.handler.is_locked())
            .map(|e| e.expiry)
    }

    /// Remove a due timer for firing; a periodic one goes straight back in
    /// with its expiry advanced by one period.
    ///
    /// A timer whose handler is running further up the stack stays where it
    /// is, still due, and `Busy` is returned.
    fn take_for_firing(&mut self, id: TimerId) -> Firing {
        let Some(at) = self.timers.iter().position(|e| e.id == id) else {
            return Firing::Gone;
        };
        if self.timers[at].handler.is_locked() {
            return Firing::Busy;
        }
        let mut entry = self.timers.remove(at);
        let handler = entry.handler.clone();
        let period = entry.period;
        if let Some(period) = period {
            entry.expiry += period;
            self.insert_timer(entry);
        }
        Firing::Fire { period, handler }
    }
}

/// Outcome of taking a due timer out of the registry
enum Firing {
    /// Deleted by an earlier handler in this pass
    Gone,
    /// Handler held by an enclosing dispatch; left due for a later pass
    Busy,
    Fire {
        period: Option<Duration>,
        handler: SharedHandler,
    },
}

/// Thread currently allowed to act as the scheduler thread
struct Owner {
    thread: ThreadId,
    /// Nesting depth of `run`/`dispatch`/`poll` calls on `thread`
    depth: usize,
}

/// Leaves the dispatch loop on drop
struct LoopGuard<'a> {
    owner: &'a Mutex<Owner>,
}

impl Drop for LoopGuard<'_> {
    fn drop(&mut self) {
        self.owner.lock().depth -= 1;
    }
}

/// State shared by every handle to one scheduler
struct Shared {
    /// Monitor mutex: both registries
    registry: Mutex<Registry>,
    /// Monitor condition: wakes the scheduler thread
    wake: Condvar,
    /// Thread allowed to perform scheduler-thread-only operations
    owner: Mutex<Owner>,
    clock: Arc<dyn Clock>,
    worker_name_prefix: String,
    dump: Mutex<Option<DumpHook>>,
}

/// Active-object scheduler
///
/// A cheap, cloneable handle. The thread that calls [`Scheduler::run`] (or
/// constructs the scheduler, until `run` is called) is the scheduler thread:
/// it alone activates objects, fires timers and runs completion hooks.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Create a scheduler owned by the calling thread, using the system clock
    pub fn new() -> Self {
        Self::with_options(SchedulerOptions::default())
    }

    /// Create a scheduler owned by the calling thread
    pub fn with_options(options: SchedulerOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::new()),
                wake: Condvar::new(),
                owner: Mutex::new(Owner {
                    thread: thread::current().id(),
                    depth: 0,
                }),
                clock: options.clock,
                worker_name_prefix: options.worker_name_prefix,
                dump: Mutex::new(None),
            }),
        }
    }

    /// The scheduler's time source
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.shared.clock
    }

    /// Whether the calling thread is the scheduler thread
    pub fn is_scheduler_thread(&self) -> bool {
        self.shared.owner.lock().thread == thread::current().id()
    }

    /// Make the calling thread the scheduler thread for the guard's lifetime.
    ///
    /// Ownership only moves while no loop is in progress; a second thread
    /// entering a running loop is a fatal violation.
    #[track_caller]
    fn enter_loop(&self, operation: &'static str) -> LoopGuard<'_> {
        let current = thread::current().id();
        let mut owner = self.shared.owner.lock();
        if owner.depth > 0 && owner.thread != current {
            drop(owner);
            violated(Violation::LoopOnOtherThread { operation });
        }
        owner.thread = current;
        owner.depth += 1;
        LoopGuard {
            owner: &self.shared.owner,
        }
    }

    /// Block the calling thread until `blocked` turns false.
    ///
    /// `blocked` is evaluated under the monitor lock, so a state change
    /// followed by a wake can never be missed.
    pub(crate) fn wait_while(&self, mut blocked: impl FnMut() -> bool) {
        let mut registry = self.shared.registry.lock();
        while blocked() {
            self.shared.wake.wait(&mut registry);
        }
    }

    /// Install the diagnostic hook, replacing any previous one
    pub fn set_dump(&self, dump: impl FnMut(&SchedulerStats) + Send + 'static) {
        *self.shared.dump.lock() = Some(Box::new(dump));
    }

    /// Remove the diagnostic hook
    pub fn clear_dump(&self) {
        self.shared.dump.lock().take();
    }

    /// Spawn a named worker thread
    pub fn spawn_worker<F, T>(&self, label: &str, f: F) -> io::Result<JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        thread::Builder::new()
            .name(format!("{}-{}", self.shared.worker_name_prefix, label))
            .spawn(f)
    }

    // ========================================================================
    // Registration
    // ========================================================================

    pub(crate) fn register_object(&self, hook: Box<dyn CompletionHook>) -> ActiveObject {
        let cell = Arc::new(ObjectCell::new(hook));
        tracing::trace!(object = %cell.id(), "object registered");
        self.shared.registry.lock().objects.push(cell.clone());
        ActiveObject::from_cell(cell, self.clone())
    }

    pub(crate) fn unregister_object(&self, id: ObjectId) -> bool {
        let cell = {
            let mut registry = self.shared.registry.lock();
            let Some(at) = registry.objects.iter().position(|c| c.id() == id) else {
                return false;
            };
            registry.objects.remove(at)
        };
        cell.retire();
        tracing::trace!(object = %id, "object deleted");
        true
    }

    pub(crate) fn register_timer(
        &self,
        delay: Duration,
        period: Option<Duration>,
        handler: Box<dyn TimerHandler>,
    ) -> Timer {
        let expiry = self.shared.clock.now() + delay;
        let id = {
            let mut registry = self.shared.registry.lock();
            let seq = registry.next_seq();
            let entry = TimerEntry::new(seq, expiry, period, handler);
            let id = entry.id;
            registry.insert_timer(entry);
            // A worker may register while the scheduler thread is blocked on
            // an older deadline.
            self.shared.wake.notify_all();
            id
        };
        tracing::trace!(timer = %id, ?delay, ?period, "timer registered");
        Timer::from_parts(id, period, self.clone())
    }

    pub(crate) fn unregister_timer(&self, id: TimerId) -> bool {
        let removed = self.shared.registry.lock().remove_timer(id).is_some();
        if removed {
            tracing::trace!(timer = %id, "timer deleted");
        }
        removed
    }

    pub(crate) fn timer_expiry(&self, id: TimerId) -> Option<Instant> {
        self.shared
            .registry
            .lock()
            .timers
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.expiry)
    }

    /// Wake the scheduler thread if it is blocked in `dispatch`
    pub(crate) fn wake(&self) {
        let _registry = self.shared.registry.lock();
        self.shared.wake.notify_all();
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Number of registered active objects
    pub fn object_count(&self) -> usize {
        self.shared.registry.lock().objects.len()
    }

    /// Number of registered timers
    pub fn timer_count(&self) -> usize {
        self.shared.registry.lock().timers.len()
    }

    /// Earliest registered timer expiry
    pub fn next_expiry(&self) -> Option<Instant> {
        self.shared.registry.lock().next_expiry()
    }

    /// Whether every object is idle and no timer remains; `run` exits on this
    pub fn is_quiescent(&self) -> bool {
        self.shared.registry.lock().is_quiescent()
    }

    /// Snapshot of registry counts
    pub fn stats(&self) -> SchedulerStats {
        let now = self.shared.clock.now();
        let registry = self.shared.registry.lock();
        let mut stats = SchedulerStats {
            timers: registry.timers.len(),
            next_expiry_in: registry
                .next_expiry()
                .map(|expiry| expiry.saturating_duration_since(now)),
            ..SchedulerStats::default()
        };
        for cell in &registry.objects {
            match cell.state() {
                ObjectState::Idle => stats.idle += 1,
                ObjectState::Active => stats.active += 1,
                ObjectState::Completed => stats.completed += 1,
            }
        }
        stats
    }

    // ========================================================================
    // Dispatch loop
    // ========================================================================

    /// Run dispatch steps until every object is idle and no timer remains.
    ///
    /// The calling thread becomes the scheduler thread. Stops at the first
    /// callback error.
    ///
    /// # Panics
    ///
    /// When another thread is already running the loop.
    #[track_caller]
    pub fn run(&self) -> EngineResult<()> {
        let _loop = self.enter_loop("run");
        tracing::debug!("scheduler loop starting");
        while !self.is_quiescent() {
            self.dispatch()?;
        }
        tracing::debug!("scheduler loop finished");
        Ok(())
    }

    /// One loop iteration: wait for a completion or the earliest expiry,
    /// fire due timers, then dispatch completed objects.
    ///
    /// The calling thread becomes the scheduler thread, unless another thread
    /// is inside `run`, `dispatch` or `poll`, which panics.
    #[track_caller]
    pub fn dispatch(&self) -> EngineResult<()> {
        let _loop = self.enter_loop("dispatch");
        self.wait_for_activity();
        self.deliver()
    }

    /// Fire due timers and dispatch completed objects without blocking.
    ///
    /// The calling thread becomes the scheduler thread, unless another thread
    /// is inside `run`, `dispatch` or `poll`, which panics.
    #[track_caller]
    pub fn poll(&self) -> EngineResult<()> {
        let _loop = self.enter_loop("poll");
        self.deliver()
    }

    fn deliver(&self) -> EngineResult<()> {
        self.fire_due_timers()?;
        self.deliver_completions()
    }

    /// Block until a completion is signalled or the earliest timer is due.
    ///
    /// Objects and timers whose callback is running further up the stack do
    /// not count: a nested dispatch blocks instead of spinning on them.
    fn wait_for_activity(&self) {
        let mut registry = self.shared.registry.lock();
        let mut dumped = false;
        loop {
            if registry.any_ready() {
                return;
            }
            let expiry = registry.next_ready_expiry();
            let now = self.shared.clock.now();
            if expiry.is_some_and(|expiry| expiry <= now) {
                return;
            }
            if !dumped {
                // The dump hook reads stats, which takes the monitor; re-check
                // afterwards since anything may have happened meanwhile.
                dumped = true;
                MutexGuard::unlocked(&mut registry, || self.run_dump());
                continue;
            }

            // `complete()` and timer registration notify under this lock, so
            // nothing can slip in between the checks above and the wait.
            match expiry {
                Some(expiry) => {
                    let timeout = expiry - now;
                    tracing::debug!(?timeout, "waiting for activity");
                    self.shared.wake.wait_for(&mut registry, timeout);
                }
                None => {
                    tracing::debug!("waiting for activity");
                    self.shared.wake.wait(&mut registry);
                }
            }
            return;
        }
    }

    fn run_dump(&self) {
        let mut dump = self.shared.dump.lock();
        if let Some(dump) = dump.as_mut() {
            let stats = self.stats();
            dump(&stats);
        }
    }

    /// Fire every timer that was due when the pass started, in
    /// `(expiry, seq)` order, releasing the monitor around each handler.
    fn fire_due_timers(&self) -> EngineResult<()> {
        let due: Vec<TimerId> = {
            let now = self.shared.clock.now();
            let registry = self.shared.registry.lock();
            registry
                .timers
                .iter()
                .take_while(|e| e.expiry <= now)
                .map(|e| e.id)
                .collect()
        };

        for id in due {
            let (period, handler) = match self.shared.registry.lock().take_for_firing(id) {
                Firing::Fire { period, handler } => (period, handler),
                Firing::Gone => continue,
                Firing::Busy => {
                    tracing::trace!(timer = %id, "handler busy, firing deferred");
                    continue;
                }
            };
            // Only the scheduler thread locks handlers, and it was free above
            let Some(mut handler) = handler.try_lock() else {
                continue;
            };
            tracing::trace!(timer = %id, "timer fired");
            let timer = Timer::from_parts(id, period, self.clone());
            handler
                .fire(&timer)
                .map_err(|err| DispatchError::timer(id, err))?;
        }
        Ok(())
    }

    /// Reset every completed object to idle and run its hook, in registry order
    fn deliver_completions(&self) -> EngineResult<()> {
        let objects: Vec<Arc<ObjectCell>> = self.shared.registry.lock().objects.clone();

        for cell in objects {
            if cell.state() != ObjectState::Completed || !cell.is_registered() {
                continue;
            }
            let Some(mut hook) = cell.hook().try_lock() else {
                // Its hook is running further up the stack; a later pass gets it.
                continue;
            };
            if cell
                .transition(ObjectState::Completed, ObjectState::Idle)
                .is_err()
            {
                continue;
            }

            // Only a worker of this cycle can hold a ticket yet: re-arming needs
            // set_active, which happens on this thread.
            let ticket = cell.latch().armed();
            let object = ActiveObject::from_cell(cell.clone(), self.clone());
            tracing::trace!(object = %cell.id(), "dispatching completion");
            let result = match hook.as_mut() {
                Some(hook) => hook.on_complete(&object),
                None => Ok(()),
            };
            if !cell.is_registered() {
                hook.take();
            }
            drop(hook);
            cell.latch().release_through(ticket);

            result.map_err(|err| DispatchError::completion(cell.id(), err))?;
        }
        Ok(())
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::HookResult;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn manual() -> (Scheduler, ManualClock) {
        let clock = ManualClock::new();
        let scheduler =
            Scheduler::with_options(SchedulerOptions::default().with_clock(clock.clone()));
        (scheduler, clock)
    }

    #[test]
    fn test_scheduler_creation() {
        let scheduler = Scheduler::new();
        assert_eq!(scheduler.object_count(), 0);
        assert_eq!(scheduler.timer_count(), 0);
        assert!(scheduler.is_quiescent());
        assert!(scheduler.is_scheduler_thread());
        assert_eq!(scheduler.next_expiry(), None);
    }

    #[test]
    fn test_run_returns_immediately_when_empty() {
        let scheduler = Scheduler::new();
        scheduler.run().unwrap();
    }

    #[test]
    fn test_timers_sorted_by_expiry_then_registration() {
        let (scheduler, clock) = manual();
        let late = Timer::once(&scheduler, Duration::from_millis(30), |_| Ok(()));
        let first = Timer::once(&scheduler, Duration::from_millis(10), |_| Ok(()));
        let second = Timer::once(&scheduler, Duration::from_millis(10), |_| Ok(()));

        let order: Vec<TimerId> = scheduler
            .shared
            .registry
            .lock()
            .timers
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(order, vec![first.id(), second.id(), late.id()]);
        assert_eq!(
            scheduler.next_expiry(),
            Some(clock.now() + Duration::from_millis(10))
        );
    }

    #[test]
    fn test_equal_expiries_fire_in_registration_order() {
        let (scheduler, clock) = manual();
        let fired = Arc::new(Mutex::new(Vec::new()));

        for label in ["a", "b", "c"] {
            let fired = fired.clone();
            Timer::once(&scheduler, Duration::from_millis(5), move |_| {
                fired.lock().push(label);
                Ok(())
            });
        }

        clock.advance_ms(5);
        scheduler.poll().unwrap();
        assert_eq!(*fired.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_stats_counts_states() {
        let (scheduler, clock) = manual();
        let idle = ActiveObject::new(&scheduler, |_| Ok(()));
        let active = ActiveObject::new(&scheduler, |_| Ok(()));
        let completed = ActiveObject::new(&scheduler, |_| Ok(()));
        active.set_active();
        completed.set_active();
        completed.complete();
        Timer::once(&scheduler, Duration::from_millis(40), |_| Ok(()));
        clock.advance_ms(15);

        let stats = scheduler.stats();
        assert_eq!(
            stats,
            SchedulerStats {
                idle: 1,
                active: 1,
                completed: 1,
                timers: 1,
                next_expiry_in: Some(Duration::from_millis(25)),
            }
        );
        assert!(idle.is_idle());
    }

    #[test]
    fn test_dispatch_skips_wait_when_completed() {
        let scheduler = Scheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let object = {
            let hits = hits.clone();
            ActiveObject::new(&scheduler, move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        };

        object.set_active();
        object.complete();
        scheduler.dispatch().unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(object.is_idle());
        assert!(scheduler.is_quiescent());
    }

    #[test]
    fn test_dump_called_before_blocking() {
        let scheduler = Scheduler::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = seen.clone();
            scheduler.set_dump(move |stats: &SchedulerStats| seen.lock().push(stats.clone()));
        }
        Timer::once(&scheduler, Duration::from_millis(5), |_| Ok(()));

        scheduler.run().unwrap();

        let seen = seen.lock();
        assert!(!seen.is_empty());
        assert_eq!(seen[0].timers, 1);
    }

    #[test]
    fn test_dump_not_called_when_work_is_ready() {
        let scheduler = Scheduler::new();
        let calls = Arc::new(AtomicUsize::new(0));
        {
            let calls = calls.clone();
            scheduler.set_dump(move |_: &SchedulerStats| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }
        let object = ActiveObject::new(&scheduler, |_| Ok(()));
        object.set_active();
        object.complete();

        scheduler.dispatch().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        scheduler.clear_dump();
    }

    #[test]
    fn test_completion_error_stops_dispatch() {
        let scheduler = Scheduler::new();
        let object = ActiveObject::new(&scheduler, |_: &ActiveObject| -> HookResult {
            anyhow::bail!("hook failed")
        });
        object.set_active();
        object.complete();

        let err = scheduler.run().unwrap_err();
        match err {
            DispatchError::Completion { object: id, .. } => assert_eq!(id, object.id()),
            other => panic!("unexpected error: {other}"),
        }
        assert!(object.is_idle());
    }

    #[test]
    fn test_hook_may_reactivate_its_object() {
        let scheduler = Scheduler::new();
        let rounds = Arc::new(AtomicUsize::new(0));
        let object = {
            let rounds = rounds.clone();
            ActiveObject::new(&scheduler, move |object| {
                if rounds.fetch_add(1, Ordering::SeqCst) < 2 {
                    object.set_active();
                    object.complete();
                }
                Ok(())
            })
        };

        object.set_active();
        object.complete();
        scheduler.run().unwrap();
        assert_eq!(rounds.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_hook_may_delete_its_object() {
        let scheduler = Scheduler::new();
        let object = ActiveObject::new(&scheduler, |object| {
            object.delete();
            Ok(())
        });

        object.set_active();
        object.complete();
        scheduler.run().unwrap();
        assert!(!object.is_registered());
        assert_eq!(scheduler.object_count(), 0);
    }

    #[test]
    fn test_worker_name_prefix() {
        let scheduler = Scheduler::with_options(
            SchedulerOptions::default().with_worker_name_prefix("unit"),
        );
        let name = scheduler
            .spawn_worker("naming", || thread::current().name().map(str::to_string))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(name.as_deref(), Some("unit-naming"));
    }

    #[test]
    fn test_dump_skipped_when_timer_already_due() {
        let (scheduler, clock) = manual();
        let calls = Arc::new(AtomicUsize::new(0));
        {
            let calls = calls.clone();
            scheduler.set_dump(move |_: &SchedulerStats| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }
        Timer::once(&scheduler, Duration::from_millis(5), |_: &Timer| Ok(()));
        clock.advance_ms(5);

        scheduler.dispatch().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.timer_count(), 0);
    }

    #[test]
    fn test_poll_from_another_thread_during_run_is_refused() {
        let scheduler = Scheduler::new();
        let object = ActiveObject::new(&scheduler, |_| Ok(()));
        let refused = Arc::new(AtomicBool::new(false));
        {
            let object = object.clone();
            let refused = refused.clone();
            Timer::once(&scheduler, Duration::ZERO, move |timer: &Timer| {
                let foreign = timer.scheduler().clone();
                let outcome = thread::spawn(move || foreign.poll()).join();
                refused.store(outcome.is_err(), Ordering::SeqCst);

                // The loop thread keeps its identity
                object.set_active();
                object.complete();
                Ok(())
            });
        }

        scheduler.run().unwrap();
        assert!(refused.load(Ordering::SeqCst));
        assert!(object.is_idle());
        assert!(scheduler.is_scheduler_thread());
    }

    #[test]
    fn test_poll_rebinds_when_no_loop_runs() {
        let scheduler = Scheduler::new();
        let other = scheduler.clone();
        let bound = thread::spawn(move || {
            other.poll().unwrap();
            other.is_scheduler_thread()
        })
        .join()
        .unwrap();

        assert!(bound);
        assert!(!scheduler.is_scheduler_thread());
    }
}
