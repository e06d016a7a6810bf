//! Active objects and their lifecycle state machine
//!
//! ```text
//! Idle --set_active (scheduler thread)--> Active --complete (any thread)--> Completed
//!   ^                                                                           |
//!   +------------------- dispatch (scheduler thread), then hook ----------------+
//! ```

use crate::error::{violated, HookResult, Violation};
use crate::scheduler::{Latch, Scheduler};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// Unique identifier for an ActiveObject
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

impl ObjectId {
    /// Generate a new unique ObjectId
    pub fn new() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric ID value
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Create an ObjectId from a u64 value
    pub fn from_u64(id: u64) -> Self {
        ObjectId(id)
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of an ActiveObject
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjectState {
    /// Not waiting on anything
    Idle = 0,
    /// Work outstanding on some worker thread
    Active = 1,
    /// Work finished, waiting for the scheduler thread to dispatch it
    Completed = 2,
}

impl ObjectState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ObjectState::Active,
            2 => ObjectState::Completed,
            _ => ObjectState::Idle,
        }
    }
}

/// Behaviour run on the scheduler thread each time an object is dispatched
///
/// Closures of the form `FnMut(&ActiveObject) -> HookResult` implement this
/// directly; implement it on a struct when the hook carries its own state.
pub trait CompletionHook: Send {
    /// Called on the scheduler thread after the object was reset to `Idle`
    fn on_complete(&mut self, object: &ActiveObject) -> HookResult;
}

impl<F> CompletionHook for F
where
    F: FnMut(&ActiveObject) -> HookResult + Send,
{
    fn on_complete(&mut self, object: &ActiveObject) -> HookResult {
        self(object)
    }
}

/// Hook installed when the owner supplied none
struct MissingHook;

impl CompletionHook for MissingHook {
    fn on_complete(&mut self, object: &ActiveObject) -> HookResult {
        violated(Violation::MissingCompletionHook {
            object: object.id(),
        })
    }
}

/// Shared per-object state, owned jointly by the registry and every handle
pub(crate) struct ObjectCell {
    /// Unique identifier
    id: ObjectId,
    /// Current `ObjectState`, stored as its discriminant
    state: AtomicU8,
    /// Signals a worker parked in `complete()` that dispatch has happened
    latch: Latch,
    /// Completion hook; held locked for the duration of a dispatch
    hook: Mutex<Option<Box<dyn CompletionHook>>>,
    /// Cleared once the object is deleted from the registry
    registered: AtomicBool,
}

impl ObjectCell {
    pub(crate) fn new(hook: Box<dyn CompletionHook>) -> Self {
        Self {
            id: ObjectId::new(),
            state: AtomicU8::new(ObjectState::Idle as u8),
            latch: Latch::new(),
            hook: Mutex::new(Some(hook)),
            registered: AtomicBool::new(true),
        }
    }

    pub(crate) fn id(&self) -> ObjectId {
        self.id
    }

    pub(crate) fn state(&self) -> ObjectState {
        ObjectState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Atomically move `from -> to`; returns the observed state on failure
    pub(crate) fn transition(&self, from: ObjectState, to: ObjectState) -> Result<(), ObjectState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(ObjectState::from_u8)
    }

    pub(crate) fn force_idle(&self) {
        self.state.store(ObjectState::Idle as u8, Ordering::Release);
    }

    pub(crate) fn latch(&self) -> &Latch {
        &self.latch
    }

    pub(crate) fn hook(&self) -> &Mutex<Option<Box<dyn CompletionHook>>> {
        &self.hook
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    /// Mark deleted, drop the hook if it is not running, and free any waiter
    pub(crate) fn retire(&self) {
        self.registered.store(false, Ordering::Release);
        // A hook deleting its own object holds this lock; dispatch drops it afterwards.
        if let Some(mut hook) = self.hook.try_lock() {
            hook.take();
        }
        self.latch.release();
    }
}

/// Handle to an active object registered with a [`Scheduler`]
///
/// Handles are cheap to clone; all clones refer to the same object.
#[derive(Clone)]
pub struct ActiveObject {
    cell: Arc<ObjectCell>,
    scheduler: Scheduler,
}

impl ActiveObject {
    /// Register a new idle object whose completion behaviour is the closure `hook`
    pub fn new<F>(scheduler: &Scheduler, hook: F) -> Self
    where
        F: FnMut(&ActiveObject) -> HookResult + Send + 'static,
    {
        scheduler.register_object(Box::new(hook))
    }

    /// Register a new idle object driven by a [`CompletionHook`] implementation
    pub fn with_hook(scheduler: &Scheduler, hook: impl CompletionHook + 'static) -> Self {
        scheduler.register_object(Box::new(hook))
    }

    /// Register a new idle object with the default hook.
    ///
    /// Dispatching such an object is a fatal violation; this exists for
    /// objects that are expected never to complete.
    pub fn without_hook(scheduler: &Scheduler) -> Self {
        scheduler.register_object(Box::new(MissingHook))
    }

    pub(crate) fn from_cell(cell: Arc<ObjectCell>, scheduler: Scheduler) -> Self {
        Self { cell, scheduler }
    }

    /// Unique identifier
    pub fn id(&self) -> ObjectId {
        self.cell.id()
    }

    /// Scheduler this object is registered with
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Current lifecycle state
    pub fn state(&self) -> ObjectState {
        self.cell.state()
    }

    /// Whether the object is idle
    pub fn is_idle(&self) -> bool {
        self.state() == ObjectState::Idle
    }

    /// Whether the object is waiting on a worker
    pub fn is_active(&self) -> bool {
        self.state() == ObjectState::Active
    }

    /// Whether the object is waiting to be dispatched
    pub fn is_completed(&self) -> bool {
        self.state() == ObjectState::Completed
    }

    /// Whether the object is still in the scheduler's registry
    pub fn is_registered(&self) -> bool {
        self.cell.is_registered()
    }

    /// Mark the object as having outstanding work.
    ///
    /// Must be called on the scheduler thread while the object is idle.
    ///
    /// # Panics
    ///
    /// On a deleted object, off the scheduler thread, or when not idle.
    #[track_caller]
    pub fn set_active(&self) {
        let object = self.id();
        if !self.cell.is_registered() {
            violated(Violation::NotRegistered { object });
        }
        if !self.scheduler.is_scheduler_thread() {
            violated(Violation::WrongThread {
                operation: "set_active",
                object,
            });
        }
        if let Err(state) = self.cell.transition(ObjectState::Idle, ObjectState::Active) {
            violated(Violation::NotIdle { object, state });
        }
        tracing::debug!(%object, "object active");
    }

    /// Report the outstanding work as done and wake the scheduler thread.
    ///
    /// Off the scheduler thread this blocks until the completion hook has run.
    /// On the scheduler thread it returns immediately; the hook runs on a later
    /// dispatch. On a deleted object it never blocks.
    ///
    /// # Panics
    ///
    /// When the object is not active.
    #[track_caller]
    pub fn complete(&self) {
        let object = self.id();
        // Arm before publishing Completed so the release cannot be missed.
        let ticket = self.cell.latch().arm();
        if let Err(state) = self
            .cell
            .transition(ObjectState::Active, ObjectState::Completed)
        {
            violated(Violation::NotActive { object, state });
        }
        tracing::debug!(%object, "object completed");
        self.scheduler.wake();

        // Nothing dispatches a deleted object; delete() releases anything
        // armed before it, so only a completion after it needs this check.
        if !self.scheduler.is_scheduler_thread() && self.cell.is_registered() {
            self.cell.latch().wait(ticket);
        }
    }

    /// Force the object back to idle.
    ///
    /// Does not stop a worker already doing the work; a worker parked in
    /// `complete()` for this object is released.
    pub fn cancel(&self) {
        tracing::debug!(object = %self.id(), "object cancelled");
        self.cell.force_idle();
        self.cell.latch().release();
    }

    /// Remove the object from the scheduler's registry.
    ///
    /// Returns whether the object was still registered.
    pub fn delete(&self) -> bool {
        self.scheduler.unregister_object(self.id())
    }
}

impl fmt::Debug for ActiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveObject")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("registered", &self.is_registered())
            .finish()
    }
}
