//! Active-object scheduler
//!
//! One scheduler thread runs every completion hook and timer handler. Worker
//! threads report back through `ActiveObject::complete`, which wakes the
//! scheduler thread and parks the worker on the object's latch until the
//! hook has run.

mod bridge;
mod latch;
mod object;
#[allow(clippy::module_inception)]
mod scheduler;
mod timer;

pub use bridge::ActiveThread;
pub use latch::Latch;
pub use object::{ActiveObject, CompletionHook, ObjectId, ObjectState};
pub use scheduler::{DumpHook, Scheduler, SchedulerOptions, SchedulerStats};
pub use timer::{PeriodicTimer, Timer, TimerHandler, TimerId};
