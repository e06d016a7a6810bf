//! Aosched Engine
//!
//! Active-object scheduling runtime:
//! - **Scheduler**: single dispatch thread that owns every state-affecting decision
//! - **ActiveObject**: unit of work completed from any thread, delivered on the scheduler thread
//! - **Timer / PeriodicTimer**: deferred and recurring callbacks driven by the same loop
//! - **ActiveThread**: synchronous bridge running a function on a worker thread
//!
//! # Example
//!
//! ```rust,ignore
//! use aosched_engine::{ActiveThread, Scheduler, Timer};
//! use std::time::Duration;
//!
//! let scheduler = Scheduler::new();
//! Timer::once(&scheduler, Duration::from_secs(1), |_: &Timer| {
//!     println!("fired");
//!     Ok(())
//! });
//! let answer = ActiveThread::run(&scheduler, || 6 * 7)?;
//! scheduler.run()?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod clock;
pub mod error;
pub mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DispatchError, EngineResult, HookResult, Violation};
pub use scheduler::{
    ActiveObject, ActiveThread, CompletionHook, DumpHook, Latch, ObjectId, ObjectState,
    PeriodicTimer, Scheduler, SchedulerOptions, SchedulerStats, Timer, TimerHandler, TimerId,
};
