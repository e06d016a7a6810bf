//! Synchronous bridge: run a function on a worker thread, return on completion
//!
//! The work still flows through the scheduler's single dispatch point: the
//! caller pumps `dispatch()` until the worker's completion has been delivered.

use crate::error::{DispatchError, EngineResult};
use crate::scheduler::{ActiveObject, Scheduler};
use std::panic::{self, AssertUnwindSafe};
use std::thread::JoinHandle;

/// Runs a function on a dedicated worker thread as an active object
pub struct ActiveThread;

impl ActiveThread {
    /// Run `f` on a worker thread and return its value.
    ///
    /// Must be called on the scheduler thread. Returns once `f` has finished
    /// and the scheduler has dispatched the completion; timers and other
    /// objects due in the meantime are serviced by the same dispatch calls.
    /// A panic inside `f` is resumed on the calling thread.
    ///
    /// # Errors
    ///
    /// The worker thread could not be spawned, or a callback dispatched while
    /// waiting failed.
    pub fn run<F, T>(scheduler: &Scheduler, f: F) -> EngineResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let object = ActiveObject::new(scheduler, |_| Ok(()));
        object.set_active();
        tracing::debug!(object = %object.id(), "bridge starting worker");

        let worker = {
            let object = object.clone();
            scheduler.spawn_worker("bridge", move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(f));
                object.complete();
                outcome
            })
        };
        let worker = match worker {
            Ok(worker) => worker,
            Err(source) => {
                object.cancel();
                object.delete();
                return Err(DispatchError::Spawn { source });
            }
        };

        let pumped = Self::pump(scheduler, &object);
        if pumped.is_err() {
            // Let the worker reach complete() before freeing it, so it never
            // observes a cancelled object. complete() wakes the monitor.
            scheduler.wait_while(|| object.is_active());
            object.cancel();
        }
        let outcome = Self::join(worker);
        object.delete();
        tracing::debug!(object = %object.id(), "bridge finished");

        pumped?;
        match outcome {
            Ok(value) => Ok(value),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Dispatch until the bridge object has been delivered back to idle
    fn pump(scheduler: &Scheduler, object: &ActiveObject) -> EngineResult<()> {
        while !object.is_idle() {
            scheduler.dispatch()?;
        }
        Ok(())
    }

    fn join<T>(worker: JoinHandle<std::thread::Result<T>>) -> std::thread::Result<T> {
        match worker.join() {
            Ok(outcome) => outcome,
            Err(payload) => Err(payload),
        }
    }
}
