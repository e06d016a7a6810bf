//! Engine error types.
//!
//! Two very different failure classes live here:
//! - [`Violation`]: a broken scheduler invariant. Never returned; raised
//!   through [`violated`], which panics (and aborts under the release profile).
//! - [`DispatchError`]: a user callback returned an error. Returned from
//!   `dispatch()` / `run()`, which stop at the first one.

use crate::scheduler::{ObjectId, ObjectState, TimerId};

/// Result returned by completion hooks and timer handlers
pub type HookResult = anyhow::Result<()>;

/// Boxed callback failure carried by [`DispatchError`]
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fatal precondition failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    /// `set_active` on an object that is not idle
    #[error("active object {object} is not idle (state: {state:?})")]
    NotIdle {
        /// Offending object
        object: ObjectId,
        /// State observed instead
        state: ObjectState,
    },

    /// `complete` on an object that is not active
    #[error("active object {object} is not active (state: {state:?})")]
    NotActive {
        /// Offending object
        object: ObjectId,
        /// State observed instead
        state: ObjectState,
    },

    /// Scheduler-thread-only operation called from another thread
    #[error("{operation} called on active object {object} off the scheduler thread")]
    WrongThread {
        /// Operation name
        operation: &'static str,
        /// Offending object
        object: ObjectId,
    },

    /// `run`, `dispatch` or `poll` entered while another thread is in the loop
    #[error("{operation} called while the dispatch loop runs on another thread")]
    LoopOnOtherThread {
        /// Operation name
        operation: &'static str,
    },

    /// Completed object dispatched without a completion hook
    #[error("active object {object} has no completion hook")]
    MissingCompletionHook {
        /// Offending object
        object: ObjectId,
    },

    /// Periodic timer fired without a handler
    #[error("periodic timer {timer} has no fire handler")]
    MissingTimerHandler {
        /// Offending timer
        timer: TimerId,
    },

    /// Operation on an object that was deleted from the scheduler
    #[error("active object {object} is not registered with the scheduler")]
    NotRegistered {
        /// Offending object
        object: ObjectId,
    },
}

/// Raise a fatal invariant violation.
#[track_caller]
pub(crate) fn violated(violation: Violation) -> ! {
    tracing::error!(%violation, "scheduler invariant violated");
    panic!("{violation}");
}

/// A user callback failed during dispatch
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Completion hook returned an error
    #[error("completion hook of active object {object} failed: {source}")]
    Completion {
        /// Object whose hook failed
        object: ObjectId,
        /// Error returned by the hook
        #[source]
        source: CallbackError,
    },

    /// Timer handler returned an error
    #[error("handler of timer {timer} failed: {source}")]
    Timer {
        /// Timer whose handler failed
        timer: TimerId,
        /// Error returned by the handler
        #[source]
        source: CallbackError,
    },

    /// A worker thread could not be started
    #[error("failed to spawn worker thread: {source}")]
    Spawn {
        /// OS error from the thread builder
        #[source]
        source: std::io::Error,
    },
}

impl DispatchError {
    pub(crate) fn completion(object: ObjectId, err: anyhow::Error) -> Self {
        DispatchError::Completion {
            object,
            source: err.into(),
        }
    }

    pub(crate) fn timer(timer: TimerId, err: anyhow::Error) -> Self {
        DispatchError::Timer {
            timer,
            source: err.into(),
        }
    }
}

/// Engine result type
pub type EngineResult<T> = Result<T, DispatchError>;
