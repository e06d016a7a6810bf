//! Runtime error types.

use std::path::PathBuf;

/// Errors returned to mailbox senders
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MailboxError {
    /// A blocking request was made from the scheduler thread
    #[error("request() on the scheduler thread would deadlock")]
    WouldDeadlock,

    /// The mailbox was closed before the message was delivered
    #[error("mailbox is closed")]
    Closed,
}

/// Errors raised by the file readers
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// Opening or reading the file failed
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The worker thread for the next chunk could not be started
    #[error("failed to spawn reader thread: {0}")]
    Spawn(#[source] std::io::Error),
}

impl ReaderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReaderError::Io {
            path: path.into(),
            source,
        }
    }
}
