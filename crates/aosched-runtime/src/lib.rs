//! Aosched Runtime
//!
//! Collaborators built purely on the engine's public contract:
//! - [`Mailbox`]: message-queue actor that runs closures posted from any thread
//!   on the scheduler thread
//! - [`ChunkedReader`] / [`ContinuousReader`]: file readers that hand chunks
//!   read on worker threads to a consumer on the scheduler thread

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod mailbox;
pub mod reader;

pub use error::{MailboxError, ReaderError};
pub use mailbox::Mailbox;
pub use reader::{ChunkedReader, ContinuousReader, DEFAULT_CHUNK_SIZE};
