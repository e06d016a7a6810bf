//! File readers driven by the scheduler
//!
//! Both readers read a file on worker threads and deliver each chunk to a
//! consumer callback on the scheduler thread. An empty chunk marks the end
//! of the file; after delivering it the reader deletes its active object.
//!
//! - [`ChunkedReader`] starts a fresh worker thread per chunk.
//! - [`ContinuousReader`] keeps one worker thread reading in a loop, parked
//!   in `complete()` while each chunk is delivered.

mod chunked;
mod continuous;

pub use chunked::ChunkedReader;
pub use continuous::ContinuousReader;

use crate::error::ReaderError;
use aosched_engine::HookResult;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Bytes read per chunk unless the caller asks otherwise
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Open file plus the hand-over slot between the reading worker and the hook
struct ChunkSource {
    path: PathBuf,
    chunk_size: usize,
    file: Mutex<File>,
    /// Last chunk read, waiting for delivery
    slot: Mutex<Option<io::Result<Vec<u8>>>>,
}

impl ChunkSource {
    fn open(path: &Path, chunk_size: usize) -> Result<Arc<Self>, ReaderError> {
        let file = File::open(path).map_err(|source| ReaderError::io(path, source))?;
        Ok(Arc::new(Self {
            path: path.to_path_buf(),
            chunk_size: chunk_size.max(1),
            file: Mutex::new(file),
            slot: Mutex::new(None),
        }))
    }

    /// Read the next chunk into the slot; returns whether more may follow
    fn fill(&self) -> bool {
        let mut chunk = Vec::with_capacity(self.chunk_size);
        let read = {
            let mut file = self.file.lock();
            file.by_ref()
                .take(self.chunk_size as u64)
                .read_to_end(&mut chunk)
        };
        let more = matches!(read, Ok(n) if n > 0);
        *self.slot.lock() = Some(read.map(|_| chunk));
        more
    }

    /// Hand the slot's chunk to the consumer; returns whether more may follow
    fn deliver<F>(&self, on_chunk: &mut F) -> anyhow::Result<bool>
    where
        F: FnMut(&[u8]) -> HookResult,
    {
        let chunk = self
            .slot
            .lock()
            .take()
            .unwrap_or_else(|| Ok(Vec::new()))
            .map_err(|source| ReaderError::io(&self.path, source))?;
        tracing::trace!(path = %self.path.display(), len = chunk.len(), "chunk delivered");
        on_chunk(&chunk)?;
        Ok(!chunk.is_empty())
    }
}
