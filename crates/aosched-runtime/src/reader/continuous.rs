//! Reader with one long-lived worker thread

use super::ChunkSource;
use crate::error::ReaderError;
use aosched_engine::{ActiveObject, HookResult, ObjectId, Scheduler};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Reads a file on a single worker thread that loops until end of file
///
/// The worker stays parked in `complete()` while a chunk is delivered; the
/// hook re-arms the object before releasing it, so the next `complete()`
/// always finds the object active.
#[derive(Debug)]
pub struct ContinuousReader {
    object: ActiveObject,
    path: PathBuf,
}

impl ContinuousReader {
    /// Open `path` and start the reading thread. Must be called on the
    /// scheduler thread.
    ///
    /// `on_chunk` behaves as for [`ChunkedReader::open`](super::ChunkedReader::open).
    pub fn open<F>(
        scheduler: &Scheduler,
        path: impl AsRef<Path>,
        chunk_size: usize,
        mut on_chunk: F,
    ) -> Result<Self, ReaderError>
    where
        F: FnMut(&[u8]) -> HookResult + Send + 'static,
    {
        let path = path.as_ref().to_path_buf();
        let source = ChunkSource::open(&path, chunk_size)?;
        // Set by the hook before it stops re-arming; read by the worker after
        // its complete() returns.
        let stop = Arc::new(AtomicBool::new(false));

        let object = {
            let source = source.clone();
            let stop = stop.clone();
            ActiveObject::new(scheduler, move |object| {
                let more = source.deliver(&mut on_chunk);
                if matches!(more, Ok(true)) {
                    object.set_active();
                    return Ok(());
                }
                stop.store(true, Ordering::Release);
                object.delete();
                tracing::debug!(object = %object.id(), "continuous reader finished");
                more.map(|_| ())
            })
        };
        object.set_active();

        let worker = {
            let object = object.clone();
            move || loop {
                let more = source.fill();
                object.complete();
                if !more || stop.load(Ordering::Acquire) {
                    break;
                }
            }
        };
        if let Err(err) = scheduler.spawn_worker("continuous-reader", worker) {
            object.cancel();
            object.delete();
            return Err(ReaderError::Spawn(err));
        }

        tracing::debug!(object = %object.id(), path = %path.display(), "continuous reader open");
        Ok(Self { object, path })
    }

    /// Identifier of the reader's active object
    pub fn id(&self) -> ObjectId {
        self.object.id()
    }

    /// File being read
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the reader has delivered end of file or stopped on an error
    pub fn is_finished(&self) -> bool {
        !self.object.is_registered()
    }
}
