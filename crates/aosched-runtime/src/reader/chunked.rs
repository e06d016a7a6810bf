//! Reader that spawns one worker thread per chunk

use super::ChunkSource;
use crate::error::ReaderError;
use aosched_engine::{ActiveObject, HookResult, ObjectId, Scheduler};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reads a file one chunk per worker thread
///
/// Each delivery re-arms the object and starts the next read from the hook,
/// so at most one read is in flight.
#[derive(Debug)]
pub struct ChunkedReader {
    object: ActiveObject,
    path: PathBuf,
}

impl ChunkedReader {
    /// Open `path` and start reading it. Must be called on the scheduler thread.
    ///
    /// `on_chunk` runs on the scheduler thread for every chunk, then once
    /// with an empty slice at end of file. An error from `on_chunk`, or a
    /// read error, stops the reader and fails the dispatch that delivered it.
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

        let object = {
            let source = source.clone();
            ActiveObject::new(scheduler, move |object| {
                let more = source.deliver(&mut on_chunk);
                match more {
                    Ok(true) => start_read(&source, object).map_err(|err| {
                        object.delete();
                        anyhow::Error::from(err)
                    }),
                    Ok(false) => {
                        tracing::debug!(object = %object.id(), "chunked reader finished");
                        object.delete();
                        Ok(())
                    }
                    Err(err) => {
                        object.delete();
                        Err(err)
                    }
                }
            })
        };

        if let Err(err) = start_read(&source, &object) {
            object.delete();
            return Err(err);
        }
        tracing::debug!(object = %object.id(), path = %path.display(), "chunked reader open");
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

/// Activate the object and read the next chunk on a fresh worker thread
fn start_read(source: &Arc<ChunkSource>, object: &ActiveObject) -> Result<(), ReaderError> {
    object.set_active();
    let worker = {
        let source = source.clone();
        let object = object.clone();
        move || {
            source.fill();
            object.complete();
        }
    };
    match object.scheduler().spawn_worker("chunked-reader", worker) {
        Ok(_) => Ok(()),
        Err(err) => {
            object.cancel();
            Err(ReaderError::Spawn(err))
        }
    }
}
