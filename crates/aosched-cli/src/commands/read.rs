//! `aosched read` - stream a file through the readers

use aosched_engine::{HookResult, Scheduler};
use aosched_runtime::{ChunkedReader, ContinuousReader};
use anyhow::{bail, Context};
use clap::ValueEnum;
use parking_lot::Mutex;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Which reader(s) to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReadMode {
    /// One worker thread per chunk
    Chunked,
    /// One long-lived worker thread
    Continuous,
    /// Both readers at once; their output must match
    Both,
}

type Contents = Arc<Mutex<Vec<u8>>>;

fn collector() -> (Contents, impl FnMut(&[u8]) -> HookResult + Send + 'static) {
    let contents: Contents = Arc::default();
    let sink = contents.clone();
    let on_chunk = move |chunk: &[u8]| -> HookResult {
        sink.lock().extend_from_slice(chunk);
        Ok(())
    };
    (contents, on_chunk)
}

pub fn execute(
    scheduler: &Scheduler,
    path: &Path,
    chunk_size: usize,
    mode: ReadMode,
) -> anyhow::Result<()> {
    let mut outputs = Vec::new();

    if matches!(mode, ReadMode::Chunked | ReadMode::Both) {
        let (contents, on_chunk) = collector();
        ChunkedReader::open(scheduler, path, chunk_size, on_chunk)
            .with_context(|| format!("opening {} for chunked reading", path.display()))?;
        outputs.push(("chunked", contents));
    }
    if matches!(mode, ReadMode::Continuous | ReadMode::Both) {
        let (contents, on_chunk) = collector();
        ContinuousReader::open(scheduler, path, chunk_size, on_chunk)
            .with_context(|| format!("opening {} for continuous reading", path.display()))?;
        outputs.push(("continuous", contents));
    }

    scheduler.run()?;

    let mut outputs = outputs
        .iter()
        .map(|(name, contents)| (*name, std::mem::take(&mut *contents.lock())));
    let Some((first_name, first)) = outputs.next() else {
        return Ok(());
    };
    for (name, other) in outputs {
        if other != first {
            bail!(
                "{name} reader delivered {} bytes, {first_name} reader {} bytes",
                other.len(),
                first.len()
            );
        }
    }
    tracing::info!(bytes = first.len(), "readers agree");

    std::io::stdout().write_all(&first)?;
    Ok(())
}
