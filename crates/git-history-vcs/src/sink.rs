// Copyright 2026 Oxide Computer Company

//! Output files written by background tasks.

use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use git_history::{Sink, SinkError, SinkFactory};
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tokio::{
    io::{AsyncWriteExt, BufWriter},
    sync::{Notify, mpsc},
    task::JoinHandle,
};

/// Queued bytes above which a [`FileSink`] asks the caller to wait.
pub const DEFAULT_HIGH_WATER: usize = 16 * 1024 * 1024;

/// Creates [`FileSink`]s that share one drain notification.
///
/// Must be used from within a tokio runtime: every sink spawns its writer
/// task on creation.
#[derive(Debug, Clone)]
pub struct FileFactory {
    high_water: usize,
    drained: Arc<Notify>,
}

impl Default for FileFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl FileFactory {
    /// Creates a factory with the default high-water mark.
    pub fn new() -> Self {
        Self::with_high_water(DEFAULT_HIGH_WATER)
    }

    /// Creates a factory whose sinks apply back-pressure once more than
    /// `high_water` bytes are queued.
    pub fn with_high_water(high_water: usize) -> Self {
        FileFactory { high_water, drained: Arc::new(Notify::new()) }
    }

    /// Returns the notification signalled when a sink that refused a write
    /// has caught up, or when its writer failed.
    pub fn drained(&self) -> Arc<Notify> {
        Arc::clone(&self.drained)
    }
}

impl SinkFactory for FileFactory {
    type Sink = FileSink;

    fn create(&mut self, path: &Utf8Path) -> Result<FileSink, SinkError> {
        let file = fs::File::create(path).map_err(|source| {
            SinkError::Create { path: path.to_owned(), source }
        })?;
        let (file, _) = file.into_parts();

        let state = Arc::new(QueueState {
            queued: AtomicUsize::new(0),
            full: AtomicBool::new(false),
            high_water: self.high_water,
            drained: Arc::clone(&self.drained),
        });
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(write_file(
            path.to_owned(),
            tokio::fs::File::from_std(file),
            rx,
            Arc::clone(&state),
        ));
        Ok(FileSink { path: path.to_owned(), tx, state, task })
    }
}

#[derive(Debug)]
struct QueueState {
    queued: AtomicUsize,
    full: AtomicBool,
    high_water: usize,
    drained: Arc<Notify>,
}

impl QueueState {
    fn release(&self, len: usize) {
        let before = self.queued.fetch_sub(len, Ordering::AcqRel);
        if before - len < self.high_water
            && self.full.swap(false, Ordering::AcqRel)
        {
            self.drained.notify_one();
        }
    }
}

/// One output file, fed through an unbounded channel to a writer task.
///
/// Queued bytes are counted; [`Sink::write`] returns `false` once they
/// exceed the high-water mark, and the factory's drain notification fires
/// when the writer has caught up.
#[derive(Debug)]
pub struct FileSink {
    path: Utf8PathBuf,
    tx: mpsc::UnboundedSender<Vec<u8>>,
    state: Arc<QueueState>,
    task: JoinHandle<Result<(), SinkError>>,
}

impl FileSink {
    fn send(&self, bytes: &[u8]) -> Result<usize, SinkError> {
        let queued =
            self.state.queued.fetch_add(bytes.len(), Ordering::AcqRel)
                + bytes.len();
        self.tx
            .send(bytes.to_vec())
            .map_err(|_| SinkError::Closed { path: self.path.clone() })?;
        Ok(queued)
    }
}

impl Sink for FileSink {
    type Pending = JoinHandle<Result<(), SinkError>>;

    fn write(&mut self, bytes: &[u8]) -> Result<bool, SinkError> {
        let state = &self.state;
        if self.send(bytes)? < state.high_water {
            return Ok(true);
        }
        state.full.store(true, Ordering::Release);
        // The writer may have caught up before `full` was set.
        if state.queued.load(Ordering::Acquire) < state.high_water
            && state.full.swap(false, Ordering::AcqRel)
        {
            return Ok(true);
        }
        Ok(false)
    }

    fn end(self, tail: &[u8]) -> Result<Self::Pending, SinkError> {
        if !tail.is_empty() {
            self.send(tail)?;
        }
        // Dropping the sender lets the writer task finish.
        drop(self.tx);
        Ok(self.task)
    }
}

async fn write_file(
    path: Utf8PathBuf,
    file: tokio::fs::File,
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    state: Arc<QueueState>,
) -> Result<(), SinkError> {
    let mut writer = BufWriter::new(file);
    let mut result = Ok(());
    while let Some(bytes) = rx.recv().await {
        result = writer.write_all(&bytes).await;
        if result.is_err() {
            break;
        }
        state.release(bytes.len());
    }
    if result.is_ok() {
        result = writer.flush().await;
    }
    result.map_err(|source| {
        // Wake a caller waiting for a drain so that its next write sees
        // the closed channel.
        rx.close();
        state.drained.notify_one();
        SinkError::Write { path, source }
    })
}
