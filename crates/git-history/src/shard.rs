// Copyright 2026 Oxide Computer Company

//! Size-bounded JSON output spread across several files.
//!
//! Commits are streamed into `{"commits":[` documents. When a file grows
//! past [`ShardLimits::ceiling`] it is closed with `]}` and the next file is
//! opened. At the end, the refs are appended to the last file; tags that
//! would push it too far over the ceiling go to satellite `{"tags":{...}}`
//! files instead.

use crate::{Commit, Ref, Refs, SinkError};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::collections::BTreeMap;

/// A destination for the bytes of one output file.
pub trait Sink {
    /// What the caller must wait on to know the file is complete.
    type Pending;

    /// Appends `bytes`.
    ///
    /// Returns `false` if the sink would like the caller to wait for a drain
    /// notification before writing more. The bytes are accepted either way.
    fn write(&mut self, bytes: &[u8]) -> Result<bool, SinkError>;

    /// Appends `tail` and closes the sink.
    fn end(self, tail: &[u8]) -> Result<Self::Pending, SinkError>;
}

/// Creates the sinks for successive output files.
pub trait SinkFactory {
    /// The sink type produced.
    type Sink: Sink;

    /// Creates (truncating) the file at `path`.
    fn create(&mut self, path: &Utf8Path) -> Result<Self::Sink, SinkError>;
}

/// The pending-write type of a factory's sinks.
pub type PendingWrite<F> = <<F as SinkFactory>::Sink as Sink>::Pending;

/// Size thresholds for output files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShardLimits {
    /// Commit bytes after which the next batch goes to a new file.
    pub ceiling: usize,
    /// The assumed serialized size of one tag entry.
    pub per_ref: usize,
    /// How far past the ceiling the last file may grow with refs.
    pub tolerance: usize,
}

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;

impl Default for ShardLimits {
    fn default() -> Self {
        ShardLimits { ceiling: 160 * MIB, per_ref: KIB, tolerance: 8 * MIB }
    }
}

impl ShardLimits {
    /// Returns how many tags fit in a file that already holds `written`
    /// bytes of commits.
    pub fn primary_tags(&self, written: usize) -> usize {
        let room = (self.tolerance + self.ceiling).saturating_sub(written);
        let per_ref = self.per_ref.max(1);
        (room + per_ref / 2) / per_ref
    }

    /// Returns the maximum number of tags in one satellite file.
    pub fn tags_per_file(&self) -> usize {
        (self.ceiling / self.per_ref.max(1)).max(1)
    }
}

/// Returns the path of output file number `index`.
///
/// File 0 is `base` itself; file `n` inserts `-n` before the extension
/// (the text after the last dot of the file name).
///
/// ```
/// use camino::Utf8Path;
/// use git_history::output_file_name;
///
/// let base = Utf8Path::new("out/history.json");
/// assert_eq!(output_file_name(base, 0), "out/history.json");
/// assert_eq!(output_file_name(base, 2), "out/history-2.json");
/// ```
pub fn output_file_name(base: &Utf8Path, index: usize) -> Utf8PathBuf {
    if index == 0 {
        return base.to_owned();
    }
    let stem = base.file_stem().unwrap_or_default();
    let name = match base.extension() {
        Some(extension) => format!("{stem}-{index}.{extension}"),
        None => format!("{stem}-{index}"),
    };
    base.with_file_name(name)
}

const OPENING: &[u8] = b"{\"commits\":[";
const CLOSING: &[u8] = b"]}";

/// The refs part of the last output file, borrowing from the pipeline.
#[derive(Serialize)]
struct RefsTail<'a> {
    heads: &'a BTreeMap<String, Ref>,
    tags: BTreeMap<&'a String, &'a Ref>,
    remotes: &'a BTreeMap<String, BTreeMap<String, Ref>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stash: Option<&'a Ref>,
    #[serde(rename = "REFS")]
    symbolic: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
struct TagShard<'a> {
    tags: BTreeMap<&'a String, &'a Ref>,
}

/// Streams commits into a sequence of output files.
///
/// Commits are batched with [`ShardWriter::enqueue`] and written by
/// [`ShardWriter::flush`]. When a sink asks for back-pressure, flushes are
/// deferred until [`ShardWriter::drained`] is called.
pub struct ShardWriter<F: SinkFactory> {
    factory: F,
    base: Utf8PathBuf,
    limits: ShardLimits,
    files: usize,
    current: Option<(Utf8PathBuf, F::Sink)>,
    written: usize,
    can_write: bool,
    batch: Vec<Commit>,
    pending: Vec<PendingWrite<F>>,
}

impl<F: SinkFactory> ShardWriter<F> {
    /// Creates the first output file and writes the opening of the commit
    /// array.
    pub fn open(
        factory: F,
        base: &Utf8Path,
        limits: ShardLimits,
    ) -> Result<Self, SinkError> {
        let mut writer = ShardWriter {
            factory,
            base: base.to_owned(),
            limits,
            files: 0,
            current: None,
            written: 0,
            can_write: true,
            batch: Vec::new(),
            pending: Vec::new(),
        };
        writer.open_next()?;
        Ok(writer)
    }

    /// Adds a commit to the batch.
    pub fn enqueue(&mut self, commit: Commit) {
        self.batch.push(commit);
    }

    /// Returns true if the current sink accepts writes.
    pub fn can_write(&self) -> bool {
        self.can_write
    }

    /// Returns the number of commits waiting to be written.
    pub fn batched(&self) -> usize {
        self.batch.len()
    }

    /// Records that the current sink drained.
    pub fn drained(&mut self) {
        self.can_write = true;
    }

    /// Writes the batch if the sink accepts writes, returning the commits
    /// written (in order). Returns an empty list while waiting for a drain.
    pub fn flush(&mut self) -> Result<Vec<Commit>, SinkError> {
        if !self.can_write || self.batch.is_empty() {
            return Ok(Vec::new());
        }
        self.write_batch()
    }

    /// Ends the open sink best-effort. Nothing is written afterwards.
    pub fn abort(&mut self) {
        if let Some((path, sink)) = self.current.take() {
            if let Err(error) = sink.end(&[]) {
                tracing::debug!(%path, %error, "failed to close output file");
            }
        }
        self.batch.clear();
    }

    /// Writes the remaining batch regardless of back-pressure, then the
    /// satellite tag files and the refs closing.
    ///
    /// Returns the commits written by this call and every pending write,
    /// including those of files closed by earlier rotations.
    pub fn finish(
        mut self,
        refs: &Refs,
        symbolic: &BTreeMap<String, String>,
    ) -> Result<(Vec<Commit>, Vec<PendingWrite<F>>), SinkError> {
        match self.finish_files(refs, symbolic) {
            Ok(written) => Ok((written, self.pending)),
            Err(error) => {
                self.abort();
                Err(error)
            }
        }
    }

    fn finish_files(
        &mut self,
        refs: &Refs,
        symbolic: &BTreeMap<String, String>,
    ) -> Result<Vec<Commit>, SinkError> {
        let written = if self.batch.is_empty() {
            Vec::new()
        } else {
            self.write_batch()?
        };

        let keep = self.limits.primary_tags(self.written);
        let overflow: Vec<(&String, &Ref)> =
            refs.tags.iter().skip(keep).collect();
        for chunk in overflow.chunks(self.limits.tags_per_file()) {
            let shard = TagShard { tags: chunk.iter().copied().collect() };
            let path = output_file_name(&self.base, self.files);
            self.files += 1;
            tracing::debug!(%path, tags = chunk.len(), "writing tag shard");
            let sink = self.factory.create(&path)?;
            self.pending.push(sink.end(&serde_json::to_vec(&shard)?)?);
        }

        let tail = RefsTail {
            heads: &refs.heads,
            tags: refs.tags.iter().take(keep).collect(),
            remotes: &refs.remotes,
            stash: refs.stash.as_ref(),
            symbolic,
        };
        let object = serde_json::to_vec(&tail)?;
        let mut bytes = Vec::with_capacity(object.len() + 1);
        bytes.extend_from_slice(b"],");
        // Continue the top-level object opened with the commit array.
        bytes.extend_from_slice(&object[1..]);

        let (path, sink) = self.take_current()?;
        tracing::debug!(%path, "writing refs");
        self.pending.push(sink.end(&bytes)?);
        Ok(written)
    }

    fn write_batch(&mut self) -> Result<Vec<Commit>, SinkError> {
        let mut data = Vec::new();
        for (index, commit) in self.batch.iter().enumerate() {
            if index > 0 {
                data.push(b',');
            }
            serde_json::to_writer(&mut data, commit)?;
        }

        if self.written > 0 && self.written + data.len() > self.limits.ceiling
        {
            self.rotate()?;
        }

        let mut bytes = Vec::with_capacity(data.len() + 1);
        if self.written > 0 {
            bytes.push(b',');
        }
        bytes.extend_from_slice(&data);
        self.written += data.len();

        let (path, sink) = self.current_mut()?;
        tracing::trace!(%path, bytes = bytes.len(), "writing commits");
        let accepted = sink.write(&bytes)?;
        self.can_write = accepted;
        Ok(std::mem::take(&mut self.batch))
    }

    fn rotate(&mut self) -> Result<(), SinkError> {
        let (path, sink) = self.take_current()?;
        tracing::debug!(%path, bytes = self.written, "closing full file");
        self.pending.push(sink.end(CLOSING)?);
        self.open_next()
    }

    fn open_next(&mut self) -> Result<(), SinkError> {
        let path = output_file_name(&self.base, self.files);
        self.files += 1;
        tracing::debug!(%path, "opening output file");
        let mut sink = self.factory.create(&path)?;
        self.can_write = sink.write(OPENING)?;
        self.written = 0;
        self.current = Some((path, sink));
        Ok(())
    }

    fn current_mut(&mut self) -> Result<(&Utf8Path, &mut F::Sink), SinkError> {
        match &mut self.current {
            Some((path, sink)) => Ok((path.as_path(), sink)),
            None => Err(SinkError::Closed { path: self.base.clone() }),
        }
    }

    fn take_current(&mut self) -> Result<(Utf8PathBuf, F::Sink), SinkError> {
        self.current
            .take()
            .ok_or_else(|| SinkError::Closed { path: self.base.clone() })
    }
}
