// Copyright 2026 Oxide Computer Company

//! The state machine that turns two git output streams into a history.

use crate::{
    Commit, CommitRecord, Decoration, History, Issue, ObjectId, PendingWrite,
    PipelineError, RecordSplitter, RefRecord, Refs, ShardWriter, SinkFactory,
    SymbolicRefs, is_symbolic_name,
};
use std::{collections::HashSet, fmt};

/// One of the two producer streams.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// `git for-each-ref` output.
    Refs,
    /// `git rev-list` output.
    Commits,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Refs => f.write_str("refs"),
            StreamKind::Commits => f.write_str("commits"),
        }
    }
}

/// Where a [`Pipeline`] is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    /// Both streams are producing.
    Running,
    /// One stream has ended.
    OneStreamDone {
        /// The stream that ended.
        done: StreamKind,
    },
    /// Both streams have ended; [`Pipeline::finish`] may be called.
    BothStreamsDone,
    /// The final writes are in progress.
    Flushing,
    /// Finished or aborted. Further input is ignored.
    Closed,
}

/// The outcome of a successful run.
#[derive(Debug)]
pub struct Finished<P> {
    /// The full history, in return mode.
    pub history: Option<History>,
    /// Writes the caller must wait on before the output files are complete.
    pub pending: Vec<P>,
    /// Every non-fatal issue found during the run.
    pub issues: Vec<Issue>,
}

/// Consumes chunks from the refs and commits streams and produces the
/// output files.
///
/// The pipeline does no I/O of its own besides writing to the
/// [`ShardWriter`]'s sinks; the driver feeds it chunks, drain notifications
/// and end-of-stream events, in any interleaving of the two streams.
/// Records within one stream are handled in the order they arrive.
pub struct Pipeline<F: SinkFactory> {
    state: PipelineState,
    writer: Option<ShardWriter<F>>,
    return_history: bool,
    refs_splitter: RecordSplitter,
    commits_splitter: RecordSplitter,
    refs: Refs,
    symbolic: SymbolicRefs,
    commits: Vec<Commit>,
    seen: HashSet<ObjectId>,
    parsed: usize,
    issues: Vec<Issue>,
}

impl<F: SinkFactory> Pipeline<F> {
    /// Creates a pipeline writing through `writer`, or writing nothing if
    /// `writer` is `None`.
    ///
    /// With `return_history` set, every commit is also kept in memory and
    /// returned by [`Pipeline::finish`].
    pub fn new(writer: Option<ShardWriter<F>>, return_history: bool) -> Self {
        Pipeline {
            state: PipelineState::Running,
            writer,
            return_history,
            refs_splitter: RecordSplitter::new(),
            commits_splitter: RecordSplitter::new(),
            refs: Refs::default(),
            symbolic: SymbolicRefs::new(),
            commits: Vec::new(),
            seen: HashSet::new(),
            parsed: 0,
            issues: Vec::new(),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Returns the issues found so far.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Returns true if the output sink accepts writes (or there is none).
    pub fn can_write(&self) -> bool {
        self.writer.as_ref().is_none_or(|writer| writer.can_write())
    }

    /// Processes a chunk of `stream`'s output.
    ///
    /// Chunks arriving after the pipeline closed are ignored.
    pub fn on_chunk(
        &mut self,
        stream: StreamKind,
        chunk: &[u8],
    ) -> Result<(), PipelineError> {
        if self.state == PipelineState::Closed {
            return Ok(());
        }
        self.ensure_running(stream)?;
        self.process(stream, chunk, false);
        if stream == StreamKind::Commits {
            self.flush()?;
        }
        Ok(())
    }

    /// Retries writing after the output sink drained.
    pub fn on_drained(&mut self) -> Result<(), PipelineError> {
        if self.state == PipelineState::Closed {
            return Ok(());
        }
        if let Some(writer) = &mut self.writer {
            writer.drained();
        }
        self.flush()
    }

    /// Processes the last partial record of `stream` and marks it done.
    pub fn on_stream_end(
        &mut self,
        stream: StreamKind,
    ) -> Result<(), PipelineError> {
        if self.state == PipelineState::Closed {
            return Ok(());
        }
        self.ensure_running(stream)?;
        self.process(stream, &[], true);
        self.state = match self.state {
            PipelineState::Running => {
                PipelineState::OneStreamDone { done: stream }
            }
            _ => PipelineState::BothStreamsDone,
        };
        tracing::debug!(%stream, state = ?self.state, "stream ended");
        if stream == StreamKind::Commits {
            self.flush()?;
        }
        Ok(())
    }

    /// Closes the pipeline after a fatal error elsewhere.
    ///
    /// The open output file is ended best-effort and nothing more is
    /// written.
    pub fn abort(&mut self) {
        if self.state == PipelineState::Closed {
            return;
        }
        tracing::debug!(state = ?self.state, "aborting pipeline");
        self.state = PipelineState::Closed;
        if let Some(writer) = &mut self.writer {
            writer.abort();
        }
    }

    /// Reconciles symbolic refs and writes everything still buffered, the
    /// tag shards and the refs.
    ///
    /// Must be called once both streams have ended.
    pub fn finish(
        mut self,
    ) -> Result<Finished<PendingWrite<F>>, PipelineError> {
        if self.state != PipelineState::BothStreamsDone {
            return Err(PipelineError::NotFinished { state: self.state });
        }
        self.state = PipelineState::Flushing;

        let symbolic = std::mem::take(&mut self.symbolic);
        let (symbolic, issues) = symbolic.reconcile(&self.refs.heads);
        self.issues.extend(issues);

        let mut pending = Vec::new();
        if let Some(writer) = self.writer.take() {
            let (written, files) = writer
                .finish(&self.refs, &symbolic)
                .inspect_err(|_| self.state = PipelineState::Closed)?;
            if self.return_history {
                self.commits.extend(written);
            }
            pending = files;
        }
        self.state = PipelineState::Closed;

        tracing::info!(
            commits = self.parsed,
            refs = self.refs.branches().count() + self.refs.tags.len(),
            symbolic = symbolic.len(),
            issues = self.issues.len(),
            "history extracted",
        );

        let history = self.return_history.then(|| History {
            commits: self.commits,
            refs: self.refs,
            symbolic,
        });
        Ok(Finished { history, pending, issues: self.issues })
    }

    fn ensure_running(&self, stream: StreamKind) -> Result<(), PipelineError> {
        match self.state {
            PipelineState::Running => Ok(()),
            PipelineState::OneStreamDone { done } if done != stream => Ok(()),
            _ => Err(PipelineError::StreamAlreadyEnded(stream)),
        }
    }

    fn process(&mut self, stream: StreamKind, chunk: &[u8], is_final: bool) {
        let records = match stream {
            StreamKind::Refs => self.refs_splitter.split(chunk, is_final),
            StreamKind::Commits => self.commits_splitter.split(chunk, is_final),
        };
        for record in &records {
            let record = record.trim();
            if record.is_empty() {
                continue;
            }
            match stream {
                StreamKind::Refs => self.add_ref(record),
                StreamKind::Commits => self.add_commit(record),
            }
        }
    }

    fn add_ref(&mut self, record: &str) {
        match RefRecord::parse(record) {
            Ok(mut parsed) => {
                if let Some(error) = parsed.tag_error.take() {
                    self.report(Issue::TagFields {
                        path: parsed.full_name.clone(),
                        error,
                    });
                }
                if let Err(issue) = self.refs.insert(parsed) {
                    self.report(issue);
                }
            }
            Err(error) => self.report(Issue::MalformedRecord {
                stream: StreamKind::Refs,
                error,
                record: record.to_owned(),
            }),
        }
    }

    fn add_commit(&mut self, record: &str) {
        let CommitRecord { commit, decorations } =
            match CommitRecord::parse(record) {
                Ok(parsed) => parsed,
                Err(error) => {
                    self.report(Issue::MalformedRecord {
                        stream: StreamKind::Commits,
                        error,
                        record: record.to_owned(),
                    });
                    return;
                }
            };

        for decoration in decorations {
            let registered = match decoration {
                Ok(Decoration::Name(name)) if is_symbolic_name(&name) => {
                    self.symbolic.register_candidate(&name, commit.id)
                }
                Ok(Decoration::Symbolic { name, target }) => {
                    self.symbolic.register_direct(&name, &target)
                }
                Ok(_) => Ok(()),
                Err(error) => {
                    Err(Issue::Decoration { commit: commit.id, error })
                }
            };
            if let Err(issue) = registered {
                self.report(issue);
            }
        }

        self.parsed += 1;
        if !self.seen.insert(commit.id) {
            self.report(Issue::DuplicateCommit { id: commit.id });
        }
        match &mut self.writer {
            Some(writer) => writer.enqueue(commit),
            None if self.return_history => self.commits.push(commit),
            None => {}
        }
    }

    fn flush(&mut self) -> Result<(), PipelineError> {
        let Some(writer) = &mut self.writer else {
            return Ok(());
        };
        match writer.flush() {
            Ok(written) => {
                if self.return_history {
                    self.commits.extend(written);
                }
                Ok(())
            }
            Err(error) => {
                self.abort();
                Err(error.into())
            }
        }
    }

    fn report(&mut self, issue: Issue) {
        issue.log();
        self.issues.push(issue);
    }
}
