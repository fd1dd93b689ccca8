// Copyright 2026 Oxide Computer Company

//! Error types for history parsing, writing and checking.

use crate::{ObjectId, PipelineState, StreamKind};
use camino::Utf8PathBuf;
use std::io;
use thiserror::Error;

/// An error that occurs while parsing an [`ObjectId`].
#[derive(Clone, Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum CommitHashParseError {
    /// The object id has an invalid length.
    #[error(
        "invalid length: expected 40 (SHA-1) or 64 (SHA-256) hex characters, \
         got {0}"
    )]
    InvalidLength(usize),

    /// The object id is not valid hexadecimal.
    #[error("invalid hexadecimal")]
    InvalidHex(hex::FromHexError),
}

/// The reason a single ref or commit record was rejected.
///
/// Rejected records are skipped; the run continues. Errors in the annotated
/// tag fields of a ref record are the exception: see [`Issue::TagFields`].
#[derive(Clone, Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum RecordError {
    /// The record has fewer lines than the format requires.
    #[error("expected at least {expected} fields, found {found}")]
    TooFewFields {
        /// The number of fields present.
        found: usize,
        /// The minimum number of fields.
        expected: usize,
    },

    /// The first line of a commit record is not `commit <id>`.
    #[error("missing `commit ` header in {line:?}")]
    MissingCommitHeader {
        /// The offending first line.
        line: String,
    },

    /// A field that must hold an object id does not.
    #[error("invalid {field} {value:?}")]
    InvalidObjectId {
        /// The name of the field.
        field: &'static str,
        /// The raw field contents.
        value: String,
        /// Details about the parsing error.
        #[source]
        error: CommitHashParseError,
    },

    /// The object kind is not one of commit, tag, tree or blob.
    #[error("unknown object kind {value:?}")]
    InvalidObjectKind {
        /// The raw field contents.
        value: String,
    },

    /// The object size is not an unsigned integer.
    #[error("invalid object size {value:?}")]
    InvalidSize {
        /// The raw field contents.
        value: String,
    },

    /// A date field is not strict ISO 8601 with an offset.
    #[error("invalid {field} {value:?}")]
    InvalidDate {
        /// The name of the field.
        field: &'static str,
        /// The raw field contents.
        value: String,
        /// Details about the parsing error.
        #[source]
        error: chrono::ParseError,
    },

    /// The ref path is outside `refs/heads/`, `refs/tags/`,
    /// `refs/remotes/` and `refs/stash`.
    #[error("unknown ref kind ({path})")]
    UnknownRefKind {
        /// The full ref path.
        path: String,
    },

    /// A remote-tracking ref path has no branch after the remote name.
    #[error("wrong remote ref name ({path})")]
    InvalidRemoteName {
        /// The full ref path.
        path: String,
    },

    /// An annotated tag record lacks the tagger fields.
    #[error("wrong tag format: expected at least 9 fields, found {found}")]
    WrongTagFormat {
        /// The number of fields present.
        found: usize,
    },
}

/// A malformed decoration token on a commit.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecorationError {
    /// Two words, but the first one is not `tag:`.
    #[error("wrong tag name format: '{0}'")]
    TagName(String),

    /// Three words, but the middle one is not `->`.
    #[error("wrong branch name format: '{0}'")]
    BranchName(String),

    /// Any other number of words.
    #[error("wrong ref name format: '{0}'")]
    RefName(String),
}

/// A non-fatal problem found during a run.
///
/// Issues are logged when found and returned to the caller; they reduce the
/// completeness of the output but never stop processing.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Issue {
    /// A record was rejected.
    #[error("wrong {stream} record ({error}):\n{record}")]
    MalformedRecord {
        /// The stream the record came from.
        stream: StreamKind,
        /// Why the record was rejected.
        #[source]
        error: RecordError,
        /// The raw record.
        record: String,
    },

    /// The annotated tag fields of a ref record could not be read. The tag
    /// is kept, possibly without its target or tagger.
    #[error("wrong tag {path} ({error})")]
    TagFields {
        /// The full ref path.
        path: String,
        /// What was wrong with the fields.
        #[source]
        error: RecordError,
    },

    /// A ref name already exists in its namespace. The first entry is kept.
    #[error("duplicate ref: {path}")]
    DuplicateRef {
        /// The full ref path of the dropped entry.
        path: String,
    },

    /// A commit id was emitted twice by the commits stream. Both copies are
    /// written.
    #[error("duplicate commit {id}")]
    DuplicateCommit {
        /// The repeated commit id.
        id: ObjectId,
    },

    /// A decoration token could not be classified.
    #[error("commit {commit}: {error}")]
    Decoration {
        /// The decorated commit.
        commit: ObjectId,
        /// The malformed token.
        #[source]
        error: DecorationError,
    },

    /// The same symbolic name decorated the same commit twice.
    #[error("duplicate commit {commit} for refname '{name}'")]
    DuplicateCandidate {
        /// The symbolic name.
        name: String,
        /// The commit.
        commit: ObjectId,
    },

    /// A second `NAME -> branch` decoration was seen for the same name. The
    /// first mapping is kept.
    #[error("duplicate symbolic ref '{name}' (-> {target})")]
    DuplicateSymbolicRef {
        /// The symbolic name.
        name: String,
        /// The dropped target.
        target: String,
    },

    /// A local branch shares a symbolic name but its commit was never
    /// decorated with that name.
    #[error("cannot find branch '{name}' in commit {commit}")]
    MissingBranchCommit {
        /// The branch (and symbolic) name.
        name: String,
        /// The commit the branch points at.
        commit: ObjectId,
    },

    /// A symbolic name has both a direct mapping and a decorated commit.
    /// The direct mapping is kept.
    #[error("refname '{name}' is ambiguous: {direct} or {candidate}")]
    AmbiguousSymbolicRef {
        /// The symbolic name.
        name: String,
        /// The direct mapping target.
        direct: String,
        /// The decorated commit.
        candidate: ObjectId,
    },

    /// More than one commit was decorated with a symbolic name. No commit is
    /// mapped for it.
    #[error("excess commit for refname '{name}': {commit}")]
    ExcessCandidate {
        /// The symbolic name.
        name: String,
        /// The unused commit.
        commit: ObjectId,
    },

    /// A symbolic name resolved to a commit while a local branch of the
    /// same name also exists. The name is still mapped.
    #[error("refname '{name}' is ambiguous with a local branch")]
    BranchShadowsSymbolicRef {
        /// The symbolic name.
        name: String,
    },
}

impl Issue {
    /// Returns true for issues that are informational only: nothing was
    /// dropped from the output.
    pub fn is_warning(&self) -> bool {
        matches!(self, Issue::BranchShadowsSymbolicRef { .. })
    }

    /// Logs the issue at the level matching its severity.
    pub(crate) fn log(&self) {
        match self {
            Issue::DuplicateCommit { .. } => tracing::error!("{self}"),
            _ if self.is_warning() => tracing::info!("warning: {self}"),
            _ => tracing::warn!("{self}"),
        }
    }
}

/// An error reported by an output sink.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SinkError {
    /// The output file could not be created.
    #[error("failed to create output file {path}")]
    Create {
        /// The output path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Writing to the output file failed.
    #[error("failed to write output file {path}")]
    Write {
        /// The output path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The sink stopped accepting data, for example because its writer
    /// failed earlier.
    #[error("output file {path} is closed")]
    Closed {
        /// The output path.
        path: Utf8PathBuf,
    },

    /// Serializing history data failed.
    #[error("failed to serialize history")]
    Serialize(#[from] serde_json::Error),
}

/// A fatal error from the pipeline state machine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// The output sink failed.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// The same stream signalled completion twice.
    #[error("{0} stream already ended")]
    StreamAlreadyEnded(StreamKind),

    /// `finish` was called before both streams ended, or after an error.
    #[error("cannot finish a pipeline in state {state:?}")]
    NotFinished {
        /// The state the pipeline was in.
        state: PipelineState,
    },
}

/// An error that prevents a history from being checked at all.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CheckError {
    /// The first history file does not exist.
    #[error("history file {path} not found")]
    NotFound {
        /// The missing path.
        path: Utf8PathBuf,
    },

    /// A history file could not be read.
    #[error("failed to read history file {path}")]
    Read {
        /// The path being read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A history file is empty.
    #[error("history file {path} is empty")]
    Empty {
        /// The empty file.
        path: Utf8PathBuf,
    },

    /// A history file is not a JSON object.
    #[error("history file {path} is not a JSON object")]
    Parse {
        /// The path being parsed.
        path: Utf8PathBuf,
        /// The underlying JSON error, if the file was not JSON at all.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The merged document does not have the shape of a history.
    #[error("history does not match the expected schema")]
    Schema(#[source] serde_json::Error),
}
