// Copyright 2026 Oxide Computer Company

//! Extraction of a repository's complete history into JSON documents.
//!
//! The history of a repository is read from two git commands:
//!
//! * `git for-each-ref`, formatted with [`refs_format`], lists every ref.
//! * `git rev-list --all --reflog`, formatted with [`commits_format`], lists
//!   every reachable commit.
//!
//! Both outputs are streams of records separated by [`SEPARATOR`]. A
//! [`Pipeline`] consumes them chunk by chunk, parses each record, reconciles
//! the ALL-CAPS decorations git prints (`HEAD`, `ORIG_HEAD`, ...) into a
//! `REFS` mapping and hands commits to a [`ShardWriter`]. The writer emits a
//! single JSON object:
//!
//! ```text
//! {"commits":[...],"heads":{...},"tags":{...},"remotes":{...},
//!  "stash":{...},"REFS":{...}}
//! ```
//!
//! splitting it across `history.json`, `history-1.json`, ... once a file
//! grows past the limits in [`ShardLimits`]. [`load_history`] puts such a set
//! of files back together and [`check_history`] verifies the result.
//!
//! This crate does no I/O of its own apart from [`load_history`]: the
//! process and file handling live in `git-history-vcs`, which implements
//! [`SinkFactory`] on top of tokio.
//!
//! # Examples
//!
//! ```
//! use git_history::{RecordSplitter, SEPARATOR};
//!
//! let mut stream = b"first".to_vec();
//! stream.extend_from_slice(SEPARATOR);
//! stream.extend_from_slice(b"second");
//! stream.extend_from_slice(SEPARATOR);
//! stream.push(b'\n');
//!
//! // Records may be split anywhere across chunks.
//! let mut splitter = RecordSplitter::new();
//! let (head, tail) = stream.split_at(8);
//! let mut records = splitter.split(head, false);
//! records.extend(splitter.split(tail, true));
//! let records: Vec<_> =
//!     records.iter().map(|r| r.trim()).filter(|r| !r.is_empty()).collect();
//! assert_eq!(records, ["first", "second"]);
//! ```

#![deny(missing_docs)]

mod check;
mod commits;
mod errors;
mod hash;
mod history;
mod identity;
mod pipeline;
mod records;
mod refs;
mod shard;
mod symbolic;
#[cfg(test)]
mod testutil;

pub use check::{
    CheckFailure, CheckReport, HistoryStats, check_history, load_history,
};
pub use commits::{
    Commit, CommitRecord, Decoration, Reflog, Signature, SignatureStatus,
    is_symbolic_name,
};
pub use errors::{
    CheckError, CommitHashParseError, DecorationError, Issue, PipelineError,
    RecordError, SinkError,
};
pub use hash::ObjectId;
pub use history::History;
pub use identity::{Identity, Person};
pub use pipeline::{Finished, Pipeline, PipelineState, StreamKind};
pub use records::{RecordSplitter, SEPARATOR, commits_format, refs_format};
pub use refs::{ObjectKind, Ref, RefPath, RefRecord, Refs};
pub use shard::{
    PendingWrite, ShardLimits, ShardWriter, Sink, SinkFactory,
    output_file_name,
};
pub use symbolic::SymbolicRefs;
