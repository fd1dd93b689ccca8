// Copyright 2026 Oxide Computer Company

//! Error types for running git and writing history files.

use camino::Utf8PathBuf;
use git_history::{PipelineError, SinkError};
use std::{ffi::OsString, io};
use thiserror::Error;

/// An error from reading the git binary path from the environment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GitEnvError {
    /// The environment variable is set but is not valid UTF-8.
    #[error(
        "${var} environment variable is not valid \
         UTF-8: {value:?}"
    )]
    NonUtf8 {
        /// The environment variable name.
        var: &'static str,
        /// The non-UTF-8 value.
        value: OsString,
    },
}

/// A fatal error that stops an extraction.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractError {
    /// The git binary path could not be determined.
    #[error(transparent)]
    Env(#[from] GitEnvError),

    /// Failed to spawn a git process.
    #[error("failed to run git {command} at {binary:?} in {repo}")]
    Spawn {
        /// The git subcommand.
        command: &'static str,
        /// The path to the git executable.
        binary: String,
        /// The repository that was passed to `git -C`.
        repo: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Reading the output of a git process failed.
    #[error("failed to read the output of git {command}")]
    Read {
        /// The git subcommand.
        command: &'static str,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A git process exited unsuccessfully.
    #[error("git {command} failed ({exit_status}): {stderr}")]
    GitFailed {
        /// The git subcommand.
        command: &'static str,
        /// A human-readable description of the exit status (e.g.,
        /// "exit status: 128").
        exit_status: String,
        /// The stderr output from git.
        stderr: String,
    },

    /// The pipeline failed, usually because an output file could not be
    /// written.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// An output file could not be created or completed.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// A background task panicked or was cancelled.
    #[error("background task failed")]
    Join(#[from] tokio::task::JoinError),
}
