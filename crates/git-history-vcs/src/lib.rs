// Copyright 2026 Oxide Computer Company

//! Runs git over a repository and writes its full history as JSON.
//!
//! [`extract`] spawns `git for-each-ref` and `git rev-list --all --reflog`,
//! feeds both outputs to a [`git_history::Pipeline`] as they arrive, and
//! writes the result through [`FileFactory`] sinks, whose writer tasks push
//! back when the disk falls behind.
//!
//! # Examples
//!
//! ```no_run
//! use git_history_vcs::{HistoryConfig, extract};
//!
//! # async fn run() -> Result<(), git_history_vcs::ExtractError> {
//! let config = HistoryConfig {
//!     repo_path: "path/to/repo".into(),
//!     return_history: true,
//!     no_output: true,
//!     ..HistoryConfig::default()
//! };
//! let history = extract(&config).await?.expect("return mode");
//! println!("{} commits", history.commits.len());
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

mod errors;
mod extract;
mod git;
mod sink;

pub use errors::{ExtractError, GitEnvError};
pub use extract::{HistoryConfig, extract, extract_with};
pub use git::Git;
pub use sink::{DEFAULT_HIGH_WATER, FileFactory, FileSink};
