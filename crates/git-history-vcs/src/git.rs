// Copyright 2026 Oxide Computer Company

//! Selection of the git binary.

use crate::GitEnvError;
use camino::Utf8Path;
use tokio::process::Command;

/// Reads the git binary path from `var`, falling back to `default` if the
/// variable is unset or empty.
///
/// The value is trimmed of leading and trailing whitespace.
fn read_git_env(
    var: &'static str,
    default: &str,
) -> Result<String, GitEnvError> {
    match std::env::var(var) {
        Ok(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(default.to_string())
            } else {
                Ok(trimmed.to_string())
            }
        }
        Err(std::env::VarError::NotPresent) => Ok(default.to_string()),
        Err(std::env::VarError::NotUnicode(value)) => {
            Err(GitEnvError::NonUtf8 { var, value })
        }
    }
}

/// The git executable used to read a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Git {
    binary: String,
}

impl Git {
    /// Uses the `$GIT` environment variable, or `"git"`.
    ///
    /// Returns an error if `$GIT` is set but is not valid UTF-8.
    pub fn from_env() -> Result<Self, GitEnvError> {
        let binary = read_git_env("GIT", "git")?;
        Ok(Git { binary })
    }

    /// Uses the executable at `binary`.
    pub fn new(binary: impl Into<String>) -> Self {
        Git { binary: binary.into() }
    }

    /// Returns the path to the git binary.
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Returns a `git -C <repo>` command.
    pub(crate) fn command(&self, repo: &Utf8Path) -> Command {
        let mut command = Command::new(&self.binary);
        command.arg("-C").arg(repo.as_str());
        command
    }
}
