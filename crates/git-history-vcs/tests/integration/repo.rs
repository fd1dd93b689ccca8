// Copyright 2026 Oxide Computer Company

//! Scratch repositories driven through a real git.

use anyhow::{Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use git_history::ObjectId;
use std::{fs, process::Command};

/// Returns a `Command` for git, respecting the `$GIT` environment variable.
pub fn git_command() -> Command {
    let bin = std::env::var("GIT").unwrap_or_else(|_| "git".to_string());
    let mut command = Command::new(bin);
    // Keep the user's configuration (signing, hooks, ...) out of the way.
    command
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_CONFIG_GLOBAL", "/dev/null");
    command
}

/// A git repository in a temporary directory, with a scratch output
/// directory next to it.
pub struct TestRepo {
    dir: Utf8TempDir,
    commits: u32,
}

impl TestRepo {
    /// Initializes a repository whose default branch is `main`.
    pub fn init() -> Result<Self> {
        let dir = Utf8TempDir::with_prefix("git-history-test-")?;
        fs::create_dir(dir.path().join("repo"))?;
        fs::create_dir(dir.path().join("out"))?;
        let repo = TestRepo { dir, commits: 0 };
        repo.git(&["init", "--quiet"])?;
        repo.git(&["symbolic-ref", "HEAD", "refs/heads/main"])?;
        repo.git(&["config", "user.email", "test@example.com"])?;
        repo.git(&["config", "user.name", "Test User"])?;
        repo.git(&["config", "commit.gpgsign", "false"])?;
        repo.git(&["config", "tag.gpgsign", "false"])?;
        Ok(repo)
    }

    /// Returns the repository root.
    pub fn path(&self) -> Utf8PathBuf {
        self.dir.path().join("repo")
    }

    /// Returns a path in the scratch output directory.
    pub fn output(&self, name: &str) -> Utf8PathBuf {
        self.dir.path().join("out").join(name)
    }

    /// Runs git in the repository and returns its trimmed stdout.
    pub fn git(&self, args: &[&str]) -> Result<String> {
        self.git_at(args, None)
    }

    fn git_at(&self, args: &[&str], date: Option<&str>) -> Result<String> {
        let mut command = git_command();
        command.args(args).current_dir(self.path());
        if let Some(date) = date {
            command
                .env("GIT_AUTHOR_DATE", date)
                .env("GIT_COMMITTER_DATE", date);
        }
        let output = command.output()?;
        if !output.status.success() {
            bail!(
                "git {} failed ({}): {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8(output.stdout)?.trim().to_string())
    }

    /// Commits a change to `file.txt`, one day after the previous commit,
    /// and returns the new commit's id.
    pub fn commit(&mut self, message: &str) -> Result<ObjectId> {
        self.commits += 1;
        let date = format!("2024-01-{:02}T12:00:00+01:00", self.commits);
        fs::write(self.path().join("file.txt"), message)?;
        self.git(&["add", "file.txt"])?;
        self.git_at(&["commit", "--quiet", "-m", message], Some(&date))?;
        self.rev_parse("HEAD")
    }

    /// Creates an annotated tag dated like the last commit.
    pub fn annotated_tag(
        &self,
        name: &str,
        target: &str,
        message: &str,
    ) -> Result<()> {
        let date = format!("2024-01-{:02}T18:00:00+01:00", self.commits);
        self.git_at(&["tag", "-a", name, "-m", message, target], Some(&date))?;
        Ok(())
    }

    /// Resolves a revision to a commit id.
    pub fn rev_parse(&self, rev: &str) -> Result<ObjectId> {
        Ok(self.git(&["rev-parse", rev])?.parse()?)
    }
}

/// Returns the output files of a run, in order.
pub fn output_files(base: &Utf8Path) -> Vec<Utf8PathBuf> {
    (0..)
        .map(|index| git_history::output_file_name(base, index))
        .take_while(|path| path.exists())
        .collect()
}
