// Copyright 2026 Oxide Computer Company

//! Running the two git producers and driving the pipeline over their
//! output.

use crate::{ExtractError, FileFactory, Git};
use camino::Utf8PathBuf;
use git_history::{
    History, Pipeline, ShardLimits, ShardWriter, StreamKind, commits_format,
    refs_format,
};
use std::{io, process::Stdio};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, BufReader},
    process::{Child, ChildStderr, ChildStdout},
    sync::Notify,
    task::JoinHandle,
};

const CHUNK_SIZE: usize = 64 * 1024;

/// What to extract and where to put it.
#[derive(Clone, Debug)]
pub struct HistoryConfig {
    /// The repository to read, passed to `git -C`.
    pub repo_path: Utf8PathBuf,
    /// The first output file. Further files insert `-N` before the
    /// extension.
    pub output_path: Utf8PathBuf,
    /// Write no files at all.
    pub no_output: bool,
    /// Keep the whole history in memory and return it.
    pub return_history: bool,
    /// Output file size limits.
    pub limits: ShardLimits,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            repo_path: Utf8PathBuf::from("."),
            output_path: Utf8PathBuf::from("history.json"),
            no_output: false,
            return_history: false,
            limits: ShardLimits::default(),
        }
    }
}

/// Extracts the full history of `config.repo_path`.
///
/// Returns the history when `config.return_history` is set, and `None`
/// otherwise. Every output file is complete when this returns `Ok`.
///
/// The git binary is taken from `$GIT`, falling back to `git`.
pub async fn extract(
    config: &HistoryConfig,
) -> Result<Option<History>, ExtractError> {
    let git = Git::from_env()?;
    extract_with(&git, config).await
}

/// Like [`extract`], with an explicit git binary.
pub async fn extract_with(
    git: &Git,
    config: &HistoryConfig,
) -> Result<Option<History>, ExtractError> {
    let factory = FileFactory::new();
    let drained = factory.drained();
    let writer = if config.no_output {
        None
    } else {
        Some(ShardWriter::open(factory, &config.output_path, config.limits)?)
    };
    let mut pipeline = Pipeline::new(writer, config.return_history);

    tracing::info!(repo = %config.repo_path, "reading history");
    let mut refs = Producer::spawn(git, config, StreamKind::Refs)?;
    let mut commits = Producer::spawn(git, config, StreamKind::Commits)?;

    // Both children are killed when dropped, so returning early is enough
    // to stop them.
    if let Err(error) =
        drive(&mut pipeline, &mut refs, &mut commits, &drained).await
    {
        pipeline.abort();
        return Err(error);
    }

    let finished = pipeline.finish()?;
    let files = finished.pending.len();
    for pending in finished.pending {
        pending.await??;
    }
    if !config.no_output {
        tracing::info!(
            output = %config.output_path,
            files,
            issues = finished.issues.len(),
            "history written",
        );
    }
    Ok(finished.history)
}

async fn drive(
    pipeline: &mut Pipeline<FileFactory>,
    refs: &mut Producer,
    commits: &mut Producer,
    drained: &Notify,
) -> Result<(), ExtractError> {
    let mut refs_buf = vec![0; CHUNK_SIZE];
    let mut commits_buf = vec![0; CHUNK_SIZE];

    while refs.is_open() || commits.is_open() {
        tokio::select! {
            read = refs.read(&mut refs_buf), if refs.is_open() => {
                refs.handle(read, &refs_buf, pipeline).await?;
            }
            read = commits.read(&mut commits_buf),
                if commits.is_open() && pipeline.can_write() =>
            {
                commits.handle(read, &commits_buf, pipeline).await?;
            }
            () = drained.notified(), if !pipeline.can_write() => {
                pipeline.on_drained()?;
            }
        }
    }
    Ok(())
}

/// One git subprocess whose stdout feeds a pipeline stream.
struct Producer {
    stream: StreamKind,
    child: Child,
    stdout: Option<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
}

impl Producer {
    fn spawn(
        git: &Git,
        config: &HistoryConfig,
        stream: StreamKind,
    ) -> Result<Self, ExtractError> {
        let mut command = git.command(&config.repo_path);
        match stream {
            StreamKind::Refs => {
                command.arg("for-each-ref").arg(refs_format());
            }
            StreamKind::Commits => {
                command
                    .args([
                        "rev-list",
                        "--full-history",
                        "--reflog",
                        "--all",
                        "--use-bitmap-index",
                        "--sparse",
                    ])
                    .arg(commits_format());
            }
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let command_name = subcommand(stream);
        let mut child =
            command.spawn().map_err(|source| ExtractError::Spawn {
                command: command_name,
                binary: git.binary().to_owned(),
                repo: config.repo_path.clone(),
                source,
            })?;
        let stdout = child.stdout.take();
        let stderr = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(relay_stderr(command_name, stderr)));
        Ok(Producer { stream, child, stdout, stderr })
    }

    fn is_open(&self) -> bool {
        self.stdout.is_some()
    }

    /// Reads the next chunk. Cancel safe.
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.stdout {
            Some(stdout) => stdout.read(buf).await,
            None => std::future::pending().await,
        }
    }

    async fn handle(
        &mut self,
        read: io::Result<usize>,
        buf: &[u8],
        pipeline: &mut Pipeline<FileFactory>,
    ) -> Result<(), ExtractError> {
        match read {
            Ok(0) => {
                self.stdout = None;
                self.wait().await?;
                pipeline.on_stream_end(self.stream)?;
            }
            Ok(len) => pipeline.on_chunk(self.stream, &buf[..len])?,
            Err(source) => {
                return Err(ExtractError::Read {
                    command: subcommand(self.stream),
                    source,
                });
            }
        }
        Ok(())
    }

    async fn wait(&mut self) -> Result<(), ExtractError> {
        let command = subcommand(self.stream);
        let status = self
            .child
            .wait()
            .await
            .map_err(|source| ExtractError::Read { command, source })?;
        let stderr = match self.stderr.take() {
            Some(relay) => relay.await?,
            None => String::new(),
        };
        if status.success() {
            tracing::debug!(command, "git exited");
            Ok(())
        } else {
            Err(ExtractError::GitFailed {
                command,
                exit_status: status.to_string(),
                stderr,
            })
        }
    }
}

fn subcommand(stream: StreamKind) -> &'static str {
    match stream {
        StreamKind::Refs => "for-each-ref",
        StreamKind::Commits => "rev-list",
    }
}

/// Logs every stderr line of a git process and returns them all.
async fn relay_stderr(command: &'static str, stderr: ChildStderr) -> String {
    let mut lines = BufReader::new(stderr).lines();
    let mut collected = Vec::new();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                tracing::warn!(command, "git: {line}");
                collected.push(line);
            }
            Ok(None) => break,
            Err(error) => {
                tracing::debug!(command, %error, "failed to read git stderr");
                break;
            }
        }
    }
    collected.join("\n")
}
