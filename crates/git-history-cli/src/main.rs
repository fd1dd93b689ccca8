// Copyright 2026 Oxide Computer Company

//! `full-git-history`: writes the complete history of a repository as JSON.

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use git_history_vcs::{HistoryConfig, extract};
use std::{ffi::OsString, io::Write};

const USAGE: &str = "\
usage: full-git-history [<path>] [-o <path>] [-no] [-r]
       full-git-history path/to/foo -o path/to/foo-history.json";

#[derive(Parser, Debug)]
#[command(name = "full-git-history", disable_help_flag = true)]
struct Args {
    /// Repository to read.
    #[arg(default_value = ".")]
    path: Utf8PathBuf,
    /// First output file.
    #[arg(short = 'o', default_value = "history.json")]
    output: Utf8PathBuf,
    /// Write no output files.
    #[arg(long = "no-output")]
    no_output: bool,
    /// Print the history as JSON on stdout.
    #[arg(short = 'r')]
    print: bool,
}

/// `-no` is a single flag, not `-n -o`.
fn normalize_args(
    args: impl IntoIterator<Item = OsString>,
) -> impl Iterator<Item = OsString> {
    args.into_iter().map(|arg| {
        if arg == "-no" { OsString::from("--no-output") } else { arg }
    })
}

impl Args {
    fn config(&self) -> HistoryConfig {
        HistoryConfig {
            repo_path: self.path.clone(),
            output_path: self.output.clone(),
            no_output: self.no_output,
            return_history: self.print,
            ..HistoryConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = match Args::try_parse_from(normalize_args(std::env::args_os()))
    {
        Ok(args) => args,
        Err(_) => {
            println!("{USAGE}");
            return Ok(());
        }
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let history = extract(&args.config())
        .await
        .with_context(|| format!("failed to read history of {}", args.path))?;

    if let Some(history) = history {
        let mut stdout = std::io::stdout().lock();
        serde_json::to_writer(&mut stdout, &history)?;
        writeln!(stdout)?;
    }
    Ok(())
}
