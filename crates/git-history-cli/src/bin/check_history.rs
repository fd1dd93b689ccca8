// Copyright 2026 Oxide Computer Company

//! `check-history`: verifies a history written by `full-git-history`.

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use git_history::{check_history, load_history};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "check-history", about = "Check a full-git-history output")]
struct Args {
    /// The first history file; `-1`, `-2`, ... files next to it are read
    /// too.
    file: Utf8PathBuf,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let history = load_history(&args.file)
        .with_context(|| format!("failed to load {}", args.file))?;
    let report = check_history(&history);
    report.summary();

    Ok(if report.is_ok() { ExitCode::SUCCESS } else { ExitCode::from(1) })
}
