// Copyright 2026 Oxide Computer Company

//! Integration tests for git-history-vcs.

mod extract;
mod repo;
mod shard;
