// Copyright 2026 Oxide Computer Company

use crate::{Commit, Refs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A complete repository history: the root of the emitted JSON document.
///
/// Serializes as
/// `{"commits":[...],"heads":{...},"tags":{...},"remotes":{...},"stash"?:...,"REFS":{...}}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    /// Every commit, in the order git emitted them (newest first).
    #[serde(default)]
    pub commits: Vec<Commit>,
    /// Branches, tags, remote-tracking branches and the stash.
    #[serde(flatten)]
    pub refs: Refs,
    /// Symbolic names (`HEAD`, `ORIG_HEAD`, ...) to a branch name or a
    /// commit id.
    #[serde(rename = "REFS", default)]
    pub symbolic: BTreeMap<String, String>,
}
