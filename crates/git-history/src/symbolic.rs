// Copyright 2026 Oxide Computer Company

//! Reconciliation of ALL-CAPS decoration names into the `REFS` mapping.

use crate::{Issue, ObjectId, Ref};
use std::collections::BTreeMap;

/// The two symbolic-ref tables built while commits are parsed.
///
/// * Direct mappings come from `NAME -> branch` decorations.
/// * Candidates come from bare ALL-CAPS decorations: each one ties a name to
///   a commit that name decorated.
///
/// Both tables keep insertion order, so [`SymbolicRefs::reconcile`] is
/// deterministic for a given commit stream.
#[derive(Clone, Debug, Default)]
pub struct SymbolicRefs {
    direct: Vec<(String, String)>,
    candidates: Vec<(String, Vec<ObjectId>)>,
}

impl SymbolicRefs {
    /// Creates empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `name` decorated `commit`.
    ///
    /// Returns [`Issue::DuplicateCandidate`] if that pair was already seen.
    pub fn register_candidate(
        &mut self,
        name: &str,
        commit: ObjectId,
    ) -> Result<(), Issue> {
        let commits = match self.candidates.iter_mut().find(|(n, _)| n == name)
        {
            Some((_, commits)) => commits,
            None => {
                self.candidates.push((name.to_owned(), Vec::new()));
                let last = self.candidates.len() - 1;
                &mut self.candidates[last].1
            }
        };
        if commits.contains(&commit) {
            return Err(Issue::DuplicateCandidate {
                name: name.to_owned(),
                commit,
            });
        }
        commits.push(commit);
        Ok(())
    }

    /// Records a `name -> target` decoration.
    ///
    /// Returns [`Issue::DuplicateSymbolicRef`] if `name` already has a
    /// direct mapping; the first one is kept.
    pub fn register_direct(
        &mut self,
        name: &str,
        target: &str,
    ) -> Result<(), Issue> {
        if self.direct.iter().any(|(n, _)| n == name) {
            return Err(Issue::DuplicateSymbolicRef {
                name: name.to_owned(),
                target: target.to_owned(),
            });
        }
        self.direct.push((name.to_owned(), target.to_owned()));
        Ok(())
    }

    /// Returns true if nothing was registered.
    pub fn is_empty(&self) -> bool {
        self.direct.is_empty() && self.candidates.is_empty()
    }

    /// Resolves every candidate name against the local branches and the
    /// direct mappings, returning the final mapping and every issue found.
    ///
    /// For each candidate name, in first-seen order:
    ///
    /// 1. A local branch of the same name claims its own commit. If that
    ///    commit never carried the name, [`Issue::MissingBranchCommit`] is
    ///    reported.
    /// 2. The first unclaimed candidate becomes the resolution.
    /// 3. A direct mapping conflicts with that resolution
    ///    ([`Issue::AmbiguousSymbolicRef`], not finalized), or becomes the
    ///    resolution if there was none.
    /// 4. Any candidate still unclaimed is reported as
    ///    [`Issue::ExcessCandidate`] and the name is not finalized.
    /// 5. A resolution that coexists with a same-named branch is finalized
    ///    with a [`Issue::BranchShadowsSymbolicRef`] warning.
    ///
    /// The mapping starts out as the direct mappings; only a finalized
    /// resolution replaces an entry, so a name that is not finalized keeps
    /// its direct target, if any.
    pub fn reconcile(
        self,
        heads: &BTreeMap<String, Ref>,
    ) -> (BTreeMap<String, String>, Vec<Issue>) {
        let mut issues = Vec::new();
        let mut mapping: BTreeMap<String, String> =
            self.direct.into_iter().collect();

        'names: for (name, commits) in self.candidates {
            let mut used = vec![false; commits.len()];

            let branch = heads.get(&name);
            if let Some(branch) = branch {
                match commits.iter().position(|c| *c == branch.id) {
                    Some(index) => used[index] = true,
                    None => issues.push(Issue::MissingBranchCommit {
                        name: name.clone(),
                        commit: branch.id,
                    }),
                }
            }

            let unused = used.iter().position(|u| !u);
            let picked = unused.map(|index| {
                used[index] = true;
                commits[index]
            });

            let resolution = match (picked, mapping.get(&name).cloned()) {
                (Some(candidate), Some(target)) => {
                    issues.push(Issue::AmbiguousSymbolicRef {
                        name,
                        direct: target,
                        candidate,
                    });
                    continue 'names;
                }
                (Some(candidate), None) => Some(candidate.to_string()),
                (None, target) => target,
            };

            for (commit, used) in commits.iter().zip(&used) {
                if !used {
                    issues.push(Issue::ExcessCandidate {
                        name,
                        commit: *commit,
                    });
                    continue 'names;
                }
            }

            if let Some(resolution) = resolution {
                if branch.is_some() {
                    issues.push(Issue::BranchShadowsSymbolicRef {
                        name: name.clone(),
                    });
                }
                mapping.insert(name, resolution);
            }
        }

        for issue in &issues {
            issue.log();
        }
        (mapping, issues)
    }
}
