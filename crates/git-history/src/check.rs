// Copyright 2026 Oxide Computer Company

//! Loading and verifying history documents.
//!
//! [`load_history`] reassembles a history from every file of a sharded run;
//! [`check_history`] verifies its invariants and collects every violation
//! instead of stopping at the first.

use crate::{
    CheckError, Commit, History, ObjectId, ObjectKind, Ref, is_symbolic_name,
    output_file_name,
};
use camino::Utf8Path;
use serde_json::{Map, Value};
use std::{
    collections::{BTreeMap, HashMap},
    io,
};

/// Reads `path`, `path-1`, `path-2`, ... until a file is missing, and merges
/// them into one history.
///
/// Arrays under the same key are concatenated. Objects under the same key
/// are merged; a property present in both keeps its first value and a
/// warning is logged, as is a repeated non-object key.
pub fn load_history(path: &Utf8Path) -> Result<History, CheckError> {
    let mut merged = Map::new();
    for index in 0.. {
        let file = output_file_name(path, index);
        let text = match fs_err::read_to_string(&file) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                if index == 0 {
                    return Err(CheckError::NotFound { path: file });
                }
                break;
            }
            Err(source) => {
                return Err(CheckError::Read { path: file, source });
            }
        };
        if text.trim().is_empty() {
            return Err(CheckError::Empty { path: file });
        }
        let value: Value = serde_json::from_str(&text).map_err(|source| {
            CheckError::Parse { path: file.clone(), source: Some(source) }
        })?;
        let Value::Object(object) = value else {
            return Err(CheckError::Parse { path: file, source: None });
        };
        tracing::info!(%file, bytes = text.len(), "loaded history file");
        merge(&mut merged, object, &file);
    }
    serde_json::from_value(Value::Object(merged)).map_err(CheckError::Schema)
}

fn merge(
    target: &mut Map<String, Value>,
    source: Map<String, Value>,
    file: &Utf8Path,
) {
    for (key, value) in source {
        if !target.contains_key(&key) {
            target.insert(key, value);
            continue;
        }
        match (&mut target[&key], value) {
            (Value::Array(list), Value::Array(items)) => {
                list.extend(items);
            }
            (Value::Object(existing), Value::Object(properties)) => {
                for (property, value) in properties {
                    if existing.contains_key(&property) {
                        tracing::warn!(
                            "duplicate property {property} for key {key} \
                             in file {file}"
                        );
                    } else {
                        existing.insert(property, value);
                    }
                }
            }
            _ => {
                tracing::warn!("duplicate key {key} in file {file}");
            }
        }
    }
}

/// One violated invariant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckFailure {
    /// What was checked: `commit <id>`, `heads/main`, `REFS/HEAD`, ...
    pub item: String,
    /// What is wrong with it.
    pub message: String,
}

/// Counts gathered while checking, for the summary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoryStats {
    /// Number of commits.
    pub commits: usize,
    /// Signed commits by verification letter.
    pub signed: BTreeMap<char, usize>,
    /// Commits with reflog data.
    pub with_reflog: usize,
    /// Commits with a non-default encoding.
    pub with_encoding: usize,
    /// Local branches.
    pub local_branches: usize,
    /// Remote-tracking branches per remote.
    pub remote_branches: BTreeMap<String, usize>,
    /// Branches with an upstream.
    pub tracking_branches: usize,
    /// Branches with a push destination.
    pub push_branches: usize,
    /// The commit the `HEAD`-marked ref points at.
    pub head: Option<ObjectId>,
    /// Tags.
    pub tags: usize,
    /// Annotated tags.
    pub annotated_tags: usize,
}

/// The result of [`check_history`].
#[derive(Clone, Debug, Default)]
pub struct CheckReport {
    /// Every violation found.
    pub failures: Vec<CheckFailure>,
    /// Counts for the summary.
    pub stats: HistoryStats,
    /// The `REFS` mapping, for the summary.
    pub symbolic: BTreeMap<String, String>,
    /// The local branch `REFS.HEAD` names, if any.
    pub head_branch: Option<String>,
}

impl CheckReport {
    /// Returns true if no invariant was violated.
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// Logs every failure, then the counts.
    pub fn summary(&self) {
        for failure in &self.failures {
            tracing::warn!(item = %failure.item, "{}", failure.message);
        }

        let stats = &self.stats;
        tracing::info!("{} commit(s)", stats.commits);
        for (status, count) in &stats.signed {
            tracing::info!("{count} signed commit(s) with status {status}");
        }
        if stats.with_reflog > 0 {
            tracing::info!("{} commit(s) with reflog", stats.with_reflog);
        }
        if stats.with_encoding > 0 {
            tracing::info!(
                "{} commit(s) with non standard encoding",
                stats.with_encoding
            );
        }

        tracing::info!("{} local branch(es)", stats.local_branches);
        if stats.remote_branches.is_empty() {
            tracing::info!("no remote branches");
        }
        for (remote, count) in &stats.remote_branches {
            tracing::info!("{count} {remote}/* branch(es)");
        }
        if stats.tracking_branches > 0 {
            tracing::info!("{} tracking branch(es)", stats.tracking_branches);
        }
        if stats.push_branches > 0 {
            tracing::info!("{} branch(es) with @{{push}}", stats.push_branches);
        }

        match (self.symbolic.get("HEAD"), &self.head_branch) {
            (Some(head), Some(_)) => tracing::info!("HEAD is at {head}"),
            (Some(head), None) => tracing::info!("detached HEAD is at {head}"),
            (None, _) => tracing::info!("no HEAD"),
        }
        match stats.head {
            Some(id) => tracing::info!("HEAD commit: {id}"),
            None => tracing::info!("no HEAD in refs"),
        }
        for (name, target) in &self.symbolic {
            tracing::info!("  {name} -> {target}");
        }

        tracing::info!("{} tag(s)", stats.tags);
        tracing::info!("{} annotated tag(s)", stats.annotated_tags);

        if self.is_ok() {
            tracing::info!("OK, no errors");
        } else {
            tracing::warn!("FAIL: {} error(s)", self.failures.len());
        }
    }
}

/// Verifies the invariants of a history document.
///
/// Every violation is recorded in the returned report; nothing here fails
/// early.
pub fn check_history(history: &History) -> CheckReport {
    let mut checker = Checker {
        history,
        commits: HashMap::new(),
        report: CheckReport {
            symbolic: history.symbolic.clone(),
            ..CheckReport::default()
        },
    };
    checker.check_commits();
    checker.check_branches();
    checker.check_tags();
    checker.check_symbolic();
    checker.report
}

struct Checker<'a> {
    history: &'a History,
    commits: HashMap<ObjectId, &'a Commit>,
    report: CheckReport,
}

impl<'a> Checker<'a> {
    fn fail(&mut self, item: &str, message: impl Into<String>) {
        self.report.failures.push(CheckFailure {
            item: item.to_owned(),
            message: message.into(),
        });
    }

    fn ensure(
        &mut self,
        ok: bool,
        item: &str,
        message: impl FnOnce() -> String,
    ) {
        if !ok {
            self.fail(item, message());
        }
    }

    fn check_commits(&mut self) {
        let history = self.history;
        let count = history.commits.len();
        self.report.stats.commits = count;

        for commit in &history.commits {
            let item = format!("commit {}", commit.id);
            if self.commits.insert(commit.id, commit).is_some() {
                self.fail(&item, "duplicate commit id");
            }
        }

        for (index, commit) in history.commits.iter().enumerate() {
            let item = format!("commit {}", commit.id);
            if index + 1 == count {
                self.ensure(commit.parents.is_empty(), &item, || {
                    "the oldest commit has parents".to_owned()
                });
            } else {
                self.ensure(!commit.parents.is_empty(), &item, || {
                    "commit has no parents".to_owned()
                });
            }

            for (role, identity) in
                [("author", &commit.author), ("committer", &commit.committer)]
            {
                let user = &identity.user;
                self.check_person(&item, role, &user.name, &user.email);
            }
            self.ensure(!commit.message.is_empty(), &item, || {
                "empty message".to_owned()
            });

            if let Some(signature) = &commit.signature {
                *self
                    .report
                    .stats
                    .signed
                    .entry(signature.status.into())
                    .or_default() += 1;
                let fields = [&signature.name, &signature.key];
                for value in fields.into_iter().flatten() {
                    self.ensure(!value.is_empty(), &item, || {
                        "empty signature field".to_owned()
                    });
                }
            }
            if let Some(reflog) = &commit.reflog {
                self.report.stats.with_reflog += 1;
                let fields = [
                    &reflog.selector,
                    &reflog.name,
                    &reflog.email,
                    &reflog.message,
                ];
                for value in fields.into_iter().flatten() {
                    self.ensure(!value.is_empty(), &item, || {
                        "empty reflog field".to_owned()
                    });
                }
            }
            if let Some(encoding) = &commit.encoding {
                self.report.stats.with_encoding += 1;
                self.ensure(!encoding.is_empty(), &item, || {
                    "empty encoding".to_owned()
                });
            }

            for tag in &commit.tags {
                match history.refs.tags.get(tag) {
                    Some(r) => self.check_link(&item, r, commit),
                    None => self.fail(&item, format!("tag {tag} not found")),
                }
            }
            for name in &commit.decorations {
                self.check_decoration(&item, name, commit);
            }
        }
    }

    fn check_person(
        &mut self,
        item: &str,
        role: &str,
        name: &str,
        email: &str,
    ) {
        self.ensure(!name.is_empty(), item, || format!("empty {role} name"));
        let at = email.find('@').is_some_and(|index| index > 0);
        self.ensure(at && !email.contains(['<', '>']), item, || {
            format!("invalid {role} e-mail {email:?}")
        });
    }

    /// A ref linked from a commit must designate that commit.
    fn check_link(&mut self, item: &str, r: &Ref, commit: &Commit) {
        let linked = match (r.kind, r.target_kind) {
            (ObjectKind::Commit, _) => r.id == commit.id,
            (_, Some(ObjectKind::Commit)) => r.target == Some(commit.id),
            _ => true,
        };
        self.ensure(linked, item, || {
            format!("{} ref {} does not link to this commit", r.kind, r.id)
        });
    }

    fn check_decoration(&mut self, item: &str, name: &str, commit: &Commit) {
        let history = self.history;
        let refs = &history.refs;
        if let Some(branch) = refs.heads.get(name) {
            return self.check_link(item, branch, commit);
        }
        if let Some(target) = history.symbolic.get(name) {
            if *target == commit.id.to_string() {
                return;
            }
            return match refs.heads.get(target) {
                Some(branch) => self.check_link(item, branch, commit),
                None => self.fail(
                    item,
                    format!("{name} -> {target} is not a commit or branch"),
                ),
            };
        }
        if name == "refs/stash" {
            return match &refs.stash {
                Some(stash) => self.check_link(item, stash, commit),
                None => self.fail(item, "decorated with a missing stash"),
            };
        }
        let remote = name
            .split_once('/')
            .filter(|(remote, _)| !remote.is_empty())
            .and_then(|(remote, branch)| refs.remotes.get(remote)?.get(branch));
        match remote {
            Some(branch) => self.check_link(item, branch, commit),
            None => {
                self.fail(item, format!("decoration {name} matches no ref"))
            }
        }
    }

    fn check_branches(&mut self) {
        let history = self.history;
        let refs = &history.refs;
        self.report.stats.local_branches = refs.heads.len();
        for (remote, branches) in &refs.remotes {
            self.report
                .stats
                .remote_branches
                .insert(remote.clone(), branches.len());
        }

        let mut branches: Vec<(String, &Ref)> = refs
            .heads
            .iter()
            .map(|(name, r)| (format!("heads/{name}"), r))
            .collect();
        for (remote, remote_branches) in &refs.remotes {
            for (name, r) in remote_branches {
                branches.push((format!("remotes/{remote}/{name}"), r));
            }
        }
        if let Some(stash) = &refs.stash {
            branches.push(("stash".to_owned(), stash));
        }

        for (item, r) in branches {
            self.check_ref(&item, r);
            self.ensure(r.kind == ObjectKind::Commit, &item, || {
                format!("branch points at a {}", r.kind)
            });
            if r.upstream.is_some() {
                self.report.stats.tracking_branches += 1;
            }
            if r.push.is_some() {
                self.report.stats.push_branches += 1;
            }
            if r.head {
                match self.report.stats.head {
                    Some(previous) => self.fail(
                        &item,
                        format!("duplicate HEAD: {previous} and {}", r.id),
                    ),
                    None => self.report.stats.head = Some(r.id),
                }
            }
        }
    }

    fn check_tags(&mut self) {
        let history = self.history;
        let tags = &history.refs.tags;
        self.report.stats.tags = tags.len();
        for (name, r) in tags {
            let item = format!("tags/{name}");
            self.check_ref(&item, r);
            self.ensure(!r.head, &item, || "HEAD on a tag".to_owned());
            if r.kind != ObjectKind::Tag && r.tagger.is_none() {
                continue;
            }
            self.report.stats.annotated_tags += 1;
            self.ensure(r.kind == ObjectKind::Tag, &item, || {
                format!("annotated tag has type {}", r.kind)
            });
            self.ensure(
                r.target_kind.is_some() && r.target.is_some(),
                &item,
                || "annotated tag without target".to_owned(),
            );
            // Old tags may have no tagger at all.
            if let Some(tagger) = &r.tagger {
                let user = &tagger.user;
                self.check_person(&item, "tagger", &user.name, &user.email);
                self.ensure(
                    r.message.as_ref().is_some_and(|m| !m.is_empty()),
                    &item,
                    || "annotated tag without message".to_owned(),
                );
            }
        }
    }

    /// Checks shared by every ref.
    fn check_ref(&mut self, item: &str, r: &Ref) {
        self.ensure(r.size > 0, item, || "object size is 0".to_owned());
        for value in [&r.upstream, &r.push].into_iter().flatten() {
            self.ensure(!value.is_empty(), item, || {
                "empty upstream or push".to_owned()
            });
        }
        if r.kind == ObjectKind::Commit {
            let known = self.commits.contains_key(&r.id);
            self.ensure(known, item, || format!("commit {} not found", r.id));
        }
        if let (Some(ObjectKind::Commit), Some(target)) =
            (r.target_kind, r.target)
        {
            let known = self.commits.contains_key(&target);
            self.ensure(known, item, || {
                format!("tagged commit {target} not found")
            });
        }
    }

    fn check_symbolic(&mut self) {
        let history = self.history;
        for (name, target) in &history.symbolic {
            let item = format!("REFS/{name}");
            self.ensure(is_symbolic_name(name), &item, || {
                "name is not ALL_CAPS".to_owned()
            });
            self.ensure(!target.is_empty(), &item, || {
                "empty target".to_owned()
            });

            if let Some(branch) = history.refs.heads.get(target) {
                if name == "HEAD" {
                    self.report.head_branch = Some(target.clone());
                    self.ensure(branch.head, &item, || {
                        format!("branch {target} is not marked as HEAD")
                    });
                }
                continue;
            }
            let Ok(id) = target.parse::<ObjectId>() else {
                continue;
            };
            match self.commits.get(&id).copied() {
                Some(commit) => {
                    let decorated =
                        commit.decorations.iter().any(|d| d == name);
                    self.ensure(decorated, &item, || {
                        format!("{name} does not decorate commit {id}")
                    });
                }
                None => self.fail(&item, format!("commit {id} not found")),
            }
        }
    }
}
