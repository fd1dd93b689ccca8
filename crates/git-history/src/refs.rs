// Copyright 2026 Oxide Computer Company

//! Ref records from `git for-each-ref` and the containers they land in.

use crate::{Identity, Issue, ObjectId, RecordError};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, btree_map::Entry},
    fmt,
    str::FromStr,
};

/// The kind of object a ref (or an annotated tag) points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// A commit.
    Commit,
    /// An annotated tag object.
    Tag,
    /// A tree.
    Tree,
    /// A blob.
    Blob,
}

impl FromStr for ObjectKind {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commit" => Ok(ObjectKind::Commit),
            "tag" => Ok(ObjectKind::Tag),
            "tree" => Ok(ObjectKind::Tree),
            "blob" => Ok(ObjectKind::Blob),
            _ => Err(RecordError::InvalidObjectKind { value: s.to_owned() }),
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectKind::Commit => "commit",
            ObjectKind::Tag => "tag",
            ObjectKind::Tree => "tree",
            ObjectKind::Blob => "blob",
        };
        f.write_str(s)
    }
}

/// One named pointer into the object store.
///
/// The last four fields are only present for annotated tags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ref {
    /// The object the ref points at.
    #[serde(rename = "sha1")]
    pub id: ObjectId,
    /// The kind of that object.
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    /// The size of that object in bytes.
    pub size: u64,
    /// The upstream branch, in short form (`origin/main`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,
    /// The push destination, in short form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push: Option<String>,
    /// Whether this is the checked-out branch.
    #[serde(rename = "HEAD", default, skip_serializing_if = "is_false")]
    pub head: bool,
    /// The kind of the object an annotated tag points at.
    #[serde(
        rename = "objecttype",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub target_kind: Option<ObjectKind>,
    /// The object an annotated tag points at.
    #[serde(
        rename = "object",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub target: Option<ObjectId>,
    /// Who created an annotated tag, and when.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagger: Option<Identity>,
    /// The annotated tag message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !value
}

impl Ref {
    /// Returns the commit this ref designates, looking through an annotated
    /// tag to its target.
    pub fn commit(&self) -> Option<ObjectId> {
        match (self.kind, self.target_kind) {
            (ObjectKind::Commit, _) => Some(self.id),
            (ObjectKind::Tag, Some(ObjectKind::Commit)) => self.target,
            _ => None,
        }
    }
}

/// Where a ref lives, derived from its full path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefPath {
    /// `refs/heads/<name>`.
    Head(String),
    /// `refs/tags/<name>`.
    Tag(String),
    /// `refs/remotes/<remote>/<branch>`.
    Remote {
        /// The remote name.
        remote: String,
        /// The branch name within the remote.
        branch: String,
    },
    /// `refs/stash`.
    Stash,
}

impl RefPath {
    const HEADS: &'static str = "refs/heads/";
    const TAGS: &'static str = "refs/tags/";
    const REMOTES: &'static str = "refs/remotes/";
    const STASH: &'static str = "refs/stash";

    /// Classifies a full ref path.
    pub fn parse(path: &str) -> Result<Self, RecordError> {
        if let Some(name) = path.strip_prefix(Self::HEADS) {
            return Ok(RefPath::Head(name.to_owned()));
        }
        if let Some(name) = path.strip_prefix(Self::TAGS) {
            return Ok(RefPath::Tag(name.to_owned()));
        }
        if let Some(name) = path.strip_prefix(Self::REMOTES) {
            return match name.split_once('/') {
                Some((remote, branch))
                    if !remote.is_empty() && !branch.is_empty() =>
                {
                    Ok(RefPath::Remote {
                        remote: remote.to_owned(),
                        branch: branch.to_owned(),
                    })
                }
                _ => Err(RecordError::InvalidRemoteName {
                    path: path.to_owned(),
                }),
            };
        }
        if path == Self::STASH {
            return Ok(RefPath::Stash);
        }
        Err(RecordError::UnknownRefKind { path: path.to_owned() })
    }
}

/// A parsed `for-each-ref` record.
#[derive(Clone, Debug, PartialEq)]
pub struct RefRecord {
    /// The full ref path as printed by git.
    pub full_name: String,
    /// The namespace and name.
    pub path: RefPath,
    /// The ref itself.
    pub value: Ref,
    /// Why the annotated tag fields could not be read. The ref is still
    /// usable, with whatever tag metadata was parsed before the error.
    pub tag_error: Option<RecordError>,
}

impl RefRecord {
    /// Minimum number of fields: id, path, kind, size.
    const MIN_FIELDS: usize = 4;
    /// Minimum number of fields for an annotated tag: through tagger date.
    const MIN_TAG_FIELDS: usize = 9;
    /// Index of the first tag message line.
    const MESSAGE: usize = 12;

    /// Parses one trimmed record.
    ///
    /// Only the first four fields and the ref path are required. Problems
    /// with the annotated tag fields end up in
    /// [`tag_error`](Self::tag_error) instead.
    pub fn parse(record: &str) -> Result<Self, RecordError> {
        let fields: Vec<&str> = record.split('\n').collect();
        if fields.len() < Self::MIN_FIELDS {
            return Err(RecordError::TooFewFields {
                found: fields.len(),
                expected: Self::MIN_FIELDS,
            });
        }

        let full_name = fields[1];
        let path = RefPath::parse(full_name)?;
        let id = parse_id(fields[0], "object id")?;
        let kind: ObjectKind = fields[2].parse()?;
        let size = fields[3].parse().map_err(|_| RecordError::InvalidSize {
            value: fields[3].to_owned(),
        })?;

        let optional = |index: usize| {
            fields.get(index).filter(|s| !s.is_empty()).map(|s| s.to_string())
        };
        let mut value = Ref {
            id,
            kind,
            size,
            upstream: optional(9),
            push: optional(10),
            head: fields.get(11) == Some(&"*"),
            target_kind: None,
            target: None,
            tagger: None,
            message: None,
        };

        let tag_error = match kind {
            ObjectKind::Tag => Self::parse_tag(&fields, &mut value).err(),
            _ => None,
        };

        Ok(RefRecord {
            full_name: full_name.to_owned(),
            path,
            value,
            tag_error,
        })
    }

    /// Fills in the annotated tag fields. Tags created without a tagger
    /// have empty tagger fields and get no [`Ref::tagger`].
    fn parse_tag(fields: &[&str], value: &mut Ref) -> Result<(), RecordError> {
        if let Some(target_kind) = fields.get(4).filter(|s| !s.is_empty()) {
            value.target_kind = Some(target_kind.parse()?);
        }
        if let Some(target) = fields.get(5).filter(|s| !s.is_empty()) {
            value.target = Some(parse_id(target, "tag object")?);
        }
        value.message =
            fields.get(Self::MESSAGE..).map(|lines| lines.join("\n"));
        if fields.len() < Self::MIN_TAG_FIELDS {
            return Err(RecordError::WrongTagFormat { found: fields.len() });
        }

        if fields[8].is_empty() {
            return Ok(());
        }
        let email = fields[7]
            .strip_prefix('<')
            .and_then(|e| e.strip_suffix('>'))
            .unwrap_or(fields[7]);
        value.tagger = Some(Identity::from_fields(
            fields[6],
            email,
            fields[8],
            "tagger date",
        )?);
        Ok(())
    }
}

pub(crate) fn parse_id(
    value: &str,
    field: &'static str,
) -> Result<ObjectId, RecordError> {
    value.parse().map_err(|error| RecordError::InvalidObjectId {
        field,
        value: value.to_owned(),
        error,
    })
}

/// All refs of a repository, by namespace.
///
/// Names are unique within each namespace; [`Refs::insert`] keeps the first
/// entry on a collision.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refs {
    /// Local branches.
    #[serde(default)]
    pub heads: BTreeMap<String, Ref>,
    /// Tags, lightweight and annotated.
    #[serde(default)]
    pub tags: BTreeMap<String, Ref>,
    /// Remote-tracking branches, by remote name.
    #[serde(default)]
    pub remotes: BTreeMap<String, BTreeMap<String, Ref>>,
    /// The stash, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stash: Option<Ref>,
}

impl Refs {
    /// Inserts a parsed record into its namespace.
    ///
    /// Returns [`Issue::DuplicateRef`] if the name is taken; the existing
    /// entry is left untouched.
    pub fn insert(&mut self, record: RefRecord) -> Result<(), Issue> {
        let duplicate =
            || Issue::DuplicateRef { path: record.full_name.clone() };
        let container = match &record.path {
            RefPath::Head(name) => (&mut self.heads, name),
            RefPath::Tag(name) => (&mut self.tags, name),
            RefPath::Remote { remote, branch } => {
                (self.remotes.entry(remote.clone()).or_default(), branch)
            }
            RefPath::Stash => {
                if self.stash.is_some() {
                    return Err(duplicate());
                }
                self.stash = Some(record.value);
                return Ok(());
            }
        };
        let (map, name) = container;
        match map.entry(name.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(record.value);
                Ok(())
            }
            Entry::Occupied(_) => Err(duplicate()),
        }
    }

    /// Returns the checked-out local branch, if any.
    pub fn checked_out(&self) -> Option<(&str, &Ref)> {
        self.heads
            .iter()
            .find(|(_, r)| r.head)
            .map(|(name, r)| (name.as_str(), r))
    }

    /// Returns every branch-like ref: local branches, remote-tracking
    /// branches and the stash.
    pub fn branches(&self) -> impl Iterator<Item = &Ref> {
        self.heads
            .values()
            .chain(self.remotes.values().flat_map(|remote| remote.values()))
            .chain(self.stash.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMIT: &str = "0123456789abcdef0123456789abcdef01234567";
    const TAG_OBJECT: &str = "fedcba9876543210fedcba9876543210fedcba98";

    fn branch_record(path: &str, upstream: &str, head: &str) -> String {
        [
            COMMIT, path, "commit", "230", "", "", "", "", "", upstream, "",
            head, "subject",
        ]
        .join("\n")
    }

    #[test]
    fn test_parse_local_branch() {
        let text = branch_record("refs/heads/main", "origin/main", "*");
        let record = RefRecord::parse(&text).unwrap();
        assert_eq!(record.path, RefPath::Head("main".to_owned()));
        assert_eq!(record.value.id.to_string(), COMMIT);
        assert_eq!(record.value.kind, ObjectKind::Commit);
        assert_eq!(record.value.size, 230);
        assert_eq!(record.value.upstream.as_deref(), Some("origin/main"));
        assert_eq!(record.value.push, None);
        assert!(record.value.head);
        assert_eq!(record.value.tagger, None);
    }

    #[test]
    fn test_parse_minimal_record() {
        // Trailing empty fields are trimmed away before parsing.
        let record =
            RefRecord::parse(&format!("{COMMIT}\nrefs/heads/dev\ncommit\n12"))
                .unwrap();
        assert_eq!(record.path, RefPath::Head("dev".to_owned()));
        assert!(!record.value.head);
        assert_eq!(record.value.upstream, None);
    }

    #[test]
    fn test_parse_paths() {
        assert_eq!(
            RefPath::parse("refs/remotes/origin/feature/x").unwrap(),
            RefPath::Remote {
                remote: "origin".to_owned(),
                branch: "feature/x".to_owned()
            }
        );
        assert_eq!(RefPath::parse("refs/stash").unwrap(), RefPath::Stash);
        assert_eq!(
            RefPath::parse("refs/tags/v1.0").unwrap(),
            RefPath::Tag("v1.0".to_owned())
        );
        assert!(matches!(
            RefPath::parse("refs/notes/commits"),
            Err(RecordError::UnknownRefKind { .. })
        ));
        assert!(matches!(
            RefPath::parse("refs/remotes/origin"),
            Err(RecordError::InvalidRemoteName { .. })
        ));
        assert!(matches!(
            RefPath::parse("refs/remotes//main"),
            Err(RecordError::InvalidRemoteName { .. })
        ));
    }

    #[test]
    fn test_parse_annotated_tag() {
        let record = [
            TAG_OBJECT,
            "refs/tags/v1",
            "tag",
            "150",
            "commit",
            COMMIT,
            "Jane Doe",
            "<jane@example.com>",
            "2024-01-02T03:04:05+01:00",
            "",
            "",
            " ",
            "Release v1",
            "",
            "Body line",
        ]
        .join("\n");
        let record = RefRecord::parse(&record).unwrap();
        let value = record.value;
        assert_eq!(record.path, RefPath::Tag("v1".to_owned()));
        assert_eq!(value.kind, ObjectKind::Tag);
        assert_eq!(value.target_kind, Some(ObjectKind::Commit));
        assert_eq!(value.target.unwrap().to_string(), COMMIT);
        assert_eq!(value.commit().unwrap().to_string(), COMMIT);
        let tagger = value.tagger.unwrap();
        assert_eq!(tagger.user.name, "Jane Doe");
        assert_eq!(tagger.user.email, "jane@example.com");
        assert_eq!(value.message.as_deref(), Some("Release v1\n\nBody line"));
        assert!(!value.head);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            RefRecord::parse("a\nb\nc"),
            Err(RecordError::TooFewFields { found: 3, expected: 4 })
        ));
        assert!(matches!(
            RefRecord::parse(&format!("{COMMIT}\nrefs/heads/x\ncommit\nbig")),
            Err(RecordError::InvalidSize { .. })
        ));
        assert!(matches!(
            RefRecord::parse(&format!("{COMMIT}\nrefs/heads/x\nthing\n1")),
            Err(RecordError::InvalidObjectKind { .. })
        ));
    }

    #[test]
    fn test_short_tag_record_keeps_the_ref() {
        let short_tag = format!("{TAG_OBJECT}\nrefs/tags/x\ntag\n1\ncommit");
        let record = RefRecord::parse(&short_tag).unwrap();
        assert_eq!(record.path, RefPath::Tag("x".to_owned()));
        assert_eq!(record.value.target_kind, Some(ObjectKind::Commit));
        assert_eq!(record.value.target, None);
        assert!(matches!(
            record.tag_error,
            Some(RecordError::WrongTagFormat { found: 5 })
        ));
    }

    #[test]
    fn test_parse_tag_without_tagger() {
        // Old tags have no tagger header, so git prints empty fields.
        let record = [
            TAG_OBJECT,
            "refs/tags/v0.99",
            "tag",
            "112",
            "commit",
            COMMIT,
            "",
            "",
            "",
            "",
            "",
            " ",
            "Linux v0.99",
        ]
        .join("\n");
        let record = RefRecord::parse(&record).unwrap();
        assert_eq!(record.tag_error, None);
        assert_eq!(record.value.tagger, None);
        assert_eq!(record.value.commit().unwrap().to_string(), COMMIT);
        assert_eq!(record.value.message.as_deref(), Some("Linux v0.99"));

        let mut refs = Refs::default();
        refs.insert(record).unwrap();
        assert!(refs.tags.contains_key("v0.99"));
    }

    #[test]
    fn test_bad_tagger_date_keeps_the_ref() {
        let record = [
            TAG_OBJECT,
            "refs/tags/v2",
            "tag",
            "150",
            "commit",
            COMMIT,
            "Jane Doe",
            "<jane@example.com>",
            "yesterday",
            "",
            "",
            " ",
            "Release v2",
        ]
        .join("\n");
        let record = RefRecord::parse(&record).unwrap();
        assert!(matches!(
            record.tag_error,
            Some(RecordError::InvalidDate { field: "tagger date", .. })
        ));
        assert_eq!(record.value.tagger, None);
        assert_eq!(record.value.message.as_deref(), Some("Release v2"));
        assert_eq!(record.value.commit().unwrap().to_string(), COMMIT);
    }

    #[test]
    fn test_insert_rejects_duplicates() {
        let mut refs = Refs::default();
        let first = RefRecord::parse(&branch_record("refs/heads/main", "", "*"))
            .unwrap();
        let mut second = first.clone();
        second.value.size = 1;
        refs.insert(first).unwrap();
        let err = refs.insert(second).unwrap_err();
        assert!(matches!(
            err,
            Issue::DuplicateRef { ref path } if path == "refs/heads/main"
        ));
        assert_eq!(refs.heads["main"].size, 230, "first entry kept");

        let stash = format!("{COMMIT}\nrefs/stash\ncommit\n9");
        let stash = RefRecord::parse(&stash).unwrap();
        refs.insert(stash.clone()).unwrap();
        assert!(refs.insert(stash).is_err(), "single stash slot");

        let remote = RefRecord::parse(&branch_record(
            "refs/remotes/origin/main",
            "",
            " ",
        ))
        .unwrap();
        refs.insert(remote).unwrap();
        assert!(refs.remotes["origin"].contains_key("main"));
        assert_eq!(refs.checked_out().map(|(name, _)| name), Some("main"));
        assert_eq!(refs.branches().count(), 3);
    }
}
