// Copyright 2026 Oxide Computer Company

//! Commit records from `git rev-list --pretty`.

use crate::{DecorationError, Identity, ObjectId, RecordError, refs::parse_id};
use serde::{Deserialize, Serialize};

/// The verification status git reports for a signed commit (`%G?`).
///
/// Serialized as git's single status letter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "char", into = "char")]
pub enum SignatureStatus {
    /// `G`: a good, valid signature.
    Good,
    /// `B`: a bad signature.
    Bad,
    /// `U`: a good signature with unknown validity.
    Untrusted,
    /// `X`: a good signature that has expired.
    ExpiredSignature,
    /// `Y`: a good signature made by an expired key.
    ExpiredKey,
    /// `R`: a good signature made by a revoked key.
    RevokedKey,
    /// `E`: the signature cannot be checked.
    CannotCheck,
    /// Any other letter a future git may print.
    Other(char),
}

impl From<char> for SignatureStatus {
    fn from(c: char) -> Self {
        match c {
            'G' => SignatureStatus::Good,
            'B' => SignatureStatus::Bad,
            'U' => SignatureStatus::Untrusted,
            'X' => SignatureStatus::ExpiredSignature,
            'Y' => SignatureStatus::ExpiredKey,
            'R' => SignatureStatus::RevokedKey,
            'E' => SignatureStatus::CannotCheck,
            other => SignatureStatus::Other(other),
        }
    }
}

impl From<SignatureStatus> for char {
    fn from(status: SignatureStatus) -> Self {
        match status {
            SignatureStatus::Good => 'G',
            SignatureStatus::Bad => 'B',
            SignatureStatus::Untrusted => 'U',
            SignatureStatus::ExpiredSignature => 'X',
            SignatureStatus::ExpiredKey => 'Y',
            SignatureStatus::RevokedKey => 'R',
            SignatureStatus::CannotCheck => 'E',
            SignatureStatus::Other(c) => c,
        }
    }
}

/// Signature data for a signed commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// The verification status.
    #[serde(rename = "type")]
    pub status: SignatureStatus,
    /// The signer, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The signing key, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Reflog metadata attached to a commit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reflog {
    /// The reflog selector (`%gD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// The reflog identity name (`%gn`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The reflog identity e-mail (`%ge`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// The reflog subject (`%gs`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One historical snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// The commit id.
    #[serde(rename = "sha1")]
    pub id: ObjectId,
    /// Parent commits in order. Empty only for root commits.
    pub parents: Vec<ObjectId>,
    /// The root tree.
    pub tree: ObjectId,
    /// The author.
    pub author: Identity,
    /// The committer.
    pub committer: Identity,
    /// The raw commit message.
    pub message: String,
    /// Signature data. Absent for unsigned commits.
    #[serde(rename = "GPG", default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
    /// A non-default message encoding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    /// Reflog metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflog: Option<Reflog>,
    /// Branch and symbolic-ref names decorating this commit.
    #[serde(rename = "refs", default, skip_serializing_if = "Vec::is_empty")]
    pub decorations: Vec<String>,
    /// Tag names decorating this commit.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// One classified decoration token from `%D`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decoration {
    /// A bare name such as `main`, `origin/main` or `HEAD`.
    Name(String),
    /// `tag: <name>`.
    Tag(String),
    /// `<NAME> -> <branch>`.
    Symbolic {
        /// The symbolic name.
        name: String,
        /// The branch it points to.
        target: String,
    },
}

impl Decoration {
    /// Classifies a single token of a `%D` list.
    pub fn parse(token: &str) -> Result<Self, DecorationError> {
        let words: Vec<&str> = token.split(' ').collect();
        match words.as_slice() {
            [name] => Ok(Decoration::Name((*name).to_owned())),
            ["tag:", name] => Ok(Decoration::Tag((*name).to_owned())),
            [_, _] => Err(DecorationError::TagName(token.to_owned())),
            [name, "->", target] => Ok(Decoration::Symbolic {
                name: (*name).to_owned(),
                target: (*target).to_owned(),
            }),
            [_, _, _] => Err(DecorationError::BranchName(token.to_owned())),
            _ => Err(DecorationError::RefName(token.to_owned())),
        }
    }

    /// Splits a whole `%D` field into classified tokens.
    pub fn parse_list(field: &str) -> Vec<Result<Self, DecorationError>> {
        if field.is_empty() {
            return Vec::new();
        }
        field.split(", ").map(Decoration::parse).collect()
    }
}

/// Returns true for names that may be symbolic refs: non-empty, made of
/// ASCII capitals and underscores (`HEAD`, `ORIG_HEAD`, `FETCH_HEAD`).
pub fn is_symbolic_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| b.is_ascii_uppercase() || b == b'_')
}

/// A parsed `rev-list` record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitRecord {
    /// The commit, with `decorations` and `tags` filled in from every
    /// well-formed decoration token.
    pub commit: Commit,
    /// Every decoration token, classified, in order. Symbolic names and
    /// malformed tokens are reported from here.
    pub decorations: Vec<Result<Decoration, DecorationError>>,
}

impl CommitRecord {
    /// Minimum number of fields: through the signature status.
    const MIN_FIELDS: usize = 10;
    const DECORATIONS: usize = 17;
    const MESSAGE: usize = 18;

    /// Parses one trimmed record.
    pub fn parse(record: &str) -> Result<Self, RecordError> {
        let fields: Vec<&str> = record.split('\n').collect();
        if fields.len() < Self::MIN_FIELDS {
            return Err(RecordError::TooFewFields {
                found: fields.len(),
                expected: Self::MIN_FIELDS,
            });
        }
        let optional = |index: usize| {
            fields.get(index).filter(|s| !s.is_empty()).map(|s| s.to_string())
        };

        let id = fields[0].strip_prefix("commit ").ok_or_else(|| {
            RecordError::MissingCommitHeader { line: fields[0].to_owned() }
        })?;
        let id = parse_id(id, "commit id")?;
        let parents = if fields[1].is_empty() {
            Vec::new()
        } else {
            fields[1]
                .split(' ')
                .map(|parent| parse_id(parent, "parent id"))
                .collect::<Result<_, _>>()?
        };
        let tree = parse_id(fields[2], "tree id")?;
        let author = Identity::from_fields(
            fields[3],
            fields[4],
            fields[5],
            "author date",
        )?;
        let committer = Identity::from_fields(
            fields[6],
            fields[7],
            fields[8],
            "committer date",
        )?;

        let signature = match fields[9].chars().next() {
            None | Some('N') => None,
            Some(status) => Some(Signature {
                status: status.into(),
                name: optional(10),
                key: optional(11),
            }),
        };

        let reflog = Reflog {
            selector: optional(13),
            name: optional(14),
            email: optional(15),
            message: optional(16),
        };
        let reflog = (reflog != Reflog::default()).then_some(reflog);

        let mut commit = Commit {
            id,
            parents,
            tree,
            author,
            committer,
            message: fields
                .get(Self::MESSAGE..)
                .unwrap_or_default()
                .join("\n"),
            signature,
            encoding: optional(12),
            reflog,
            decorations: Vec::new(),
            tags: Vec::new(),
        };

        let decorations = Decoration::parse_list(
            fields.get(Self::DECORATIONS).copied().unwrap_or_default(),
        );
        for decoration in decorations.iter().flatten() {
            match decoration {
                Decoration::Name(name)
                | Decoration::Symbolic { name, .. } => {
                    commit.decorations.push(name.clone())
                }
                Decoration::Tag(name) => commit.tags.push(name.clone()),
            }
        }

        Ok(CommitRecord { commit, decorations })
    }
}
