// Copyright 2026 Oxide Computer Company

//! In-memory sinks and record builders shared by unit tests.

use crate::{
    Commit, Identity, ObjectId, ObjectKind, Person, Ref, Sink, SinkError,
    SinkFactory, records::SEPARATOR,
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::DateTime;
use std::{
    cell::{Cell, RefCell},
    io,
    rc::Rc,
};

pub(crate) fn id(byte: u8) -> ObjectId {
    ObjectId::Sha1([byte; 20])
}

pub(crate) fn identity(name: &str) -> Identity {
    Identity {
        user: Person {
            name: name.to_owned(),
            email: format!("{}@example.com", name.to_lowercase()),
        },
        date: DateTime::parse_from_rfc3339("2024-01-01T00:00:00+00:00")
            .unwrap(),
    }
}

pub(crate) fn commit(byte: u8, parents: &[u8]) -> Commit {
    Commit {
        id: id(byte),
        parents: parents.iter().map(|p| id(*p)).collect(),
        tree: id(0xee),
        author: identity("Ann"),
        committer: identity("Cid"),
        message: format!("commit {byte}"),
        signature: None,
        encoding: None,
        reflog: None,
        decorations: Vec::new(),
        tags: Vec::new(),
    }
}

pub(crate) fn commit_ref(byte: u8) -> Ref {
    Ref {
        id: id(byte),
        kind: ObjectKind::Commit,
        size: 220,
        upstream: None,
        push: None,
        head: false,
        target_kind: None,
        target: None,
        tagger: None,
        message: None,
    }
}

/// A `rev-list` record for `id(byte)`.
pub(crate) fn commit_record(
    byte: u8,
    parents: &[u8],
    decorations: &str,
) -> String {
    let parents: Vec<String> =
        parents.iter().map(|p| id(*p).to_string()).collect();
    [
        format!("commit {}", id(byte)),
        parents.join(" "),
        id(0xee).to_string(),
        "Ann".to_owned(),
        "ann@example.com".to_owned(),
        "2024-01-01T00:00:00+00:00".to_owned(),
        "Cid".to_owned(),
        "cid@example.com".to_owned(),
        "2024-01-01T00:00:00+00:00".to_owned(),
        "N".to_owned(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        decorations.to_owned(),
        format!("commit {byte}"),
    ]
    .join("\n")
}

/// A `for-each-ref` record for a ref pointing at commit `id(byte)`.
pub(crate) fn ref_record(byte: u8, path: &str, head: bool) -> String {
    let id = id(byte).to_string();
    [
        id.as_str(),
        path,
        "commit",
        "220",
        "",
        "",
        "",
        "",
        "",
        "",
        "",
        if head { "*" } else { " " },
        "subject",
    ]
    .join("\n")
}

/// Frames records the way git does.
pub(crate) fn stream(records: &[String]) -> Vec<u8> {
    let mut out = Vec::new();
    for record in records {
        out.extend_from_slice(record.as_bytes());
        out.extend_from_slice(SEPARATOR);
    }
    out.push(b'\n');
    out
}

#[derive(Debug)]
pub(crate) struct MemoryFile {
    pub(crate) path: Utf8PathBuf,
    pub(crate) bytes: Vec<u8>,
    pub(crate) ended: bool,
}

/// A sink factory that keeps every file in memory.
///
/// `accept` is what every `write` reports; `fail` makes writes error out.
#[derive(Clone, Debug)]
pub(crate) struct MemoryFactory {
    pub(crate) files: Rc<RefCell<Vec<MemoryFile>>>,
    pub(crate) accept: Rc<Cell<bool>>,
    pub(crate) fail: Rc<Cell<bool>>,
}

impl Default for MemoryFactory {
    fn default() -> Self {
        MemoryFactory {
            files: Rc::default(),
            accept: Rc::new(Cell::new(true)),
            fail: Rc::default(),
        }
    }
}

impl MemoryFactory {
    pub(crate) fn paths(&self) -> Vec<String> {
        self.files.borrow().iter().map(|f| f.path.to_string()).collect()
    }

    pub(crate) fn json(&self, path: &str) -> serde_json::Value {
        let files = self.files.borrow();
        let file = files
            .iter()
            .find(|f| f.path == path)
            .unwrap_or_else(|| panic!("no file {path}"));
        assert!(file.ended, "{path} was not ended");
        serde_json::from_slice(&file.bytes)
            .unwrap_or_else(|e| panic!("{path} is not valid JSON: {e}"))
    }
}

#[derive(Debug)]
pub(crate) struct MemorySink {
    index: usize,
    factory: MemoryFactory,
}

impl Sink for MemorySink {
    type Pending = Utf8PathBuf;

    fn write(&mut self, bytes: &[u8]) -> Result<bool, SinkError> {
        let mut files = self.factory.files.borrow_mut();
        let file = &mut files[self.index];
        assert!(!file.ended, "write after end to {}", file.path);
        if self.factory.fail.get() {
            return Err(SinkError::Write {
                path: file.path.clone(),
                source: io::Error::other("disk full"),
            });
        }
        file.bytes.extend_from_slice(bytes);
        Ok(self.factory.accept.get())
    }

    fn end(self, tail: &[u8]) -> Result<Self::Pending, SinkError> {
        let mut files = self.factory.files.borrow_mut();
        let file = &mut files[self.index];
        assert!(!file.ended, "{} ended twice", file.path);
        file.bytes.extend_from_slice(tail);
        file.ended = true;
        Ok(file.path.clone())
    }
}

impl SinkFactory for MemoryFactory {
    type Sink = MemorySink;

    fn create(&mut self, path: &Utf8Path) -> Result<MemorySink, SinkError> {
        let mut files = self.files.borrow_mut();
        files.push(MemoryFile {
            path: path.to_owned(),
            bytes: Vec::new(),
            ended: false,
        });
        Ok(MemorySink { index: files.len() - 1, factory: self.clone() })
    }
}
