// Copyright 2026 Oxide Computer Company

//! Record framing for the two git output streams.
//!
//! Both git invocations end every record with [`SEPARATOR`], a run of
//! newlines far longer than any run of empty fields a record can contain.
//! [`RecordSplitter`] turns arbitrary stdout chunks back into whole records.

/// The record separator: 32 newlines.
pub const SEPARATOR: &[u8] = &[b'\n'; 32];

/// Ref fields requested from `git for-each-ref`, in record order.
const REF_FIELDS: [&str; 14] = [
    "%(objectname)",
    "%(refname)",
    "%(objecttype)",
    "%(objectsize)",
    "%(type)",
    "%(object)",
    "%(taggername)",
    "%(taggeremail)",
    "%(taggerdate:iso-strict)",
    "%(upstream:short)",
    "%(push:short)",
    "%(HEAD)",
    "%(subject)",
    "%(body)",
];

/// Commit fields requested from `git rev-list --pretty`, in record order.
/// `rev-list` prefixes each record with its own `commit <id>` line.
const COMMIT_FIELDS: [&str; 18] = [
    "%P", "%T", "%an", "%ae", "%aI", "%cn", "%ce", "%cI", "%G?", "%GS", "%GK",
    "%e", "%gD", "%gn", "%ge", "%gs", "%D", "%B",
];

/// Returns the `--format` argument for `git for-each-ref`.
pub fn refs_format() -> String {
    let mut format = format!("--format={}", REF_FIELDS.join("%0a"));
    format.push_str(&"%0a".repeat(SEPARATOR.len()));
    format
}

/// Returns the `--pretty` argument for `git rev-list`.
pub fn commits_format() -> String {
    let mut format = format!("--pretty=tformat:{}", COMMIT_FIELDS.join("%n"));
    format.push_str(&"%n".repeat(SEPARATOR.len()));
    format
}

/// Splits one stream into records, carrying partial records across chunks.
///
/// The carried tail is kept as raw bytes, so a chunk boundary inside a
/// multi-byte UTF-8 sequence does not corrupt the text.
///
/// ```
/// use git_history::RecordSplitter;
///
/// let sep = "\n".repeat(32);
/// let mut splitter = RecordSplitter::new();
/// let first = splitter.split(format!("one{sep}tw").as_bytes(), false);
/// assert_eq!(first, ["one"]);
/// let rest = splitter.split(b"o", true);
/// assert_eq!(rest, ["two"]);
/// ```
#[derive(Debug, Default)]
pub struct RecordSplitter {
    carry: Vec<u8>,
}

impl RecordSplitter {
    /// Creates a splitter with nothing carried over.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` to the carried bytes and returns every record that is
    /// now complete.
    ///
    /// When `is_final` is set, the trailing segment is returned as a record
    /// too and the carry is emptied.
    pub fn split(&mut self, chunk: &[u8], is_final: bool) -> Vec<String> {
        // A separator ending inside `chunk` can start at most
        // `SEPARATOR.len() - 1` bytes before the old end of the carry.
        let mut pos = self.carry.len().saturating_sub(SEPARATOR.len() - 1);
        self.carry.extend_from_slice(chunk);

        let mut records = Vec::new();
        let mut start = 0;
        while let Some(found) = find_separator(&self.carry[pos..]) {
            let end = pos + found;
            records.push(decode(&self.carry[start..end]));
            start = end + SEPARATOR.len();
            pos = start;
        }

        if is_final {
            records.push(decode(&self.carry[start..]));
            self.carry.clear();
        } else {
            self.carry.drain(..start);
        }
        records
    }

    /// Returns the number of bytes waiting for the rest of their record.
    pub fn carried(&self) -> usize {
        self.carry.len()
    }
}

fn find_separator(haystack: &[u8]) -> Option<usize> {
    haystack.windows(SEPARATOR.len()).position(|window| window == SEPARATOR)
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
