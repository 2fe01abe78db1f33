//! The commit model shared by every sync direction.
//!
//! A [`Commit`] is built once from a repository's history and never mutated.
//! Filters consume a commit and hand back a new value.

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Author identity as recorded in the commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// Commit metadata: identity, parentage, authorship and message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitHeader {
    pub id: String,
    pub parents: Vec<String>,
    pub author: Author,
    pub timestamp: DateTime<FixedOffset>,
    pub message: String,
}

impl CommitHeader {
    /// `true` iff the commit has more than one parent.
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// First line of the message.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim()
    }

    /// Everything after the subject line, without surrounding blank lines.
    pub fn body(&self) -> &str {
        match self.message.split_once('\n') {
            Some((_, rest)) => rest.trim_matches('\n'),
            None => "",
        }
    }
}

/// The change to a single file, relative to the commit's first parent.
///
/// `body` holds everything after the `diff --git` line: mode lines, the
/// `---`/`+++` header, and hunks or binary data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub path: String,
    pub body: String,
}

impl FileDiff {
    pub fn new(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            body: body.into(),
        }
    }

    /// Return the same change relocated to `new_path`.
    ///
    /// The `---`/`+++` header lines are rewritten along with the path;
    /// `/dev/null` sides (added or deleted files) are left alone.
    pub fn with_path(self, new_path: impl Into<String>) -> Self {
        let new_path = new_path.into();
        if new_path == self.path {
            return self;
        }

        let old_a = quote_path(&format!("a/{}", self.path));
        let old_b = quote_path(&format!("b/{}", self.path));
        let new_a = quote_path(&format!("a/{}", new_path));
        let new_b = quote_path(&format!("b/{}", new_path));

        let mut body = String::with_capacity(self.body.len());
        let mut in_header = true;
        for line in self.body.split_inclusive('\n') {
            if in_header && (line.starts_with("@@") || line.starts_with("GIT binary patch")) {
                in_header = false;
            }
            let (content, eol) = match line.strip_suffix('\n') {
                Some(content) => (content, "\n"),
                None => (line, ""),
            };
            if in_header && content == format!("--- {}", old_a) {
                body.push_str(&format!("--- {}{}", new_a, eol));
            } else if in_header && content == format!("+++ {}", old_b) {
                body.push_str(&format!("+++ {}{}", new_b, eol));
            } else {
                body.push_str(line);
            }
        }

        Self {
            path: new_path,
            body,
        }
    }

    fn render(&self, out: &mut String) {
        out.push_str(&format!(
            "diff --git {} {}\n",
            quote_path(&format!("a/{}", self.path)),
            quote_path(&format!("b/{}", self.path))
        ));
        out.push_str(&self.body);
        if !self.body.is_empty() && !self.body.ends_with('\n') {
            out.push('\n');
        }
    }
}

/// One unit of change: header plus per-file patch payload.
///
/// Equality and hashing use the revision id only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    header: CommitHeader,
    diffs: Vec<FileDiff>,
}

impl Commit {
    pub fn new(header: CommitHeader, diffs: Vec<FileDiff>) -> Self {
        Self { header, diffs }
    }

    pub fn id(&self) -> &str {
        &self.header.id
    }

    pub fn header(&self) -> &CommitHeader {
        &self.header
    }

    pub fn diffs(&self) -> &[FileDiff] {
        &self.diffs
    }

    pub fn is_merge(&self) -> bool {
        self.header.is_merge()
    }

    /// `true` while the commit still carries at least one file change.
    pub fn is_valid(&self) -> bool {
        !self.diffs.is_empty()
    }

    /// Replace the message.
    pub fn with_message(self, message: impl Into<String>) -> Self {
        Self {
            header: CommitHeader {
                message: message.into(),
                ..self.header
            },
            diffs: self.diffs,
        }
    }

    /// Replace the payload.
    pub fn with_diffs(self, diffs: Vec<FileDiff>) -> Self {
        Self {
            header: self.header,
            diffs,
        }
    }

    /// Map each file diff, dropping those for which `f` returns `None`.
    pub fn filter_map_diffs(self, f: impl FnMut(FileDiff) -> Option<FileDiff>) -> Self {
        let diffs = self.diffs.into_iter().filter_map(f).collect();
        Self {
            header: self.header,
            diffs,
        }
    }

    /// The file diffs as one `git apply` payload, in order.
    pub fn render_diff(&self) -> String {
        let mut out = String::new();
        for diff in &self.diffs {
            diff.render(&mut out);
        }
        out
    }

    /// The message as it should be recorded: unchanged, newline-terminated
    /// unless empty.
    pub fn commit_message(&self) -> String {
        let message = &self.header.message;
        if message.is_empty() || message.ends_with('\n') {
            message.clone()
        } else {
            format!("{}\n", message)
        }
    }
}

impl PartialEq for Commit {
    fn eq(&self, other: &Self) -> bool {
        self.header.id == other.header.id
    }
}

impl Eq for Commit {}

impl Hash for Commit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.header.id.hash(state);
    }
}

/// Quote a path the way git does when it contains special characters.
pub(crate) fn quote_path(path: &str) -> String {
    if !path
        .chars()
        .any(|c| matches!(c, '"' | '\\' | '\n' | '\t'))
    {
        return path.to_string();
    }
    let mut out = String::with_capacity(path.len() + 2);
    out.push('"');
    for c in path.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
