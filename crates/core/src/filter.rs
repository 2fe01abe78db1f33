//! Commit filters applied when a commit crosses the repository boundary.
//!
//! A filter is a total, pure `Commit -> Commit` transformation. Filters see
//! one commit at a time and must not depend on the order in which commits
//! are processed.
//!
//! | Filter | Effect |
//! |--------|--------|
//! | [`identity`] | Passes commits through unchanged |
//! | [`StripPaths`] | Drops file diffs whose path matches a glob |
//! | [`StripExceptDirectories`] | Keeps only file diffs under given prefixes |
//! | [`MoveDirectories`] | Remaps path prefixes (longest prefix wins) |
//! | [`RedactMessage`] | Regex replacement over the commit message |
//! | [`TrackingTrailer`] | Appends `<trailer>: <source id>` to the message |
//!
//! [`FilterChain`] composes them in order.

use glob_match::glob_match;
use regex_lite::Regex;
use tracing::debug;

use crate::commit::Commit;

/// A caller-supplied commit transformation.
pub trait CommitFilter {
    fn apply(&self, commit: Commit) -> Commit;
}

impl<F> CommitFilter for F
where
    F: Fn(Commit) -> Commit,
{
    fn apply(&self, commit: Commit) -> Commit {
        self(commit)
    }
}

/// The filter that changes nothing.
pub fn identity() -> impl CommitFilter {
    |commit: Commit| commit
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Ordered composition of filters.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn CommitFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `filter`; it runs after every filter already in the chain.
    pub fn then(mut self, filter: impl CommitFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl CommitFilter for FilterChain {
    fn apply(&self, commit: Commit) -> Commit {
        self.filters.iter().fold(commit, |c, f| f.apply(c))
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.filters.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Path filters
// ---------------------------------------------------------------------------

/// Removes file diffs whose path matches any of the glob patterns.
#[derive(Debug, Clone)]
pub struct StripPaths {
    patterns: Vec<String>,
}

impl StripPaths {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }

    fn is_stripped(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| glob_match(p, path))
    }
}

impl CommitFilter for StripPaths {
    fn apply(&self, commit: Commit) -> Commit {
        let id = commit.id().to_string();
        commit.filter_map_diffs(|diff| {
            if self.is_stripped(&diff.path) {
                debug!(commit = %id, path = %diff.path, "stripped path");
                None
            } else {
                Some(diff)
            }
        })
    }
}

/// Keeps only file diffs under one of the given directory prefixes. An
/// empty prefix list keeps everything.
#[derive(Debug, Clone)]
pub struct StripExceptDirectories {
    prefixes: Vec<String>,
}

impl StripExceptDirectories {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }
}

impl CommitFilter for StripExceptDirectories {
    fn apply(&self, commit: Commit) -> Commit {
        if self.prefixes.is_empty() {
            return commit;
        }
        commit.filter_map_diffs(|diff| {
            self.prefixes
                .iter()
                .any(|p| diff.path.starts_with(p.as_str()))
                .then_some(diff)
        })
    }
}

/// Rewrites path prefixes. The longest matching source prefix wins; paths
/// matching no prefix are left as they are.
#[derive(Debug, Clone)]
pub struct MoveDirectories {
    mappings: Vec<(String, String)>,
}

impl MoveDirectories {
    pub fn new<I, S, D>(mappings: I) -> Self
    where
        I: IntoIterator<Item = (S, D)>,
        S: Into<String>,
        D: Into<String>,
    {
        let mut mappings: Vec<(String, String)> = mappings
            .into_iter()
            .map(|(s, d)| (s.into(), d.into()))
            .collect();
        mappings.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { mappings }
    }

    /// The mapping for the opposite direction.
    pub fn reversed(&self) -> Self {
        Self::new(self.mappings.iter().map(|(s, d)| (d.clone(), s.clone())))
    }

    pub fn map_path(&self, path: &str) -> String {
        for (from, to) in &self.mappings {
            if let Some(rest) = path.strip_prefix(from.as_str()) {
                return format!("{}{}", to, rest);
            }
        }
        path.to_string()
    }
}

impl CommitFilter for MoveDirectories {
    fn apply(&self, commit: Commit) -> Commit {
        commit.filter_map_diffs(|diff| {
            let new_path = self.map_path(&diff.path);
            Some(diff.with_path(new_path))
        })
    }
}

// ---------------------------------------------------------------------------
// Message filters
// ---------------------------------------------------------------------------

/// Applies regex replacements to the commit message.
#[derive(Debug, Clone)]
pub struct RedactMessage {
    rules: Vec<(Regex, String)>,
}

impl RedactMessage {
    /// Compile `(pattern, replacement)` pairs. Replacements may use `$1`
    /// style group references.
    pub fn new<'a, I>(rules: I) -> Result<Self, regex_lite::Error>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let rules = rules
            .into_iter()
            .map(|(pattern, replacement)| Ok((Regex::new(pattern)?, replacement.to_string())))
            .collect::<Result<Vec<_>, regex_lite::Error>>()?;
        Ok(Self { rules })
    }
}

impl CommitFilter for RedactMessage {
    fn apply(&self, commit: Commit) -> Commit {
        let original = commit.header().message.clone();
        let mut message = original.clone();
        for (regex, replacement) in &self.rules {
            message = regex.replace_all(&message, replacement.as_str()).into_owned();
        }
        if message == original {
            return commit;
        }
        let message = message.trim_end().to_string();
        commit.with_message(message)
    }
}

/// Appends `<trailer>: <original commit id>` so the other side can tell
/// which source commit it last received.
#[derive(Debug, Clone)]
pub struct TrackingTrailer {
    trailer: String,
}

impl TrackingTrailer {
    pub fn new(trailer: impl Into<String>) -> Self {
        Self {
            trailer: trailer.into(),
        }
    }
}

impl CommitFilter for TrackingTrailer {
    fn apply(&self, commit: Commit) -> Commit {
        let prefix = format!("{}:", self.trailer);
        let message = &commit.header().message;
        if message.lines().any(|l| l.trim_start().starts_with(&prefix)) {
            return commit;
        }
        let body = message.trim_end();
        let separator = if ends_in_trailer_block(body) { "\n" } else { "\n\n" };
        let message = format!("{}{}{} {}", body, separator, prefix, commit.id());
        commit.with_message(message)
    }
}

/// Whether the last paragraph of `message` is a `Key: value` trailer
/// block. The subject paragraph never counts.
fn ends_in_trailer_block(message: &str) -> bool {
    let Some((_, last)) = message.rsplit_once("\n\n") else {
        return false;
    };
    let mut lines = last.lines().filter(|l| !l.trim().is_empty()).peekable();
    lines.peek().is_some() && lines.all(is_trailer_line)
}

fn is_trailer_line(line: &str) -> bool {
    match line.split_once(": ") {
        Some((key, _)) => {
            !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::tests::{header, text_diff};

    fn commit(paths: &[&str], message: &str) -> Commit {
        Commit::new(
            header("c1", &["p"], message),
            paths.iter().map(|p| text_diff(p)).collect(),
        )
    }

    fn paths(c: &Commit) -> Vec<&str> {
        c.diffs().iter().map(|d| d.path.as_str()).collect()
    }

    #[test]
    fn test_identity_and_closure_filters() {
        let c = commit(&["a.txt"], "msg");
        let out = identity().apply(c.clone());
        assert_eq!(out.header(), c.header());
        assert_eq!(out.diffs(), c.diffs());

        let upper = |c: Commit| {
            let m = c.header().message.to_uppercase();
            c.with_message(m)
        };
        assert_eq!(upper.apply(c).header().message, "MSG");
    }

    #[test]
    fn test_strip_paths() {
        let filter = StripPaths::new(vec!["**/internal/**".into(), "*.secret".into()]);
        let out = filter.apply(commit(
            &["src/internal/x.rs", "src/lib.rs", "keys.secret"],
            "msg",
        ));
        assert_eq!(paths(&out), vec!["src/lib.rs"]);
    }

    #[test]
    fn test_strip_everything_invalidates_commit() {
        let filter = StripPaths::new(vec!["**".into()]);
        let out = filter.apply(commit(&["a", "b/c"], "msg"));
        assert!(!out.is_valid());
    }

    #[test]
    fn test_strip_except_directories() {
        let filter = StripExceptDirectories::new(vec!["libs/widget/".into()]);
        let out = filter.apply(commit(&["libs/widget/a.ts", "libs/other/b.ts", "README.md"], "m"));
        assert_eq!(paths(&out), vec!["libs/widget/a.ts"]);

        let keep_all = StripExceptDirectories::new(Vec::new());
        assert_eq!(paths(&keep_all.apply(commit(&["x", "y"], "m"))), vec!["x", "y"]);
    }

    #[test]
    fn test_move_directories_longest_prefix_wins() {
        let filter = MoveDirectories::new([
            ("libs/", "packages/"),
            ("libs/widget/", ""),
        ]);
        assert_eq!(filter.map_path("libs/widget/src/a.ts"), "src/a.ts");
        assert_eq!(filter.map_path("libs/other/b.ts"), "packages/other/b.ts");
        assert_eq!(filter.map_path("README.md"), "README.md");

        let out = filter.apply(commit(&["libs/widget/index.ts"], "msg"));
        assert_eq!(paths(&out), vec!["index.ts"]);
        assert!(out.diffs()[0].body.contains("+++ b/index.ts"));
    }

    #[test]
    fn test_move_directories_reversed() {
        let filter = MoveDirectories::new([("libs/widget/", "")]).reversed();
        assert_eq!(filter.map_path("src/a.ts"), "libs/widget/src/a.ts");
    }

    #[test]
    fn test_redact_message() {
        let filter = RedactMessage::new([(r"(?m)^Internal-Ticket: \S+$", "")]).unwrap();
        let out = filter.apply(commit(&["a"], "Fix crash\n\nInternal-Ticket: OPS-42\n"));
        assert_eq!(out.header().message, "Fix crash");
        assert!(RedactMessage::new([("(unclosed", "")]).is_err());
    }

    #[test]
    fn test_tracking_trailer_is_idempotent() {
        let filter = TrackingTrailer::new("shipsync-source-id");
        let once = filter.apply(commit(&["a"], "Add thing\n"));
        assert_eq!(once.header().message, "Add thing\n\nshipsync-source-id: c1");
        let twice = filter.apply(once.clone());
        assert_eq!(twice.header().message, once.header().message);
    }

    #[test]
    fn test_tracking_trailer_joins_existing_trailer_block() {
        let filter = TrackingTrailer::new("shipsync-source-id");
        let out = filter.apply(commit(
            &["a"],
            "Add thing\n\nLonger text.\n\nSigned-off-by: Ada <ada@example.com>\n",
        ));
        assert_eq!(
            out.header().message,
            "Add thing\n\nLonger text.\n\nSigned-off-by: Ada <ada@example.com>\nshipsync-source-id: c1"
        );

        // A subject that looks like a trailer still gets its own paragraph.
        let out = filter.apply(commit(&["a"], "Fix: crash on start"));
        assert_eq!(
            out.header().message,
            "Fix: crash on start\n\nshipsync-source-id: c1"
        );

        // Prose in the last paragraph is not a trailer block.
        let out = filter.apply(commit(&["a"], "Add thing\n\nSee: the docs, then more prose\nand a second line."));
        assert!(out.header().message.ends_with("second line.\n\nshipsync-source-id: c1"));
    }

    #[test]
    fn test_chain_runs_in_order() {
        let chain = FilterChain::new()
            .then(StripPaths::new(vec!["private/**".into()]))
            .then(MoveDirectories::new([("public/", "")]))
            .then(TrackingTrailer::new("src-id"));
        assert_eq!(chain.len(), 3);
        let out = chain.apply(commit(&["private/a", "public/b"], "msg"));
        assert_eq!(paths(&out), vec!["b"]);
        assert!(out.header().message.ends_with("src-id: c1"));
    }
}
