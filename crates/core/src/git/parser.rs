//! Parsers for `git log` headers and `git diff-tree` patch output.

use chrono::DateTime;

use crate::commit::{Author, CommitHeader, FileDiff};
use crate::errors::RepoError;

/// `--format` string consumed by [`parse_log_header`]. Fields are
/// NUL-separated so that any message text survives intact.
pub const LOG_HEADER_FORMAT: &str = "--format=%H%x00%P%x00%an%x00%ae%x00%aI%x00%B";

/// Parse the output of `git log -1` run with [`LOG_HEADER_FORMAT`].
pub fn parse_log_header(output: &str) -> Result<CommitHeader, RepoError> {
    let mut fields = output.splitn(6, '\0');
    let mut next = |name: &str| {
        fields
            .next()
            .ok_or_else(|| RepoError::ParseError(format!("commit header is missing '{}'", name)))
    };

    let id = next("hash")?.trim().to_string();
    let parents = next("parents")?
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let name = next("author name")?.to_string();
    let email = next("author email")?.to_string();
    let date = next("author date")?;
    let message = next("message")?.trim_end_matches('\n').to_string();

    if id.is_empty() {
        return Err(RepoError::ParseError("commit header has an empty hash".into()));
    }
    let timestamp = DateTime::parse_from_rfc3339(date.trim())
        .map_err(|e| RepoError::ParseError(format!("bad author date '{}': {}", date, e)))?;

    Ok(CommitHeader {
        id,
        parents,
        author: Author { name, email },
        timestamp,
        message,
    })
}

/// Split a multi-file `diff --git` patch into per-file diffs.
///
/// Text before the first `diff --git` line is ignored.
pub fn parse_diff(output: &str) -> Result<Vec<FileDiff>, RepoError> {
    let mut diffs = Vec::new();
    let mut current: Option<(String, String)> = None;

    for line in output.split_inclusive('\n') {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            if let Some((path, body)) = current.take() {
                diffs.push(FileDiff::new(path, body));
            }
            let path = parse_diff_git_paths(rest.trim_end_matches('\n'))?;
            current = Some((path, String::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push_str(line);
        }
    }
    if let Some((path, body)) = current {
        diffs.push(FileDiff::new(path, body));
    }
    Ok(diffs)
}

/// Extract the destination path from `a/<path> b/<path>`.
///
/// Diffs are produced with renames disabled, so both sides name the same
/// file and an unquoted line splits exactly in half.
fn parse_diff_git_paths(rest: &str) -> Result<String, RepoError> {
    let bad = || RepoError::ParseError(format!("unrecognized diff header: diff --git {}", rest));

    if rest.starts_with('"') || rest.ends_with('"') {
        let (_, b_side) = split_quoted_pair(rest).ok_or_else(bad)?;
        return b_side.strip_prefix("b/").map(str::to_string).ok_or_else(bad);
    }

    // "a/" + p + " b/" + p
    if rest.len() < 5 || (rest.len() - 5) % 2 != 0 {
        return Err(bad());
    }
    let len = (rest.len() - 5) / 2;
    let a_side = rest.get(2..2 + len).ok_or_else(bad)?;
    let b_side = rest.get(2 + len + 3..).ok_or_else(bad)?;
    if !rest.starts_with("a/") || a_side != b_side {
        return Err(bad());
    }
    Ok(b_side.to_string())
}

/// Split `"a/x" "b/x"` (either side optionally quoted) into unquoted halves.
fn split_quoted_pair(rest: &str) -> Option<(String, String)> {
    let (first, remainder) = take_token(rest)?;
    let (second, tail) = take_token(remainder.strip_prefix(' ')?)?;
    if !tail.is_empty() {
        return None;
    }
    Some((first, second))
}

fn take_token(input: &str) -> Option<(String, &str)> {
    if let Some(quoted) = input.strip_prefix('"') {
        let mut out = String::new();
        let mut chars = quoted.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => return Some((out, &quoted[i + 1..])),
                '\\' => {
                    let (_, escaped) = chars.next()?;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                }
                other => out.push(other),
            }
        }
        None
    } else {
        // Unquoted token next to a quoted one: runs up to " \"" or the end.
        match input.find(" \"") {
            Some(idx) => Some((input[..idx].to_string(), &input[idx..])),
            None => Some((input.to_string(), "")),
        }
    }
}
