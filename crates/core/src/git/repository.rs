//! A git checkout driven through the `git` executable.
//!
//! [`Repository`] exposes two capability sets, [`HistoryReader`] and
//! [`HistoryWriter`], so one physical checkout can play either role
//! depending on the sync direction.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};

use tracing::{debug, info, instrument, warn};

use super::parser::{parse_diff, parse_log_header, LOG_HEADER_FORMAT};
use crate::commit::Commit;
use crate::errors::{ProcessError, RepoError};
use crate::process::ProcessRunner;

/// Read access to a repository's history.
pub trait HistoryReader {
    /// Fetch `refspec` from `remote` into `FETCH_HEAD`.
    fn fetch_ref(&self, remote: &str, refspec: &str) -> Result<(), RepoError>;

    /// Resolve a symbolic revision (`FETCH_HEAD`, a branch) to a commit id.
    fn rev_parse(&self, rev: &str) -> Result<String, RepoError>;

    /// Nearest common ancestor of `a` and `b`.
    fn merge_base(&self, a: &str, b: &str) -> Result<String, RepoError>;

    /// Revision ids from `base` (exclusive) to `head` (inclusive), oldest
    /// first. `None` when `head` does not descend from `base`.
    fn ancestor_slice(&self, base: &str, head: &str) -> Result<Option<Vec<String>>, RepoError>;

    /// Full commit for `id`, or `None` if it cannot be resolved here.
    fn resolve_commit(&self, id: &str) -> Option<Commit>;

    /// Source id named by `trailer` on the newest commit of `branch` that
    /// carries it.
    fn last_tracked_source_id(
        &self,
        branch: &str,
        trailer: &str,
    ) -> Result<Option<String>, RepoError>;
}

/// Write access to a repository's working checkout.
pub trait HistoryWriter {
    /// Human-readable location, used in error reports.
    fn location(&self) -> String;

    /// `true` when the working tree has no local modifications.
    fn is_clean(&self) -> Result<bool, RepoError>;

    /// Create `name` from `start_point` (or HEAD) and switch to it.
    fn checkout_branch(&self, name: &str, start_point: Option<&str>) -> Result<(), RepoError>;

    /// Replay `commit` on the current branch, returning the new commit id.
    fn apply_patch(&self, commit: &Commit) -> Result<String, RepoError>;

    /// Push local `branch` to `remote`.
    fn push_branch(&self, remote: &str, branch: &str) -> Result<(), RepoError>;
}

/// A git working checkout on disk.
#[derive(Debug, Clone)]
pub struct Repository {
    path: PathBuf,
    git: ProcessRunner,
}

impl Repository {
    /// Open an existing git work tree at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RepoError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening git repository");
        if !path.is_dir() {
            return Err(RepoError::RepositoryNotFound(path.display().to_string()));
        }

        let git = ProcessRunner::new(path, "git")
            .with_env("GIT_TERMINAL_PROMPT", "0")
            .with_env("LC_ALL", "C");
        let repo = Self {
            path: path.to_path_buf(),
            git,
        };

        match repo.git.run(&["rev-parse", "--is-inside-work-tree"]) {
            Ok(out) if out.stdout.trim() == "true" => Ok(repo),
            Ok(_) | Err(ProcessError::CommandFailed { .. }) => {
                Err(RepoError::RepositoryNotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn git(&self, args: &[&str]) -> Result<String, RepoError> {
        Ok(self.git.run(args)?.stdout)
    }

    fn branch_exists(&self, name: &str) -> Result<bool, RepoError> {
        let refname = format!("refs/heads/{}", name);
        let out = self
            .git
            .run_unchecked(&["rev-parse", "--verify", "--quiet", &refname])?;
        Ok(out.success())
    }

    fn read_commit(&self, id: &str) -> Result<Commit, RepoError> {
        let raw_header = self.git(&["--no-pager", "log", "-1", LOG_HEADER_FORMAT, id, "--"])?;
        let header = parse_log_header(&raw_header)?;
        let raw_diff = self.git(&[
            "-c",
            "core.quotepath=off",
            "diff-tree",
            "-p",
            "--binary",
            "--no-commit-id",
            "--no-color",
            "--no-renames",
            "--full-index",
            "--root",
            &header.id,
        ])?;
        let diffs = parse_diff(&raw_diff)?;
        Ok(Commit::new(header, diffs))
    }
}

impl HistoryReader for Repository {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn fetch_ref(&self, remote: &str, refspec: &str) -> Result<(), RepoError> {
        info!("fetching");
        self.git
            .run(&["fetch", "--no-tags", remote, refspec])
            .map_err(|e| RepoError::FetchFailed {
                remote: remote.to_string(),
                refspec: refspec.to_string(),
                detail: match &e {
                    ProcessError::CommandFailed { stderr, .. } => stderr.trim().to_string(),
                    other => other.to_string(),
                },
            })?;
        debug!("fetch completed");
        Ok(())
    }

    fn rev_parse(&self, rev: &str) -> Result<String, RepoError> {
        let spec = format!("{}^{{commit}}", rev);
        let out = self
            .git
            .run_unchecked(&["rev-parse", "--verify", "--quiet", &spec])?;
        if !out.success() {
            return Err(RepoError::RefNotFound(rev.to_string()));
        }
        Ok(out.stdout.trim().to_string())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn merge_base(&self, a: &str, b: &str) -> Result<String, RepoError> {
        let out = self.git.run_unchecked(&["merge-base", a, b])?;
        let base = out.stdout.trim().to_string();
        // merge-base exits 1 with no output when the histories are disjoint.
        if out.exit_code == 1 && base.is_empty() {
            return Err(RepoError::NoMergeBase {
                a: a.to_string(),
                b: b.to_string(),
            });
        }
        if !out.success() {
            return Err(ProcessError::CommandFailed {
                program: "git".into(),
                args: format!("merge-base {} {}", a, b),
                exit_code: out.exit_code,
                stdout: out.stdout,
                stderr: out.stderr,
            }
            .into());
        }
        debug!(base = %base, "merge base resolved");
        Ok(base)
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn ancestor_slice(&self, base: &str, head: &str) -> Result<Option<Vec<String>>, RepoError> {
        let range = format!("{}..{}", base, head);
        let out = self.git(&[
            "--no-pager",
            "log",
            "--reverse",
            "--topo-order",
            "--ancestry-path",
            "--no-min-parents",
            "--no-max-parents",
            "--format=%H",
            &range,
            "--",
        ])?;
        let revisions: Vec<String> = out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        debug!(count = revisions.len(), "computed ancestor slice");
        if revisions.is_empty() {
            Ok(None)
        } else {
            Ok(Some(revisions))
        }
    }

    fn resolve_commit(&self, id: &str) -> Option<Commit> {
        match self.read_commit(id) {
            Ok(commit) => Some(commit),
            Err(e) => {
                warn!(id, error = %e, "could not resolve revision");
                None
            }
        }
    }

    fn last_tracked_source_id(
        &self,
        branch: &str,
        trailer: &str,
    ) -> Result<Option<String>, RepoError> {
        let grep = format!("--grep=^{}: ", escape_regex(trailer));
        let out = self.git(&[
            "--no-pager",
            "log",
            "-1",
            "--format=%B",
            "--extended-regexp",
            &grep,
            branch,
            "--",
        ])?;
        Ok(find_trailer(&out, trailer))
    }
}

impl HistoryWriter for Repository {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn is_clean(&self) -> Result<bool, RepoError> {
        let out = self.git(&["status", "--porcelain"])?;
        Ok(out.trim().is_empty())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn checkout_branch(&self, name: &str, start_point: Option<&str>) -> Result<(), RepoError> {
        if self.branch_exists(name)? {
            return Err(RepoError::BranchExists(name.to_string()));
        }
        let mut args = vec!["checkout", "--quiet", "-b", name];
        if let Some(start) = start_point {
            args.push(start);
        }
        self.git(&args)?;
        info!(name, "created and checked out branch");
        Ok(())
    }

    #[instrument(skip(self, commit), fields(path = %self.path.display(), id = %commit.id()))]
    fn apply_patch(&self, commit: &Commit) -> Result<String, RepoError> {
        let failed = |e: ProcessError| {
            // Leave the branch at the last successfully applied commit.
            if let Err(reset) = self.git.run(&["reset", "--hard", "--quiet", "HEAD"]) {
                warn!(error = %reset, "git reset after failed apply failed");
            }
            RepoError::ApplyFailed {
                commit: commit.id().to_string(),
                detail: match &e {
                    ProcessError::CommandFailed { stdout, stderr, .. } => {
                        format!("{}{}", stdout, stderr).trim().to_string()
                    }
                    other => other.to_string(),
                },
            }
        };

        self.git
            .run_with_input(
                &["apply", "--index", "--whitespace=nowarn", "-"],
                &commit.render_diff(),
            )
            .map_err(&failed)?;

        let header = commit.header();
        let date = git_date(&header.timestamp);
        self.git
            .clone()
            .with_env("GIT_AUTHOR_NAME", header.author.name.as_str())
            .with_env("GIT_AUTHOR_EMAIL", header.author.email.as_str())
            .with_env("GIT_AUTHOR_DATE", date.as_str())
            .with_env("GIT_COMMITTER_DATE", date.as_str())
            .run_with_input(
                &[
                    "commit",
                    "--quiet",
                    "--no-verify",
                    "--no-gpg-sign",
                    "--allow-empty-message",
                    "--cleanup=verbatim",
                    "-F",
                    "-",
                ],
                &commit.commit_message(),
            )
            .map_err(&failed)?;

        let new_id = self.git(&["rev-parse", "HEAD"])?.trim().to_string();
        info!(new_id, subject = header.subject(), "applied commit");
        Ok(new_id)
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn push_branch(&self, remote: &str, branch: &str) -> Result<(), RepoError> {
        info!("pushing");
        let refspec = format!("refs/heads/{}:refs/heads/{}", branch, branch);
        self.git
            .run(&["push", remote, &refspec])
            .map_err(|e| RepoError::PushFailed {
                remote: remote.to_string(),
                branch: branch.to_string(),
                detail: e.stderr().trim().to_string(),
            })?;
        info!("push completed");
        Ok(())
    }
}

/// Raw `@<epoch> <offset>` form, which git reads without reinterpreting.
fn git_date(timestamp: &DateTime<FixedOffset>) -> String {
    format!("@{} {}", timestamp.timestamp(), timestamp.format("%z"))
}

/// Escape extended-regex metacharacters so `text` matches literally.
fn escape_regex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if "\\.^$*+?()[]{}|".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Value of the last `<trailer>: <value>` line in `message`.
fn find_trailer(message: &str, trailer: &str) -> Option<String> {
    let prefix = format!("{}:", trailer);
    message
        .lines()
        .rev()
        .filter_map(|line| line.trim().strip_prefix(&prefix))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}
