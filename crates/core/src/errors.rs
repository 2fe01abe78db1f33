//! Error types for the ShipSync core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

use crate::phase::AppliedCommit;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Process errors
// ---------------------------------------------------------------------------

/// Errors from running an external executable.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The executable was not found on `$PATH`.
    #[error("executable not found: {0}")]
    BinaryNotFound(String),

    /// The process exited with a non-zero status.
    #[error("`{program} {args}` failed (exit {exit_code}): {stderr}")]
    CommandFailed {
        program: String,
        args: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    /// Generic I/O wrapper (spawn, pipe, wait).
    #[error("process I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ProcessError {
    /// Captured stderr for failed commands, empty otherwise.
    pub fn stderr(&self) -> &str {
        match self {
            Self::CommandFailed { stderr, .. } => stderr,
            _ => "",
        }
    }
}

// ---------------------------------------------------------------------------
// Repository errors
// ---------------------------------------------------------------------------

/// Errors from repository (history reader / writer) operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The path does not exist or is not a git work tree.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// Underlying process failure.
    #[error("git command error: {0}")]
    Process(#[from] ProcessError),

    /// The remote could not be reached or the ref does not exist.
    #[error("failed to fetch '{refspec}' from remote '{remote}': {detail}")]
    FetchFailed {
        remote: String,
        refspec: String,
        detail: String,
    },

    /// The two revisions share no history.
    #[error("no common ancestor between '{a}' and '{b}'")]
    NoMergeBase { a: String, b: String },

    /// A revision could not be resolved to an object id.
    #[error("git ref not found: {0}")]
    RefNotFound(String),

    /// A branch with the generated name already exists.
    #[error("branch '{0}' already exists; delete or rename it before re-running")]
    BranchExists(String),

    /// The commit's patch did not apply cleanly.
    #[error("failed to apply patch for commit {commit}: {detail}")]
    ApplyFailed { commit: String, detail: String },

    /// Push was rejected or the remote was unreachable.
    #[error("failed to push branch '{branch}' to '{remote}': {detail}")]
    PushFailed {
        remote: String,
        branch: String,
        detail: String,
    },

    /// Output from git could not be interpreted.
    #[error("unexpected git output: {0}")]
    ParseError(String),
}

// ---------------------------------------------------------------------------
// Sync errors
// ---------------------------------------------------------------------------

/// Errors from running a sync phase.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Environment failure (fetch, merge-base, branch creation, ...).
    #[error("sync environment error: {0}")]
    Repo(#[from] RepoError),

    /// The writer checkout has local modifications.
    #[error("working tree at '{0}' has uncommitted changes")]
    DirtyWorkingTree(String),

    /// No previously synced commit could be located on the writer side.
    #[error("no commit on '{branch}' carries the '{trailer}' trailer; seed the destination first")]
    NoSyncBaseline { branch: String, trailer: String },

    /// A merge commit was found in the change set.
    #[error(
        "merge commit {commit} found in change set; a linear history is required \
         ({} commit(s) applied before it)",
        applied.len()
    )]
    NonLinearHistory {
        commit: String,
        applied: Vec<AppliedCommit>,
    },

    /// A commit's patch failed to apply; earlier commits stay applied.
    #[error("{source} ({} commit(s) applied before it)", applied.len())]
    ApplyFailed {
        commit: String,
        applied: Vec<AppliedCommit>,
        #[source]
        source: RepoError,
    },
}

impl SyncError {
    /// Commits written to the writer branch before the failure.
    pub fn applied(&self) -> &[AppliedCommit] {
        match self {
            Self::NonLinearHistory { applied, .. } | Self::ApplyFailed { applied, .. } => applied,
            _ => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
