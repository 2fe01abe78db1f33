//! ShipSync core library.
//!
//! This crate keeps a canonical repository and a public mirror in step by
//! replaying linear commit ranges between them: process execution, the
//! commit model, repository access, commit filters, and the sync phases
//! that tie them together.

pub mod commit;
pub mod config;
pub mod errors;
pub mod filter;
pub mod git;
pub mod phase;
pub mod process;
pub mod sync_config;

// Re-exports for convenience.
pub use commit::{Author, Commit, CommitHeader, FileDiff};
pub use config::AppConfig;
pub use errors::{ConfigError, CoreError, ProcessError, RepoError, SyncError};
pub use filter::{CommitFilter, FilterChain};
pub use git::{HistoryReader, HistoryWriter, Repository};
pub use phase::{ExportSyncPhase, ImportSyncPhase, Phase, PhaseReport, PhaseState, Pipeline, PushPhase};
pub use process::ProcessRunner;
pub use sync_config::{ExportConfig, ImportConfig};
