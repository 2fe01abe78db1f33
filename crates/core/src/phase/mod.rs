//! Sync phases and the pipeline that sequences them.
//!
//! Every sync phase walks the same state machine:
//!
//! ```text
//! Idle -> Fetched -> RangeResolved -> Filtered -> BranchCreated -> Applying -> Done
//!            \____________\_______________\____________\______________\----> Failed
//! ```
//!
//! Phases run synchronously and strictly one after another. A phase that
//! fails leaves the writer branch as far along as it got; cleanup is the
//! caller's decision.

mod export;
mod import;
mod pipeline;
mod push;
mod replay;

#[cfg(test)]
pub(crate) mod fakes;

pub use export::ExportSyncPhase;
pub use import::ImportSyncPhase;
pub use pipeline::Pipeline;
pub use push::PushPhase;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::errors::SyncError;

/// One step of a sync pipeline.
pub trait Phase {
    /// Name shown in logs and reports.
    fn readable_name(&self) -> String;

    /// Whether the phase has work to do given the reports of the phases
    /// that ran before it.
    fn should_run(&self, _previous: &[PhaseReport]) -> bool {
        true
    }

    /// Run the phase to completion or to its first fatal error.
    fn run(&mut self) -> Result<PhaseReport, SyncError>;
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// States of a sync phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    Idle,
    Fetched,
    RangeResolved,
    Filtered,
    BranchCreated,
    Applying,
    Done,
    Failed,
}

impl std::fmt::Display for PhaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Fetched => write!(f, "fetched"),
            Self::RangeResolved => write!(f, "range_resolved"),
            Self::Filtered => write!(f, "filtered"),
            Self::BranchCreated => write!(f, "branch_created"),
            Self::Applying => write!(f, "applying"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// A commit written to the writer branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCommit {
    /// Id of the commit in the reader repository.
    pub source_id: String,
    /// Id of the replayed commit in the writer repository.
    pub new_id: String,
    pub subject: String,
}

/// Outcome of a single phase run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseReport {
    pub phase: String,
    pub state: PhaseState,
    /// Branch created on the writer, if the phase got that far.
    pub branch: Option<String>,
    pub applied: Vec<AppliedCommit>,
    /// Commits left with no content after filtering.
    pub skipped_empty: Vec<String>,
    /// Revisions in the range that could not be resolved to a commit.
    pub skipped_unresolved: Vec<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

impl PhaseReport {
    pub(crate) fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            state: PhaseState::Idle,
            branch: None,
            applied: Vec::new(),
            skipped_empty: Vec::new(),
            skipped_unresolved: Vec::new(),
            started_at: Utc::now().to_rfc3339(),
            completed_at: None,
        }
    }

    /// Move to `state`, logging the transition.
    pub(crate) fn enter(&mut self, state: PhaseState) {
        info!(phase = %self.phase, from = %self.state, to = %state, "phase transition");
        self.state = state;
    }

    pub(crate) fn finish(&mut self) {
        self.completed_at = Some(Utc::now().to_rfc3339());
    }
}

/// Run `body` against a fresh report, stamping completion and the final
/// state whichever way it ends.
pub(crate) fn run_tracked<F>(
    name: String,
    last_state: &mut PhaseState,
    body: F,
) -> Result<PhaseReport, SyncError>
where
    F: FnOnce(&mut PhaseReport) -> Result<(), SyncError>,
{
    let mut report = PhaseReport::new(name);
    let result = body(&mut report);
    if let Err(ref e) = result {
        error!(phase = %report.phase, state = %report.state, error = %e, "phase failed");
        report.enter(PhaseState::Failed);
    }
    report.finish();
    *last_state = report.state;
    result.map(|()| report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(PhaseState::RangeResolved.to_string(), "range_resolved");
        assert_eq!(PhaseState::Failed.to_string(), "failed");
    }

    #[test]
    fn test_run_tracked_marks_failure() {
        let mut last = PhaseState::Idle;
        let result = run_tracked("demo".into(), &mut last, |report| {
            report.enter(PhaseState::Fetched);
            Err(SyncError::DirtyWorkingTree("/tmp/x".into()))
        });
        assert!(result.is_err());
        assert_eq!(last, PhaseState::Failed);

        let report = run_tracked("demo".into(), &mut last, |report| {
            report.enter(PhaseState::Done);
            Ok(())
        })
        .unwrap();
        assert_eq!(report.state, PhaseState::Done);
        assert!(report.completed_at.is_some());
        assert_eq!(last, PhaseState::Done);
    }

    #[test]
    fn test_report_serializes() {
        let mut report = PhaseReport::new("Syncing changes from #3");
        report.applied.push(AppliedCommit {
            source_id: "a".into(),
            new_id: "b".into(),
            subject: "Fix".into(),
        });
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["state"], "idle");
        assert_eq!(json["applied"][0]["new_id"], "b");
    }
}
