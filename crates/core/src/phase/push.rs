//! Publish a branch produced by an earlier phase.

use super::{run_tracked, Phase, PhaseReport, PhaseState};
use crate::errors::SyncError;
use crate::git::{HistoryWriter, Repository};

/// Pushes `branch` from the writer checkout to `remote`.
///
/// Only runs when an earlier phase in the pipeline created that branch and
/// applied at least one commit to it.
pub struct PushPhase<W = Repository> {
    writer: W,
    remote: String,
    branch: String,
    state: PhaseState,
}

impl<W: HistoryWriter> PushPhase<W> {
    pub fn new(writer: W, remote: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            writer,
            remote: remote.into(),
            branch: branch.into(),
            state: PhaseState::Idle,
        }
    }

    pub fn state(&self) -> PhaseState {
        self.state
    }
}

impl<W: HistoryWriter> Phase for PushPhase<W> {
    fn readable_name(&self) -> String {
        format!("Pushing {} to {}", self.branch, self.remote)
    }

    fn should_run(&self, previous: &[PhaseReport]) -> bool {
        previous
            .iter()
            .any(|r| r.branch.as_deref() == Some(self.branch.as_str()) && !r.applied.is_empty())
    }

    fn run(&mut self) -> Result<PhaseReport, SyncError> {
        let name = self.readable_name();
        let Self {
            writer,
            remote,
            branch,
            state,
        } = self;
        run_tracked(name, state, |report| {
            writer.push_branch(remote, branch)?;
            report.branch = Some(branch.clone());
            report.enter(PhaseState::Done);
            Ok(())
        })
    }
}
