//! Import a mirror pull request into the canonical repository.

use tracing::info;

use super::replay::{apply_commits, ensure_clean, resolve_and_filter};
use super::{run_tracked, Phase, PhaseReport, PhaseState};
use crate::errors::SyncError;
use crate::git::{HistoryReader, HistoryWriter, Repository};
use crate::sync_config::ImportConfig;

/// Replays the commits of one pull request onto a fresh branch of the
/// writer repository.
pub struct ImportSyncPhase<R = Repository, W = Repository> {
    config: ImportConfig<R, W>,
    state: PhaseState,
}

impl<R, W> ImportSyncPhase<R, W>
where
    R: HistoryReader,
    W: HistoryWriter,
{
    pub fn new(config: ImportConfig<R, W>) -> Self {
        Self {
            config,
            state: PhaseState::Idle,
        }
    }

    /// State reached by the most recent run.
    pub fn state(&self) -> PhaseState {
        self.state
    }

    pub fn config(&self) -> &ImportConfig<R, W> {
        &self.config
    }

    fn execute(config: &ImportConfig<R, W>, report: &mut PhaseReport) -> Result<(), SyncError> {
        ensure_clean(&config.writer)?;

        config.reader.fetch_ref(&config.remote, &config.refspec())?;
        report.enter(PhaseState::Fetched);

        let head = config.reader.rev_parse("FETCH_HEAD")?;
        let base = config.reader.merge_base(&head, &config.base_branch)?;
        let slice = config.reader.ancestor_slice(&base, &head)?;
        report.enter(PhaseState::RangeResolved);

        let Some(slice) = slice else {
            info!(base = %base, head = %head, "nothing to import");
            report.enter(PhaseState::Done);
            return Ok(());
        };
        info!(count = slice.len(), base = %base, head = %head, "resolved commit range");

        let commits = resolve_and_filter(&config.reader, &slice, config.filter.as_ref(), report);

        let branch = config.branch_name();
        config
            .writer
            .checkout_branch(&branch, Some(config.target_branch.as_str()))?;
        report.branch = Some(branch);
        report.enter(PhaseState::BranchCreated);

        apply_commits(&config.writer, &commits, report)
    }
}

impl<R, W> Phase for ImportSyncPhase<R, W>
where
    R: HistoryReader,
    W: HistoryWriter,
{
    fn readable_name(&self) -> String {
        format!("Syncing changes from #{}", self.config.pull_request)
    }

    fn run(&mut self) -> Result<PhaseReport, SyncError> {
        let name = self.readable_name();
        let config = &self.config;
        run_tracked(name, &mut self.state, |report| Self::execute(config, report))
    }
}
