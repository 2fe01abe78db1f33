//! Export canonical commits made since the last sync to the mirror.

use tracing::info;

use super::replay::{apply_commits, ensure_clean, resolve_and_filter};
use super::{run_tracked, Phase, PhaseReport, PhaseState};
use crate::errors::SyncError;
use crate::git::{HistoryReader, HistoryWriter, Repository};
use crate::sync_config::ExportConfig;

/// Replays source commits newer than the last tracked one onto a fresh
/// branch of the mirror.
///
/// The baseline comes from the tracking trailer on the mirror's target
/// branch; the egress filter is expected to add that trailer to every
/// exported commit.
pub struct ExportSyncPhase<R = Repository, W = Repository> {
    config: ExportConfig<R, W>,
    state: PhaseState,
}

impl<R, W> ExportSyncPhase<R, W>
where
    R: HistoryReader,
    W: HistoryReader + HistoryWriter,
{
    pub fn new(config: ExportConfig<R, W>) -> Self {
        Self {
            config,
            state: PhaseState::Idle,
        }
    }

    pub fn state(&self) -> PhaseState {
        self.state
    }

    pub fn config(&self) -> &ExportConfig<R, W> {
        &self.config
    }

    fn execute(config: &ExportConfig<R, W>, report: &mut PhaseReport) -> Result<(), SyncError> {
        ensure_clean(&config.writer)?;

        let baseline = config
            .writer
            .last_tracked_source_id(&config.target_branch, &config.tracking_trailer)?
            .ok_or_else(|| SyncError::NoSyncBaseline {
                branch: config.target_branch.clone(),
                trailer: config.tracking_trailer.clone(),
            })?;
        let head = config.reader.rev_parse(&config.source_branch)?;
        report.enter(PhaseState::Fetched);

        let slice = config.reader.ancestor_slice(&baseline, &head)?;
        report.enter(PhaseState::RangeResolved);

        let Some(slice) = slice else {
            info!(baseline = %baseline, head = %head, "mirror is up to date");
            report.enter(PhaseState::Done);
            return Ok(());
        };
        info!(count = slice.len(), baseline = %baseline, head = %head, "resolved commit range");

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

impl<R, W> Phase for ExportSyncPhase<R, W>
where
    R: HistoryReader,
    W: HistoryReader + HistoryWriter,
{
    fn readable_name(&self) -> String {
        format!("Exporting changes from {}", self.config.source_branch)
    }

    fn run(&mut self) -> Result<PhaseReport, SyncError> {
        let name = self.readable_name();
        let config = &self.config;
        run_tracked(name, &mut self.state, |report| Self::execute(config, report))
    }
}
