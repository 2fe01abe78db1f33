//! Resolve, filter, and replay a commit range. Shared by both directions.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use super::{AppliedCommit, PhaseReport, PhaseState};
use crate::commit::Commit;
use crate::errors::SyncError;
use crate::filter::CommitFilter;
use crate::git::{HistoryReader, HistoryWriter};

/// Fail unless the writer's working tree is clean.
pub(crate) fn ensure_clean<W: HistoryWriter>(writer: &W) -> Result<(), SyncError> {
    if !writer.is_clean()? {
        return Err(SyncError::DirtyWorkingTree(writer.location()));
    }
    Ok(())
}

/// Resolve every revision in `slice`, drop duplicates while keeping slice
/// order, then filter each commit.
///
/// Unresolvable revisions are skipped and recorded in the report.
pub(crate) fn resolve_and_filter<R: HistoryReader>(
    reader: &R,
    slice: &[String],
    filter: &dyn CommitFilter,
    report: &mut PhaseReport,
) -> Vec<Commit> {
    let mut seen = HashSet::new();
    let mut commits = Vec::with_capacity(slice.len());

    for revision in slice {
        if !seen.insert(revision.clone()) {
            debug!(revision = %revision, "duplicate revision in range");
            continue;
        }
        let Some(commit) = reader.resolve_commit(revision) else {
            warn!(revision = %revision, "skipping unresolvable revision");
            report.skipped_unresolved.push(revision.clone());
            continue;
        };
        // Abbreviated or symbolic revisions can name an id seen earlier.
        if commit.id() != revision.as_str() && !seen.insert(commit.id().to_string()) {
            debug!(revision = %revision, id = commit.id(), "duplicate commit in range");
            continue;
        }
        commits.push(commit);
    }

    let commits: Vec<Commit> = commits.into_iter().map(|c| filter.apply(c)).collect();
    report.enter(PhaseState::Filtered);
    commits
}

/// Apply `commits` in order onto the writer's current branch.
///
/// A merge commit aborts before anything later is applied. Commits left
/// empty by filtering are skipped. Nothing already applied is rolled back.
pub(crate) fn apply_commits<W: HistoryWriter>(
    writer: &W,
    commits: &[Commit],
    report: &mut PhaseReport,
) -> Result<(), SyncError> {
    report.enter(PhaseState::Applying);

    for commit in commits {
        if commit.is_merge() {
            return Err(SyncError::NonLinearHistory {
                commit: commit.id().to_string(),
                applied: report.applied.clone(),
            });
        }
        if !commit.is_valid() {
            info!(id = commit.id(), "skipping commit with no content after filtering");
            report.skipped_empty.push(commit.id().to_string());
            continue;
        }
        match writer.apply_patch(commit) {
            Ok(new_id) => report.applied.push(AppliedCommit {
                source_id: commit.id().to_string(),
                new_id,
                subject: commit.header().subject().to_string(),
            }),
            Err(source) => {
                return Err(SyncError::ApplyFailed {
                    commit: commit.id().to_string(),
                    applied: report.applied.clone(),
                    source,
                })
            }
        }
    }

    report.enter(PhaseState::Done);
    Ok(())
}
