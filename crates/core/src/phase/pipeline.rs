//! Sequential execution of sync phases.

use tracing::info;

use super::{Phase, PhaseReport};
use crate::errors::SyncError;

/// An ordered list of phases run one after another.
///
/// The first failure stops the pipeline and is returned as is; cleanup of a
/// partially written branch is left to the caller.
#[derive(Default)]
pub struct Pipeline<'a> {
    phases: Vec<Box<dyn Phase + 'a>>,
}

impl<'a> Pipeline<'a> {
    pub fn new() -> Self {
        Self { phases: Vec::new() }
    }

    pub fn with_phase(mut self, phase: impl Phase + 'a) -> Self {
        self.phases.push(Box::new(phase));
        self
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Run every phase in order, returning the reports of those that ran.
    pub fn run(&mut self) -> Result<Vec<PhaseReport>, SyncError> {
        let total = self.phases.len();
        let mut reports = Vec::with_capacity(total);

        for (index, phase) in self.phases.iter_mut().enumerate() {
            let name = phase.readable_name();
            if !phase.should_run(&reports) {
                info!(step = index + 1, total, phase = %name, "skipping phase");
                continue;
            }
            info!(step = index + 1, total, phase = %name, "starting phase");
            let report = phase.run()?;
            info!(
                phase = %name,
                applied = report.applied.len(),
                skipped = report.skipped_empty.len() + report.skipped_unresolved.len(),
                "phase finished"
            );
            reports.push(report);
        }

        Ok(reports)
    }
}
