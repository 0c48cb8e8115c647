// Build Units
//
// The planner's cursor as an iterator, and the mapping from host exit
// statuses to the outcomes published as events.

use ts::{CancellationToken, ExitStatus, InvalidatedProject, SolutionBuilder};

use crate::error::{BuildError, Result};
use crate::events::OutputsSkippedReason;

/// One item of the unit stream.
#[derive(Debug)]
pub enum UnitStep {
    Unit(InvalidatedProject),
    /// Cancellation was observed; no units follow.
    Cancelled,
}

/// Units in planner order. Ends after `Cancelled` or the first error.
pub struct BuildUnits<'a> {
    planner: &'a mut SolutionBuilder,
    cancellation: Option<&'a CancellationToken>,
    finished: bool,
}

impl<'a> BuildUnits<'a> {
    pub fn new(planner: &'a mut SolutionBuilder, cancellation: Option<&'a CancellationToken>) -> Self {
        Self {
            planner,
            cancellation,
            finished: false,
        }
    }
}

impl Iterator for BuildUnits<'_> {
    type Item = Result<UnitStep>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.planner.get_next_invalidated_project(self.cancellation) {
            Ok(Some(project)) => Some(Ok(UnitStep::Unit(project))),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(error) if error.is_cancellation() => {
                self.finished = true;
                Some(Ok(UnitStep::Cancelled))
            }
            Err(error) => {
                self.finished = true;
                Some(Err(error.into()))
            }
        }
    }
}

/// Public outcome of one completed unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectOutcome {
    OutputsGenerated,
    OutputsSkipped(OutputsSkippedReason),
}

pub fn classify(status: ExitStatus) -> Result<ProjectOutcome> {
    match status {
        ExitStatus::SUCCESS | ExitStatus::DIAGNOSTICS_PRESENT_OUTPUTS_GENERATED => Ok(ProjectOutcome::OutputsGenerated),
        ExitStatus::DIAGNOSTICS_PRESENT_OUTPUTS_SKIPPED => {
            Ok(ProjectOutcome::OutputsSkipped(OutputsSkippedReason::DiagnosticsPresent))
        }
        ExitStatus::INVALID_PROJECT_OUTPUTS_SKIPPED => {
            Ok(ProjectOutcome::OutputsSkipped(OutputsSkippedReason::InvalidProject))
        }
        status
            if status == ExitStatus::PROJECT_REFERENCE_CYCLE_OUTPUTS_SKIPPED
                || status == ExitStatus::PROJECT_REFERENCE_CYCLE_OUTPUTS_SKUPPED =>
        {
            Ok(ProjectOutcome::OutputsSkipped(OutputsSkippedReason::ProjectReferenceCycle))
        }
        ExitStatus(other) => Err(BuildError::UnsupportedExitStatus(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_classify_every_known_status() {
        let cases = [
            (ExitStatus::SUCCESS, ProjectOutcome::OutputsGenerated),
            (ExitStatus::DIAGNOSTICS_PRESENT_OUTPUTS_GENERATED, ProjectOutcome::OutputsGenerated),
            (
                ExitStatus::DIAGNOSTICS_PRESENT_OUTPUTS_SKIPPED,
                ProjectOutcome::OutputsSkipped(OutputsSkippedReason::DiagnosticsPresent),
            ),
            (
                ExitStatus::INVALID_PROJECT_OUTPUTS_SKIPPED,
                ProjectOutcome::OutputsSkipped(OutputsSkippedReason::InvalidProject),
            ),
            (
                ExitStatus::PROJECT_REFERENCE_CYCLE_OUTPUTS_SKUPPED,
                ProjectOutcome::OutputsSkipped(OutputsSkippedReason::ProjectReferenceCycle),
            ),
        ];
        for (status, outcome) in cases {
            assert_eq!(classify(status).unwrap(), outcome, "{}", status);
        }
    }

    #[test]
    fn should_reject_unknown_statuses() {
        let error = classify(ExitStatus(7)).unwrap_err();
        assert!(matches!(error, BuildError::UnsupportedExitStatus(7)));
        assert_eq!(error.to_string(), "unsupported exit status 7");
    }
}
