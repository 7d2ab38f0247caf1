//! Runs every configured step in order through the healer.

use tracing::{error, info};

use crate::core::types::Step;
use crate::heal::{HealEvent, HealFailure, HealOutcome, Healer};
use crate::io::advisor::FixAdvisor;
use crate::io::confirm::Confirmer;
use crate::io::locate::BinaryLocator;
use crate::io::process::CommandExecutor;

/// Progress of a setup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    StepStarted {
        /// 1-indexed position of the step.
        index: usize,
        total: usize,
        description: String,
        command: String,
    },
    Heal(HealEvent),
    StepFinished {
        index: usize,
        outcome: StepOutcome,
    },
}

/// Final state of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    /// Healing gave up.
    Failed(HealFailure),
    /// The step could not be carried out (spawn or prompt I/O failure).
    Aborted(String),
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub description: String,
    pub command: String,
    pub outcome: StepOutcome,
    pub fixes_applied: usize,
}

/// Summary of a setup run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupSummary {
    pub steps: Vec<StepReport>,
}

impl SetupSummary {
    pub fn total(&self) -> usize {
        self.steps.len()
    }

    pub fn failed(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| !step.outcome.is_success())
            .count()
    }

    pub fn succeeded(&self) -> usize {
        self.total() - self.failed()
    }
}

/// Heal each step in declaration order.
///
/// A failing step never stops the run; its failure is reported and the next
/// step starts.
pub fn run_setup<E, L, A, C, F>(
    healer: &Healer<'_, E, L, A, C>,
    steps: &[Step],
    mut on_event: F,
) -> SetupSummary
where
    E: CommandExecutor,
    L: BinaryLocator,
    A: FixAdvisor,
    C: Confirmer,
    F: FnMut(&RunEvent),
{
    let total = steps.len();
    let mut summary = SetupSummary::default();

    for (offset, step) in steps.iter().enumerate() {
        let index = offset + 1;
        info!(index, total, description = %step.description, "starting step");
        on_event(&RunEvent::StepStarted {
            index,
            total,
            description: step.description.clone(),
            command: step.command.clone(),
        });

        let (outcome, fixes_applied) =
            match healer.heal(step, |event| on_event(&RunEvent::Heal(event.clone()))) {
                Ok(report) => {
                    let fixes = report.fixes_applied();
                    let outcome = match report.outcome {
                        HealOutcome::Succeeded => StepOutcome::Succeeded,
                        HealOutcome::Failed(failure) => StepOutcome::Failed(failure),
                    };
                    (outcome, fixes)
                }
                Err(err) => {
                    error!(index, err = %format!("{err:#}"), "step aborted");
                    (StepOutcome::Aborted(format!("{err:#}")), 0)
                }
            };

        on_event(&RunEvent::StepFinished {
            index,
            outcome: outcome.clone(),
        });
        summary.steps.push(StepReport {
            description: step.description.clone(),
            command: step.command.clone(),
            outcome,
            fixes_applied,
        });
    }

    summary
}
