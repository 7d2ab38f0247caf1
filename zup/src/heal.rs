//! Self-healing execution of a single step.
//!
//! A failing command is handed to the fix advisor; an accepted fix is itself
//! healed (always in the foreground), and once it succeeds the failing
//! command is retried from the start. Healing stops when:
//!
//! - the command succeeds,
//! - the user declines a suggested fix,
//! - the advisor is unavailable or offers no fix,
//! - the configured fix limit is reached, or
//! - a background command's binary never appears after a successful fix.
//!
//! Nested fixes are tracked on an explicit frame stack rather than through
//! call recursion. When a fix fails, its failure replaces the failure of the
//! command it was meant to repair.

use std::fmt;
use std::time::Duration;

use anyhow::{Result, anyhow};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::command::target_binary;
use crate::core::types::{Step, StepMode};
use crate::io::advisor::FixAdvisor;
use crate::io::config::ExecutionConfig;
use crate::io::confirm::Confirmer;
use crate::io::locate::BinaryLocator;
use crate::io::mode::ExecutionModes;
use crate::io::process::CommandExecutor;
use crate::io::readiness::{DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL, wait_for_binary};

pub const APPLY_FIX_PROMPT: &str = "Apply this fix?";

/// Limits applied while healing a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealPolicy {
    pub poll_attempts: u32,
    pub poll_interval: Duration,
    /// Maximum accepted fixes per step; `None` is unbounded.
    pub max_fixes: Option<u32>,
}

impl Default for HealPolicy {
    fn default() -> Self {
        Self {
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_fixes: None,
        }
    }
}

impl HealPolicy {
    pub fn from_config(cfg: &ExecutionConfig) -> Self {
        Self {
            poll_attempts: cfg.poll_attempts,
            poll_interval: cfg.poll_interval(),
            max_fixes: cfg.max_fixes,
        }
    }
}

/// Error surfaced when healing gives up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HealError {
    /// A command (the step's own or a fix) failed; `message` is its error text.
    #[error("{message}")]
    Command { command: String, message: String },
    #[error("binary '{binary}' still not found after fix")]
    BinaryStillMissing { binary: String },
}

/// Why healing stopped without success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    AdvisorUnavailable,
    NoFixOffered,
    Declined,
    FixLimitReached,
    BinaryStillMissing,
}

/// Terminal failure of a healing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealFailure {
    pub error: HealError,
    pub reason: StopReason,
    /// Fix nesting level where healing stopped; 0 is the step's own command.
    pub depth: usize,
}

impl fmt::Display for HealFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealOutcome {
    Succeeded,
    Failed(HealFailure),
}

/// Observable progress of the healing loop, in order of occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealEvent {
    Attempting {
        depth: usize,
        command: String,
        mode: StepMode,
    },
    CommandSucceeded {
        depth: usize,
        command: String,
    },
    CommandFailed {
        depth: usize,
        command: String,
        error: String,
        /// False when the command was rejected before spawning.
        launched: bool,
    },
    ConsultingAdvisor {
        depth: usize,
        command: String,
    },
    AdvisorUnavailable {
        depth: usize,
        reason: String,
    },
    NoFixOffered {
        depth: usize,
        explanation: String,
    },
    FixSuggested {
        depth: usize,
        fix: String,
        explanation: String,
    },
    FixDeclined {
        depth: usize,
        fix: String,
    },
    FixLimitReached {
        depth: usize,
        limit: u32,
    },
    ApplyingFix {
        depth: usize,
        fix: String,
    },
    FixFailed {
        depth: usize,
        fix: String,
        error: String,
    },
    AwaitingBinary {
        depth: usize,
        binary: String,
        attempts: u32,
    },
    BinaryStillMissing {
        depth: usize,
        binary: String,
    },
    RetryingOriginal {
        depth: usize,
        command: String,
    },
}

/// Result of healing one step, with the full attempt trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealReport {
    pub outcome: HealOutcome,
    pub trail: Vec<HealEvent>,
}

impl HealReport {
    pub fn succeeded(&self) -> bool {
        self.outcome == HealOutcome::Succeeded
    }

    pub fn failure(&self) -> Option<&HealFailure> {
        match &self.outcome {
            HealOutcome::Succeeded => None,
            HealOutcome::Failed(failure) => Some(failure),
        }
    }

    /// Number of fixes the user accepted.
    pub fn fixes_applied(&self) -> usize {
        self.trail
            .iter()
            .filter(|event| matches!(event, HealEvent::ApplyingFix { .. }))
            .count()
    }
}

/// One command being healed.
#[derive(Debug, Clone)]
struct Frame {
    command: String,
    mode: StepMode,
    depth: usize,
}

/// Result handed from a finished fix frame to the frame it was repairing.
struct Settled {
    fix: String,
    result: Result<(), HealFailure>,
}

enum Transition {
    Settle(Result<(), HealFailure>),
    ApplyFix(String),
}

/// Records events and forwards each one to the caller as it happens.
struct Trail<F> {
    events: Vec<HealEvent>,
    on_event: F,
}

impl<F: FnMut(&HealEvent)> Trail<F> {
    fn push(&mut self, event: HealEvent) {
        (self.on_event)(&event);
        self.events.push(event);
    }

    fn finish(self, outcome: HealOutcome) -> HealReport {
        HealReport {
            outcome,
            trail: self.events,
        }
    }
}

/// Drives the fix-apply-retry protocol for steps.
pub struct Healer<'a, E, L, A, C> {
    modes: ExecutionModes<'a, E, L>,
    advisor: &'a A,
    confirmer: &'a C,
    policy: HealPolicy,
}

impl<'a, E, L, A, C> Healer<'a, E, L, A, C>
where
    E: CommandExecutor,
    L: BinaryLocator,
    A: FixAdvisor,
    C: Confirmer,
{
    pub fn new(
        modes: ExecutionModes<'a, E, L>,
        advisor: &'a A,
        confirmer: &'a C,
        policy: HealPolicy,
    ) -> Self {
        Self {
            modes,
            advisor,
            confirmer,
            policy,
        }
    }

    /// Heal `step` until it succeeds or a terminal condition is reached.
    ///
    /// `Err` is returned only when a command cannot be run at all or the
    /// confirmation prompt cannot be read.
    #[instrument(skip_all, fields(command = %step.command, mode = %step.mode))]
    pub fn heal<F: FnMut(&HealEvent)>(&self, step: &Step, on_event: F) -> Result<HealReport> {
        let mut trail = Trail {
            events: Vec::new(),
            on_event,
        };
        let meta = step.hint();
        let mut stack = vec![Frame {
            command: step.command.clone(),
            mode: step.mode,
            depth: 0,
        }];
        let mut fixes_applied = 0u32;
        let mut settled: Option<Settled> = None;

        loop {
            let frame = stack
                .last()
                .cloned()
                .ok_or_else(|| anyhow!("heal stack is empty"))?;

            let transition = match settled.take() {
                Some(Settled {
                    fix,
                    result: Err(failure),
                }) => {
                    trail.push(HealEvent::FixFailed {
                        depth: frame.depth,
                        fix,
                        error: failure.to_string(),
                    });
                    Transition::Settle(Err(failure))
                }
                Some(Settled { result: Ok(()), .. }) => match self.await_binary(&frame, &mut trail) {
                    Err(failure) => Transition::Settle(Err(failure)),
                    Ok(()) => {
                        trail.push(HealEvent::RetryingOriginal {
                            depth: frame.depth,
                            command: frame.command.clone(),
                        });
                        self.attempt(&frame, meta, &mut fixes_applied, &mut trail)?
                    }
                },
                None => self.attempt(&frame, meta, &mut fixes_applied, &mut trail)?,
            };

            match transition {
                Transition::ApplyFix(fix) => {
                    info!(depth = frame.depth + 1, fix = %fix, "applying fix");
                    stack.push(Frame {
                        command: fix,
                        mode: StepMode::SameTerminal,
                        depth: frame.depth + 1,
                    });
                }
                Transition::Settle(result) => {
                    stack.pop();
                    if stack.is_empty() {
                        let outcome = match result {
                            Ok(()) => HealOutcome::Succeeded,
                            Err(failure) => HealOutcome::Failed(failure),
                        };
                        debug!(fixes_applied, "healing finished");
                        return Ok(trail.finish(outcome));
                    }
                    settled = Some(Settled {
                        fix: frame.command,
                        result,
                    });
                }
            }
        }
    }

    /// Run the frame's command once and decide what happens next.
    fn attempt<F: FnMut(&HealEvent)>(
        &self,
        frame: &Frame,
        meta: Option<&str>,
        fixes_applied: &mut u32,
        trail: &mut Trail<F>,
    ) -> Result<Transition> {
        let depth = frame.depth;
        trail.push(HealEvent::Attempting {
            depth,
            command: frame.command.clone(),
            mode: frame.mode,
        });
        let result = self.modes.run(&frame.command, frame.mode)?;
        if result.succeeded {
            trail.push(HealEvent::CommandSucceeded {
                depth,
                command: frame.command.clone(),
            });
            return Ok(Transition::Settle(Ok(())));
        }

        trail.push(HealEvent::CommandFailed {
            depth,
            command: frame.command.clone(),
            error: result.error_text.clone(),
            launched: result.launched,
        });
        let stop = |reason| {
            Transition::Settle(Err(HealFailure {
                error: HealError::Command {
                    command: frame.command.clone(),
                    message: result.error_text.clone(),
                },
                reason,
                depth,
            }))
        };

        if let Some(limit) = self.policy.max_fixes
            && *fixes_applied >= limit
        {
            warn!(limit, "fix limit reached");
            trail.push(HealEvent::FixLimitReached { depth, limit });
            return Ok(stop(StopReason::FixLimitReached));
        }

        trail.push(HealEvent::ConsultingAdvisor {
            depth,
            command: frame.command.clone(),
        });
        let suggestion = self
            .advisor
            .suggest_fix(&frame.command, &result.error_text, meta);
        if !suggestion.available {
            trail.push(HealEvent::AdvisorUnavailable {
                depth,
                reason: suggestion.explanation,
            });
            return Ok(stop(StopReason::AdvisorUnavailable));
        }
        if suggestion.has_no_fix() {
            trail.push(HealEvent::NoFixOffered {
                depth,
                explanation: suggestion.explanation,
            });
            return Ok(stop(StopReason::NoFixOffered));
        }

        trail.push(HealEvent::FixSuggested {
            depth,
            fix: suggestion.fix_command.clone(),
            explanation: suggestion.explanation,
        });
        if !self.confirmer.confirm(APPLY_FIX_PROMPT)? {
            trail.push(HealEvent::FixDeclined {
                depth,
                fix: suggestion.fix_command,
            });
            return Ok(stop(StopReason::Declined));
        }

        *fixes_applied += 1;
        trail.push(HealEvent::ApplyingFix {
            depth,
            fix: suggestion.fix_command.clone(),
        });
        Ok(Transition::ApplyFix(suggestion.fix_command))
    }

    /// After a successful fix, wait for a background command's binary.
    ///
    /// The binary checked is the one named by the frame's own command.
    fn await_binary<F: FnMut(&HealEvent)>(
        &self,
        frame: &Frame,
        trail: &mut Trail<F>,
    ) -> Result<(), HealFailure> {
        if frame.mode != StepMode::Background {
            return Ok(());
        }
        let binary = target_binary(&frame.command).unwrap_or_default().to_string();
        trail.push(HealEvent::AwaitingBinary {
            depth: frame.depth,
            binary: binary.clone(),
            attempts: self.policy.poll_attempts,
        });
        if wait_for_binary(
            self.modes.locator(),
            &binary,
            self.policy.poll_attempts,
            self.policy.poll_interval,
        ) {
            return Ok(());
        }
        warn!(binary = %binary, "binary still missing after fix");
        trail.push(HealEvent::BinaryStillMissing {
            depth: frame.depth,
            binary: binary.clone(),
        });
        Err(HealFailure {
            error: HealError::BinaryStillMissing { binary },
            reason: StopReason::BinaryStillMissing,
            depth: frame.depth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ExecutionResult, FixSuggestion};
    use crate::test_support::{FakeLocator, ScriptedAdvisor, ScriptedConfirmer, ScriptedExecutor};

    fn fast_policy() -> HealPolicy {
        HealPolicy {
            poll_attempts: 3,
            poll_interval: Duration::from_millis(1),
            max_fixes: None,
        }
    }

    fn heal_with(
        step: &Step,
        executor: &ScriptedExecutor,
        locator: &FakeLocator,
        advisor: &ScriptedAdvisor,
        confirmer: &ScriptedConfirmer,
        policy: HealPolicy,
    ) -> HealReport {
        let modes = ExecutionModes::new(executor, locator, "bg.log");
        let healer = Healer::new(modes, advisor, confirmer, policy);
        healer.heal(step, |_| {}).expect("heal")
    }

    fn failed(error: &str) -> ExecutionResult {
        ExecutionResult::failed("", error)
    }

    #[test]
    fn success_on_first_attempt_never_consults_advisor() {
        let executor = ScriptedExecutor::always_ok();
        let advisor = ScriptedAdvisor::unavailable();
        let confirmer = ScriptedConfirmer::always(true);

        let report = heal_with(
            &Step::new("noop", "true"),
            &executor,
            &FakeLocator::missing(),
            &advisor,
            &confirmer,
            fast_policy(),
        );

        assert!(report.succeeded());
        assert!(advisor.calls().is_empty());
        assert_eq!(
            report.trail,
            vec![
                HealEvent::Attempting {
                    depth: 0,
                    command: "true".to_string(),
                    mode: StepMode::SameTerminal,
                },
                HealEvent::CommandSucceeded {
                    depth: 0,
                    command: "true".to_string(),
                },
            ]
        );
    }

    #[test]
    fn unavailable_advisor_stops_with_original_error() {
        let executor = ScriptedExecutor::always_failing("make: *** no rule");
        let advisor = ScriptedAdvisor::unavailable();
        let confirmer = ScriptedConfirmer::always(true);

        let report = heal_with(
            &Step::new("build", "make"),
            &executor,
            &FakeLocator::missing(),
            &advisor,
            &confirmer,
            fast_policy(),
        );

        let failure = report.failure().expect("failure");
        assert_eq!(failure.reason, StopReason::AdvisorUnavailable);
        assert_eq!(failure.depth, 0);
        assert_eq!(failure.to_string(), "make: *** no rule");
        assert_eq!(advisor.calls().len(), 1);
        assert_eq!(executor.count("make"), 1);
        assert!(confirmer.prompts().is_empty());
    }

    #[test]
    fn accepted_fix_then_original_is_rerun() {
        let executor = ScriptedExecutor::always_ok()
            .script("apt-get install -y jq", vec![failed("permission denied")]);
        let advisor = ScriptedAdvisor::new(vec![FixSuggestion::new(
            "sudo apt-get install -y jq",
            "installing packages needs root",
        )]);
        let confirmer = ScriptedConfirmer::always(true);

        let report = heal_with(
            &Step::new("Install jq", "apt-get install -y jq"),
            &executor,
            &FakeLocator::missing(),
            &advisor,
            &confirmer,
            fast_policy(),
        );

        assert!(report.succeeded());
        assert_eq!(report.fixes_applied(), 1);
        assert_eq!(
            executor.calls(),
            vec![
                ("apt-get install -y jq".to_string(), false),
                ("sudo apt-get install -y jq".to_string(), false),
                ("apt-get install -y jq".to_string(), false),
            ]
        );
        assert_eq!(confirmer.prompts(), vec![APPLY_FIX_PROMPT.to_string()]);
        assert!(report.trail.contains(&HealEvent::RetryingOriginal {
            depth: 0,
            command: "apt-get install -y jq".to_string(),
        }));
    }

    #[test]
    fn declined_fix_stops_with_original_error() {
        let executor = ScriptedExecutor::always_failing("permission denied");
        let advisor = ScriptedAdvisor::new(vec![FixSuggestion::new("sudo !!", "root")]);
        let confirmer = ScriptedConfirmer::new(vec![false]);

        let report = heal_with(
            &Step::new("Install jq", "apt-get install -y jq"),
            &executor,
            &FakeLocator::missing(),
            &advisor,
            &confirmer,
            fast_policy(),
        );

        let failure = report.failure().expect("failure");
        assert_eq!(failure.reason, StopReason::Declined);
        assert_eq!(failure.to_string(), "permission denied");
        assert_eq!(executor.count("sudo !!"), 0);
        assert_eq!(report.fixes_applied(), 0);
    }

    #[test]
    fn failing_fix_masks_original_error() {
        let executor = ScriptedExecutor::always_ok()
            .script("make", vec![failed("make broke")])
            .script("sudo make", vec![failed("sudo: no tty present")]);
        let advisor = ScriptedAdvisor::new(vec![FixSuggestion::new("sudo make", "elevate")]);
        let confirmer = ScriptedConfirmer::always(true);

        let report = heal_with(
            &Step::new("build", "make"),
            &executor,
            &FakeLocator::missing(),
            &advisor,
            &confirmer,
            fast_policy(),
        );

        let failure = report.failure().expect("failure");
        assert_eq!(failure.to_string(), "sudo: no tty present");
        assert_eq!(failure.reason, StopReason::AdvisorUnavailable);
        assert_eq!(failure.depth, 1);
        assert_eq!(
            failure.error,
            HealError::Command {
                command: "sudo make".to_string(),
                message: "sudo: no tty present".to_string(),
            }
        );
        assert_eq!(executor.count("make"), 1);
        assert!(report.trail.contains(&HealEvent::FixFailed {
            depth: 0,
            fix: "sudo make".to_string(),
            error: "sudo: no tty present".to_string(),
        }));
    }

    #[test]
    fn nested_fixes_unwind_back_to_original() {
        let executor = ScriptedExecutor::always_ok()
            .script("make", vec![failed("missing cc")])
            .script("apt-get install -y gcc", vec![failed("permission denied")]);
        let advisor = ScriptedAdvisor::new(vec![
            FixSuggestion::new("apt-get install -y gcc", "install a compiler"),
            FixSuggestion::new("sudo apt-get install -y gcc", "needs root"),
        ]);
        let confirmer = ScriptedConfirmer::always(true);

        let report = heal_with(
            &Step::new("build", "make"),
            &executor,
            &FakeLocator::missing(),
            &advisor,
            &confirmer,
            fast_policy(),
        );

        assert!(report.succeeded());
        assert_eq!(report.fixes_applied(), 2);
        let consulted: Vec<String> = advisor.calls().into_iter().map(|c| c.command).collect();
        assert_eq!(consulted, vec!["make", "apt-get install -y gcc"]);
        assert_eq!(executor.count("make"), 2);
        assert_eq!(executor.count("apt-get install -y gcc"), 2);
        assert_eq!(executor.count("sudo apt-get install -y gcc"), 1);
    }

    #[test]
    fn meta_is_forwarded_for_original_and_fix() {
        let executor = ScriptedExecutor::always_ok()
            .script("make", vec![failed("e1")])
            .script("fix-1", vec![failed("e2")]);
        let advisor = ScriptedAdvisor::new(vec![FixSuggestion::new("fix-1", "first")]);
        let confirmer = ScriptedConfirmer::always(true);

        heal_with(
            &Step::new("build", "make").with_meta("alpine container"),
            &executor,
            &FakeLocator::missing(),
            &advisor,
            &confirmer,
            fast_policy(),
        );

        let calls = advisor.calls();
        assert_eq!(calls.len(), 2);
        assert!(
            calls
                .iter()
                .all(|call| call.meta.as_deref() == Some("alpine container"))
        );
        assert_eq!(calls[1].error_text, "e2");
    }

    #[test]
    fn empty_fix_stops_without_prompting() {
        let executor = ScriptedExecutor::always_failing("boom");
        let advisor = ScriptedAdvisor::new(vec![FixSuggestion::new("", "nothing safe to run")]);
        let confirmer = ScriptedConfirmer::always(true);

        let report = heal_with(
            &Step::new("build", "make"),
            &executor,
            &FakeLocator::missing(),
            &advisor,
            &confirmer,
            fast_policy(),
        );

        assert_eq!(report.failure().expect("failure").reason, StopReason::NoFixOffered);
        assert!(confirmer.prompts().is_empty());
    }

    #[test]
    fn fix_limit_stops_further_suggestions() {
        let executor = ScriptedExecutor::always_ok()
            .script("make", vec![failed("first"), failed("second")]);
        let advisor = ScriptedAdvisor::new(vec![
            FixSuggestion::new("fix-1", "one"),
            FixSuggestion::new("fix-2", "two"),
        ]);
        let confirmer = ScriptedConfirmer::always(true);
        let policy = HealPolicy {
            max_fixes: Some(1),
            ..fast_policy()
        };

        let report = heal_with(
            &Step::new("build", "make"),
            &executor,
            &FakeLocator::missing(),
            &advisor,
            &confirmer,
            policy,
        );

        let failure = report.failure().expect("failure");
        assert_eq!(failure.reason, StopReason::FixLimitReached);
        assert_eq!(failure.to_string(), "second");
        assert_eq!(advisor.calls().len(), 1);
        assert_eq!(report.fixes_applied(), 1);
    }

    #[test]
    fn background_fix_waits_for_binary_then_relaunches() {
        let executor = ScriptedExecutor::always_ok();
        // Missing for the precondition check, present once the fix has run.
        let locator = FakeLocator::appearing_after("redis-server", 1);
        let advisor = ScriptedAdvisor::new(vec![FixSuggestion::new(
            "brew install redis",
            "redis is not installed",
        )]);
        let confirmer = ScriptedConfirmer::always(true);

        let report = heal_with(
            &Step::new("redis", "redis-server").with_mode(StepMode::Background),
            &executor,
            &locator,
            &advisor,
            &confirmer,
            fast_policy(),
        );

        assert!(report.succeeded());
        assert_eq!(
            executor.calls(),
            vec![
                ("brew install redis".to_string(), false),
                ("nohup redis-server > bg.log 2>&1 &".to_string(), false),
            ]
        );
        assert!(report.trail.contains(&HealEvent::CommandFailed {
            depth: 0,
            command: "redis-server".to_string(),
            error: "binary 'redis-server' not found".to_string(),
            launched: false,
        }));
    }

    #[test]
    fn background_binary_never_appearing_is_terminal() {
        let executor = ScriptedExecutor::always_ok();
        let locator = FakeLocator::missing();
        let advisor = ScriptedAdvisor::new(vec![FixSuggestion::new("brew install toolx", "x")]);
        let confirmer = ScriptedConfirmer::always(true);

        let report = heal_with(
            &Step::new("toolx", "toolx serve").with_mode(StepMode::Background),
            &executor,
            &locator,
            &advisor,
            &confirmer,
            fast_policy(),
        );

        let failure = report.failure().expect("failure");
        assert_eq!(failure.reason, StopReason::BinaryStillMissing);
        assert_eq!(failure.to_string(), "binary 'toolx' still not found after fix");
        // One precondition lookup plus three polls.
        assert_eq!(locator.lookups(), 4);
        assert_eq!(executor.calls(), vec![("brew install toolx".to_string(), false)]);
    }

    #[test]
    fn events_are_reported_as_they_happen() {
        let executor = ScriptedExecutor::always_failing("boom");
        let advisor = ScriptedAdvisor::unavailable();
        let confirmer = ScriptedConfirmer::always(false);
        let locator = FakeLocator::missing();
        let modes = ExecutionModes::new(&executor, &locator, "bg.log");
        let healer = Healer::new(modes, &advisor, &confirmer, fast_policy());

        let mut seen = Vec::new();
        let report = healer
            .heal(&Step::new("build", "make"), |event| seen.push(event.clone()))
            .expect("heal");

        assert_eq!(seen, report.trail);
        assert!(matches!(
            seen.last(),
            Some(HealEvent::AdvisorUnavailable { reason, .. }) if reason == "no scripted suggestion"
        ));
    }
}
