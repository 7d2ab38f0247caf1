//! Colored terminal output for setup runs.

use std::io::{self, Write};

use colored::Colorize;
use tracing::warn;

use crate::core::types::StepMode;
use crate::heal::HealEvent;
use crate::setup::{RunEvent, SetupSummary, StepOutcome};

/// Render one progress event as user-facing text, if it has any.
pub fn render_event(event: &RunEvent) -> Option<String> {
    match event {
        RunEvent::StepStarted {
            index,
            total,
            description,
            command,
        } => Some(format!(
            "\n{} {description} {}\n{} {command}",
            "🔧 Step:".cyan().bold(),
            format!("[{index}/{total}]").bright_black(),
            "Command:".cyan().bold(),
        )),
        RunEvent::Heal(event) => render_heal_event(event),
        RunEvent::StepFinished { outcome, .. } => match outcome {
            StepOutcome::Succeeded => None,
            StepOutcome::Failed(failure) => Some(
                format!("\n❌ Command ultimately failed after all fixes: {failure}")
                    .red()
                    .bold()
                    .to_string(),
            ),
            StepOutcome::Aborted(message) => Some(
                format!("\n❌ Step aborted: {message}")
                    .red()
                    .bold()
                    .to_string(),
            ),
        },
    }
}

fn render_heal_event(event: &HealEvent) -> Option<String> {
    let line = match event {
        HealEvent::Attempting {
            depth: 0,
            command,
            mode: StepMode::Background,
        } => format!("\n🚀 Running '{command}' in background...")
            .cyan()
            .to_string(),
        HealEvent::CommandFailed { error, .. } => {
            format!("\n❌ Command failed: {}", error.trim_end())
                .red()
                .bold()
                .to_string()
        }
        HealEvent::ConsultingAdvisor { .. } => "🧠 Thinking for a fix...".bright_black().to_string(),
        HealEvent::AdvisorUnavailable { reason, .. } => {
            format!("\n⚠️  No fix available: {reason}")
                .yellow()
                .bold()
                .to_string()
        }
        HealEvent::NoFixOffered { explanation, .. } => format!(
            "\n{}\n{}",
            "💡 No fix suggested.".yellow().bold(),
            format!("📝 {explanation}").bright_black()
        ),
        HealEvent::FixSuggested {
            fix, explanation, ..
        } => format!(
            "\n{}\n{}",
            format!("💡 Suggested Fix: {fix}").yellow().bold(),
            format!("📝 {explanation}").bright_black()
        ),
        HealEvent::FixLimitReached { limit, .. } => {
            format!("\n❌ Fix limit of {limit} reached for this step.")
                .red()
                .bold()
                .to_string()
        }
        HealEvent::FixFailed { error, .. } => {
            format!("\n❌ Fix command failed: {}", error.trim_end())
                .red()
                .bold()
                .to_string()
        }
        HealEvent::AwaitingBinary {
            binary, attempts, ..
        } => format!("⏳ Waiting for '{binary}' on PATH (up to {attempts} checks)...")
            .bright_black()
            .to_string(),
        HealEvent::BinaryStillMissing { binary, .. } => format!(
            "\n❌ Binary '{binary}' still not found after fix. Please ensure it is installed and in your PATH."
        )
        .red()
        .bold()
        .to_string(),
        HealEvent::RetryingOriginal { .. } => "\n✅ Fix applied. Retrying original command..."
            .green()
            .bold()
            .to_string(),
        HealEvent::Attempting { .. }
        | HealEvent::CommandSucceeded { .. }
        | HealEvent::FixDeclined { .. }
        | HealEvent::ApplyingFix { .. } => return None,
    };
    Some(line)
}

/// Final line printed after every step has run.
pub fn render_summary(summary: &SetupSummary) -> String {
    let line = format!(
        "{} of {} steps succeeded.",
        summary.succeeded(),
        summary.total()
    );
    if summary.failed() == 0 {
        format!("\n🎉 {line}").green().bold().to_string()
    } else {
        let failed: Vec<&str> = summary
            .steps
            .iter()
            .filter(|step| !step.outcome.is_success())
            .map(|step| step.description.as_str())
            .collect();
        format!("\n{line} Failed: {}", failed.join(", "))
            .red()
            .bold()
            .to_string()
    }
}

/// Prints rendered events to stdout.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn report(&self, event: &RunEvent) {
        if let Some(line) = render_event(event) {
            self.print(&line);
        }
    }

    pub fn summary(&self, summary: &SetupSummary) {
        self.print(&render_summary(summary));
    }

    fn print(&self, line: &str) {
        let mut out = io::stdout().lock();
        if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            warn!(err = %e, "failed to write console output");
        }
    }
}
