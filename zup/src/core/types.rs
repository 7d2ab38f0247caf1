//! Shared types for the setup runner core.
//!
//! These types define stable contracts between the executor, the mode
//! strategy, the fix advisor, and the self-healing loop.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// How a step's original command is launched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepMode {
    /// Run in the foreground; the caller blocks until the command exits.
    #[default]
    SameTerminal,
    /// Detach from the terminal and redirect output to the background log.
    Background,
}

impl StepMode {
    pub fn as_str(self) -> &'static str {
        match self {
            StepMode::SameTerminal => "same-terminal",
            StepMode::Background => "background",
        }
    }
}

impl From<String> for StepMode {
    fn from(value: String) -> Self {
        match value.as_str() {
            "background" => StepMode::Background,
            "" | "same-terminal" => StepMode::SameTerminal,
            other => {
                warn!(mode = other, "unknown step mode, using same-terminal");
                StepMode::SameTerminal
            }
        }
    }
}

impl From<StepMode> for String {
    fn from(mode: StepMode) -> Self {
        mode.as_str().to_string()
    }
}

impl fmt::Display for StepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single declared setup step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    #[serde(rename = "desc", default)]
    pub description: String,
    #[serde(rename = "cmd")]
    pub command: String,
    /// Free-text hint forwarded to the fix advisor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
    #[serde(default)]
    pub mode: StepMode,
}

impl Step {
    pub fn new(description: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            command: command.into(),
            meta: None,
            mode: StepMode::SameTerminal,
        }
    }

    pub fn with_meta(mut self, meta: impl Into<String>) -> Self {
        self.meta = Some(meta.into());
        self
    }

    pub fn with_mode(mut self, mode: StepMode) -> Self {
        self.mode = mode;
        self
    }

    /// Meta hint, or `None` when absent or blank.
    pub fn hint(&self) -> Option<&str> {
        self.meta.as_deref().map(str::trim).filter(|m| !m.is_empty())
    }
}

/// Outcome of one command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub succeeded: bool,
    /// Stdout collected while the command ran.
    pub captured_output: String,
    /// Diagnostic text for a failed execution; empty on success.
    pub error_text: String,
    /// False when a precondition failed and no process was spawned.
    pub launched: bool,
}

impl ExecutionResult {
    pub fn succeeded(captured_output: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            captured_output: captured_output.into(),
            error_text: String::new(),
            launched: true,
        }
    }

    pub fn failed(captured_output: impl Into<String>, error_text: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            captured_output: captured_output.into(),
            error_text: error_text.into(),
            launched: true,
        }
    }

    pub fn not_launched(error_text: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            captured_output: String::new(),
            error_text: error_text.into(),
            launched: false,
        }
    }
}

/// A corrective command proposed by a fix advisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixSuggestion {
    pub fix_command: String,
    pub explanation: String,
    /// False when the advisor could not be reached or its reply was unusable.
    pub available: bool,
}

impl FixSuggestion {
    pub fn new(fix_command: impl Into<String>, explanation: impl Into<String>) -> Self {
        Self {
            fix_command: fix_command.into(),
            explanation: explanation.into(),
            available: true,
        }
    }

    /// Advisor could not help; `reason` is shown to the user.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            fix_command: String::new(),
            explanation: reason.into(),
            available: false,
        }
    }

    /// Advisor answered but proposed no command.
    pub fn has_no_fix(&self) -> bool {
        self.available && self.fix_command.trim().is_empty()
    }
}
