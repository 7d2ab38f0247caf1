//! Launch strategy per step mode: foreground or detached background.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, info, instrument};

use super::locate::BinaryLocator;
use super::process::CommandExecutor;
use crate::core::command::{background_command, target_binary};
use crate::core::types::{ExecutionResult, StepMode};

pub const DEFAULT_BACKGROUND_LOG: &str = "background_command.log";

/// Chooses how a command is launched based on its [`StepMode`].
pub struct ExecutionModes<'a, E, L> {
    executor: &'a E,
    locator: &'a L,
    log_path: PathBuf,
}

impl<'a, E: CommandExecutor, L: BinaryLocator> ExecutionModes<'a, E, L> {
    pub fn new(executor: &'a E, locator: &'a L, log_path: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            locator,
            log_path: log_path.into(),
        }
    }

    pub fn locator(&self) -> &'a L {
        self.locator
    }

    /// Run `command` according to `mode`.
    ///
    /// Background commands first require their leading binary to resolve on
    /// the search path; when it does not, nothing is spawned.
    #[instrument(skip_all, fields(mode = %mode))]
    pub fn run(&self, command: &str, mode: StepMode) -> Result<ExecutionResult> {
        match mode {
            StepMode::Background => self.run_background(command),
            StepMode::SameTerminal => self.executor.execute(command, false),
        }
    }

    fn run_background(&self, command: &str) -> Result<ExecutionResult> {
        let Some(binary) = target_binary(command) else {
            return Ok(ExecutionResult::not_launched(format!(
                "could not determine binary for background command: {command}"
            )));
        };
        if !self.locator.is_available(binary) {
            debug!(binary, "background binary missing");
            return Ok(ExecutionResult::not_launched(format!(
                "binary '{binary}' not found"
            )));
        }
        let wrapped = background_command(command, &self.log_path);
        info!(binary, log = %self.log_path.display(), "launching background command");
        self.executor.execute(&wrapped, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeLocator, ScriptedExecutor};

    #[test]
    fn same_terminal_delegates_unsuppressed() {
        let executor = ScriptedExecutor::always_ok();
        let locator = FakeLocator::missing();
        let modes = ExecutionModes::new(&executor, &locator, DEFAULT_BACKGROUND_LOG);

        let result = modes.run("make setup", StepMode::SameTerminal).expect("run");

        assert!(result.succeeded);
        assert_eq!(executor.calls(), vec![("make setup".to_string(), false)]);
        assert_eq!(locator.lookups(), 0);
    }

    #[test]
    fn background_wraps_command_with_nohup_and_log() {
        let executor = ScriptedExecutor::always_ok();
        let locator = FakeLocator::available(["redis-server"]);
        let modes = ExecutionModes::new(&executor, &locator, "bg.log");

        let result = modes
            .run("redis-server --port 7000", StepMode::Background)
            .expect("run");

        assert!(result.succeeded);
        assert_eq!(
            executor.calls(),
            vec![(
                "nohup redis-server --port 7000 > bg.log 2>&1 &".to_string(),
                false
            )]
        );
    }

    #[test]
    fn background_missing_binary_fails_without_spawning() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log_path = temp.path().join(DEFAULT_BACKGROUND_LOG);
        let executor = ScriptedExecutor::always_ok();
        let locator = FakeLocator::missing();
        let modes = ExecutionModes::new(&executor, &locator, &log_path);

        let result = modes
            .run("nonexistent-binary-xyz arg", StepMode::Background)
            .expect("run");

        assert!(!result.succeeded);
        assert!(!result.launched);
        assert_eq!(result.error_text, "binary 'nonexistent-binary-xyz' not found");
        assert!(executor.calls().is_empty());
        assert!(!log_path.exists());
    }

    #[test]
    fn background_blank_command_fails_without_lookup() {
        let executor = ScriptedExecutor::always_ok();
        let locator = FakeLocator::missing();
        let modes = ExecutionModes::new(&executor, &locator, DEFAULT_BACKGROUND_LOG);

        let result = modes.run("   ", StepMode::Background).expect("run");

        assert!(!result.launched);
        assert!(result.error_text.starts_with("could not determine binary"));
        assert_eq!(locator.lookups(), 0);
        assert!(executor.calls().is_empty());
    }
}
