//! Shell command text helpers.

use std::path::Path;

/// Leading whitespace-delimited token of `command`, treated as the binary it runs.
pub fn target_binary(command: &str) -> Option<&str> {
    command.split_whitespace().next()
}

/// Wrap `command` so it detaches from the terminal and logs to `log_path`.
///
/// The wrapper returns as soon as the detached process has been started.
pub fn background_command(command: &str, log_path: &Path) -> String {
    let log = log_path.to_string_lossy();
    format!(
        "nohup {command} > {} 2>&1 &",
        shell_words::quote(log.as_ref())
    )
}
