//! Shell command execution with live or buffered output.

use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};

use crate::core::types::ExecutionResult;

pub const DEFAULT_SHELL: &str = "bash";

/// Runs one shell command to completion.
pub trait CommandExecutor {
    /// Run `command` and wait for it to exit.
    ///
    /// With `suppress_output == false`, stdout is echoed to the terminal as it
    /// arrives. A non-zero exit is reported through the returned result; `Err`
    /// means the command could not be run at all.
    fn execute(&self, command: &str, suppress_output: bool) -> Result<ExecutionResult>;
}

/// Executor that runs commands through `<shell> -c`.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
}

impl ShellExecutor {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_SHELL)
    }
}

impl CommandExecutor for ShellExecutor {
    #[instrument(skip_all, fields(shell = %self.shell, suppress_output = suppress_output))]
    fn execute(&self, command: &str, suppress_output: bool) -> Result<ExecutionResult> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(command, "spawning shell");
        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                error!(err = %e, "failed to spawn shell");
                return Err(e).with_context(|| format!("spawn {}", self.shell));
            }
        };

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("stderr was not piped"))?;

        let echo = (!suppress_output).then(io::stdout);
        let stdout_handle = thread::spawn(move || copy_stream(stdout, echo));
        let stderr_handle = thread::spawn(move || copy_stream(stderr, None::<io::Stdout>));

        let status = child.wait().context("wait for command")?;
        let stdout = join_output(stdout_handle).context("join stdout")?;
        let stderr = join_output(stderr_handle).context("join stderr")?;

        debug!(exit_code = ?status.code(), "command finished");
        Ok(classify(status.success(), stdout, stderr, suppress_output))
    }
}

/// Build the result for a finished command.
///
/// Suppressed runs report trimmed stdout and stderr together; streamed runs
/// report stderr alone, untrimmed, since stdout was already shown.
fn classify(success: bool, stdout: String, stderr: String, suppress_output: bool) -> ExecutionResult {
    if success {
        return ExecutionResult::succeeded(stdout);
    }
    let error_text = if suppress_output {
        format!("{stdout}\n{stderr}").trim().to_string()
    } else {
        stderr
    };
    ExecutionResult::failed(stdout, error_text)
}

fn join_output(handle: thread::JoinHandle<Result<String>>) -> Result<String> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

const CHUNK_SIZE: usize = 8 * 1024;

/// Read a stream to the end, copying each chunk to `echo` as soon as it arrives.
///
/// Chunks are forwarded without waiting for a newline so prompts that end
/// mid-line are visible while the child waits for input.
fn copy_stream<R: Read, W: Write>(mut reader: R, mut echo: Option<W>) -> Result<String> {
    let mut collected = Vec::new();
    let mut chunk = [0u8; CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("read command output"),
        };

        if let Some(out) = echo.as_mut()
            && let Err(e) = out.write_all(&chunk[..n]).and_then(|()| out.flush())
        {
            warn!(err = %e, "failed to echo command output");
        }

        collected.extend_from_slice(&chunk[..n]);
    }

    Ok(String::from_utf8_lossy(&collected).into_owned())
}
