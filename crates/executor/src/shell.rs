//! Local shell executor.
//!
//! Supports command allowlisting and a per-command timeout.

use async_trait::async_trait;
use cmdloop_core::error::ExecutorError;
use cmdloop_core::executor::{CommandExecutor, CommandOutput};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs commands through `sh -c` (or `cmd /C` on Windows).
pub struct ShellExecutor {
    /// If non-empty, only these commands are allowed.
    allowed_commands: Vec<String>,
    timeout: Duration,
}

impl ShellExecutor {
    pub fn new(allowed_commands: Vec<String>, timeout: Duration) -> Self {
        Self {
            allowed_commands,
            timeout,
        }
    }

    fn is_command_allowed(&self, command: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true;
        }

        let base_cmd = command.split_whitespace().next().unwrap_or("").trim();

        self.allowed_commands.iter().any(|a| a == base_cmd)
    }

    fn command_for(line: &str) -> Command {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", line]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", line]);
            c
        };
        // A dropped future (caller went away, timeout) must not leave the child running.
        cmd.kill_on_drop(true);
        cmd
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new(Vec::new(), Duration::from_secs(300))
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    fn name(&self) -> &str {
        "shell"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn run(&self, command: &str) -> Result<CommandOutput, ExecutorError> {
        if !self.is_command_allowed(command) {
            return Err(ExecutorError::PermissionDenied {
                command: command.to_string(),
                reason: format!(
                    "'{}' not in allowlist",
                    command.split_whitespace().next().unwrap_or("")
                ),
            });
        }

        debug!(command = %command, "Executing shell command");

        let output = tokio::time::timeout(self.timeout, Self::command_for(command).output())
            .await
            .map_err(|_| {
                warn!(command = %command, timeout_secs = self.timeout.as_secs(), "Command timed out");
                ExecutorError::Timeout {
                    command: command.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            })?
            .map_err(|e| ExecutorError::SpawnFailed {
                command: command.to_string(),
                reason: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let code = output.status.code();

        if output.status.success() {
            let text = if stderr.is_empty() {
                stdout
            } else {
                format!("{stdout}\n[stderr]: {stderr}")
            };
            Ok(CommandOutput::success(text.trim()))
        } else {
            let shown = code.unwrap_or(-1);
            warn!(command = %command, exit_code = shown, "Command failed");
            let text = format!("[exit code: {shown}]\n{stdout}\n{stderr}");
            Ok(CommandOutput::failure(code, text.trim()))
        }
    }
}
