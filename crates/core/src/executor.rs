//! CommandExecutor trait: the abstraction over the execution engine.
//!
//! The loop controller hands an executor one command string at a time and
//! gets text back. Executors are process-wide singletons that may go offline
//! at any moment, so availability is asked for separately via
//! [`CommandExecutor::is_available`].

use crate::error::ExecutorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The outcome of running one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Whether the command exited successfully
    pub success: bool,

    /// Exit code, when the executor knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Combined stdout/stderr, already reduced to text
    pub output: String,
}

impl CommandOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            output: output.into(),
        }
    }

    pub fn failure(exit_code: Option<i32>, output: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code,
            output: output.into(),
        }
    }
}

/// The execution collaborator.
///
/// `run` returns `Err` only when the command could not be run at all (offline,
/// spawn failure, timeout, policy). A command that ran and failed is an
/// `Ok(CommandOutput { success: false, .. })`.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// A human-readable name for this executor (e.g., "shell", "remote").
    fn name(&self) -> &str;

    /// Whether the executor can currently accept commands.
    async fn is_available(&self) -> bool;

    /// Run a single command string.
    ///
    /// Dropping the returned future must abandon the command.
    async fn run(&self, command: &str) -> std::result::Result<CommandOutput, ExecutorError>;

    /// Run a command and reduce any outcome to the text fed back to the model.
    async fn run_to_text(&self, command: &str) -> String {
        match self.run(command).await {
            Ok(output) => output.output,
            Err(e) => format!("Error: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RefusingExecutor;

    #[async_trait]
    impl CommandExecutor for RefusingExecutor {
        fn name(&self) -> &str {
            "refusing"
        }

        async fn is_available(&self) -> bool {
            false
        }

        async fn run(&self, command: &str) -> std::result::Result<CommandOutput, ExecutorError> {
            if command.starts_with("false") {
                return Ok(CommandOutput::failure(Some(1), "[exit code: 1]"));
            }
            Err(ExecutorError::Offline("engine stopped".into()))
        }
    }

    #[tokio::test]
    async fn run_to_text_reduces_errors_to_text() {
        let text = RefusingExecutor.run_to_text("ls").await;
        assert_eq!(text, "Error: Executor offline: engine stopped");
    }

    #[tokio::test]
    async fn run_to_text_keeps_failed_command_output() {
        let text = RefusingExecutor.run_to_text("false").await;
        assert_eq!(text, "[exit code: 1]");
    }

    #[test]
    fn command_output_constructors() {
        let ok = CommandOutput::success("file1\nfile2");
        assert!(ok.success);
        assert_eq!(ok.exit_code, Some(0));

        let failed = CommandOutput::failure(None, "boom");
        assert!(!failed.success);
        assert!(failed.exit_code.is_none());
    }
}
