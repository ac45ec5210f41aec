//! Feedback composition: turns one iteration's executions into the next prompt.

use std::fmt;

/// `(command, result)` pairs gathered during one iteration, in run order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    entries: Vec<(String, String)>,
}

impl ExecutionSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, command: impl Into<String>, result: impl Into<String>) {
        self.entries.push((command.into(), result.into()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }
}

impl fmt::Display for ExecutionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (command, result) in &self.entries {
            write!(f, "\nCommand: {command}\nResult: {result}\n")?;
        }
        Ok(())
    }
}

const NEXT_STEP_INSTRUCTION: &str = "Analyze the results above. If the original task is not yet complete, \
suggest the NEXT single command needed. If the task is complete, reply 'Task completed' \
and summarize what was done.";

/// Build the prompt for the iteration after `iteration`.
///
/// Consumes the summary: each one is fed back exactly once.
pub fn compose_feedback(instruction: &str, iteration: u32, summary: ExecutionSummary) -> String {
    format!(
        "{instruction}\n\n[Execution History - Iteration {iteration}]:\n{summary}\n\n{NEXT_STEP_INSTRUCTION}"
    )
}
