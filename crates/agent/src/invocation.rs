//! Per-invocation state: instruction, resolved settings and id.
//!
//! Nothing here is shared between invocations; each request builds its own
//! [`Invocation`] and hands it to the loop by value.

use cmdloop_config::AgentConfig;
use cmdloop_core::InvocationId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejections raised before the loop starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoopError {
    #[error("instruction must not be empty")]
    EmptyInstruction,

    #[error("maxIterations must be at least 1 (got {value})")]
    InvalidLimit { value: u32 },
}

/// Iteration and execution settings, resolved once per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopSettings {
    pub max_iterations: u32,
    pub unlimited: bool,
    pub safety_ceiling: u32,
    pub auto_execute: bool,
}

impl LoopSettings {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            unlimited: config.unlimited_iterations,
            safety_ceiling: config.safety_ceiling,
            auto_execute: config.auto_execute,
        }
    }

    /// Apply per-request overrides.
    ///
    /// An explicit `max_iterations` switches unlimited mode off and is taken
    /// as given; the safety ceiling only bounds unlimited mode.
    pub fn with_overrides(
        mut self,
        auto_execute: Option<bool>,
        max_iterations: Option<u32>,
    ) -> Result<Self, LoopError> {
        if let Some(auto) = auto_execute {
            self.auto_execute = auto;
        }
        if let Some(limit) = max_iterations {
            if limit == 0 {
                return Err(LoopError::InvalidLimit { value: 0 });
            }
            self.max_iterations = limit;
            self.unlimited = false;
        }
        Ok(self)
    }

    /// The number of iterations the loop may actually run.
    pub fn effective_limit(&self) -> u32 {
        if self.unlimited {
            self.safety_ceiling.max(1)
        } else {
            self.max_iterations
        }
    }

    /// Limit as shown in iteration markers.
    pub fn limit_label(&self) -> String {
        if self.unlimited {
            "∞".to_string()
        } else {
            self.effective_limit().to_string()
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

/// One caller request, validated.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub id: InvocationId,
    pub instruction: String,
    pub settings: LoopSettings,
}

impl Invocation {
    pub fn new(instruction: impl Into<String>, settings: LoopSettings) -> Result<Self, LoopError> {
        let instruction = instruction.into();
        if instruction.trim().is_empty() {
            return Err(LoopError::EmptyInstruction);
        }
        if !settings.unlimited && settings.max_iterations == 0 {
            return Err(LoopError::InvalidLimit { value: 0 });
        }

        Ok(Self {
            id: InvocationId::new(),
            instruction,
            settings,
        })
    }
}
