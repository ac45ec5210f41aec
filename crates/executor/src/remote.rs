//! Remote executor: forwards commands to an execution engine over HTTP.
//!
//! The engine exposes:
//! - `GET  {base}/health` → `{"alive": true}` or `{"status": "ok"}`
//! - `POST {base}/api/command` with `{"command": "..."}` →
//!   `{"stdout", "stderr", "return_code", "success"}`

use async_trait::async_trait;
use cmdloop_core::error::ExecutorError;
use cmdloop_core::executor::{CommandExecutor, CommandOutput};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub struct RemoteExecutor {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl RemoteExecutor {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Serialize)]
struct CommandRequest<'a> {
    command: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct CommandResponse {
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    #[serde(default)]
    return_code: Option<i32>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    alive: bool,
    #[serde(default)]
    status: Option<String>,
}

impl CommandResponse {
    fn into_output(self) -> CommandOutput {
        let success = self
            .success
            .unwrap_or_else(|| self.return_code.unwrap_or(0) == 0);

        if let Some(err) = self.error.filter(|e| !e.is_empty()) {
            return CommandOutput::failure(self.return_code, err);
        }

        if success {
            let text = if self.stderr.is_empty() {
                self.stdout
            } else {
                format!("{}\n[stderr]: {}", self.stdout, self.stderr)
            };
            CommandOutput {
                success: true,
                exit_code: self.return_code.or(Some(0)),
                output: text.trim().to_string(),
            }
        } else {
            let code = self.return_code.unwrap_or(-1);
            let text = format!("[exit code: {code}]\n{}\n{}", self.stdout, self.stderr);
            CommandOutput::failure(self.return_code, text.trim())
        }
    }
}

#[async_trait]
impl CommandExecutor for RemoteExecutor {
    fn name(&self) -> &str {
        "remote"
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        let response = match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!(url = %url, status = r.status().as_u16(), "Remote executor unhealthy");
                return false;
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Remote executor unreachable");
                return false;
            }
        };

        match response.json::<HealthResponse>().await {
            Ok(health) => health.alive || health.status.as_deref() == Some("ok"),
            Err(_) => false,
        }
    }

    async fn run(&self, command: &str) -> Result<CommandOutput, ExecutorError> {
        let url = format!("{}/api/command", self.base_url);
        debug!(url = %url, command = %command, "Forwarding command to remote executor");

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&CommandRequest { command })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExecutorError::Timeout {
                        command: command.to_string(),
                        timeout_secs: self.timeout.as_secs(),
                    }
                } else if e.is_connect() {
                    ExecutorError::Offline(e.to_string())
                } else {
                    ExecutorError::Remote(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Remote executor returned error");
            return Err(ExecutorError::Remote(format!("HTTP {}: {body}", status.as_u16())));
        }

        let parsed: CommandResponse = response
            .json()
            .await
            .map_err(|e| ExecutorError::Remote(format!("Invalid response: {e}")))?;

        Ok(parsed.into_output())
    }
}
