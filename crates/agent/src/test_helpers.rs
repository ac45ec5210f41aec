//! Shared mocks for loop tests.

use async_trait::async_trait;
use cmdloop_core::error::{ExecutorError, ProviderError};
use cmdloop_core::executor::{CommandExecutor, CommandOutput};
use cmdloop_core::message::Message;
use cmdloop_core::provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::stream_event::LoopEvent;

/// One scripted model turn.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Streamed as the given fragments, then a final `done` chunk.
    Text(Vec<String>),
    /// `stream()` itself fails.
    Unreachable,
    /// Sends the fragments, then breaks with a stream error.
    BreaksAfter(Vec<String>),
}

impl Reply {
    pub fn text(s: &str) -> Self {
        Self::Text(vec![s.to_string()])
    }
}

/// A provider that plays back scripted replies in order.
///
/// Once the script runs out, the last reply repeats.
pub struct ScriptedProvider {
    replies: Vec<Reply>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(text: &str) -> Self {
        Self::new(vec![Reply::text(text)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The user-message content sent on each call.
    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| r.messages.last().map(|m| m.content.clone()))
            .collect()
    }

    fn next_reply(&self, request: ProviderRequest) -> Reply {
        let mut requests = self.requests.lock().unwrap();
        let index = requests.len().min(self.replies.len() - 1);
        requests.push(request);
        self.replies[index].clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match self.next_reply(request) {
            Reply::Text(parts) => Ok(ProviderResponse {
                message: Message::assistant(parts.concat()),
                usage: None,
                model: "mock-model".into(),
            }),
            _ => Err(ProviderError::Network("scripted failure".into())),
        }
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let (parts, breaks) = match self.next_reply(request) {
            Reply::Text(parts) => (parts, false),
            Reply::BreaksAfter(parts) => (parts, true),
            Reply::Unreachable => return Err(ProviderError::Network("connection refused".into())),
        };

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            for part in parts {
                let chunk = StreamChunk {
                    content: Some(part),
                    done: false,
                    usage: None,
                };
                if tx.send(Ok(chunk)).await.is_err() {
                    return;
                }
            }
            let last = if breaks {
                Err(ProviderError::StreamInterrupted("connection reset".into()))
            } else {
                Ok(StreamChunk {
                    content: None,
                    done: true,
                    usage: None,
                })
            };
            let _ = tx.send(last).await;
        });
        Ok(rx)
    }
}

/// An executor that records every command and answers from a lookup table.
pub struct RecordingExecutor {
    available: AtomicBool,
    outputs: HashMap<String, String>,
    hang: bool,
    commands: Mutex<Vec<String>>,
    abandoned: Arc<AtomicBool>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            outputs: HashMap::new(),
            hang: false,
            commands: Mutex::new(Vec::new()),
            abandoned: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_output(mut self, command: &str, output: &str) -> Self {
        self.outputs.insert(command.to_string(), output.to_string());
        self
    }

    pub fn offline(self) -> Self {
        self.available.store(false, Ordering::SeqCst);
        self
    }

    /// Every `run` blocks until its future is dropped.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Whether a running command was abandoned mid-flight.
    pub fn was_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::SeqCst)
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CommandExecutor for RecordingExecutor {
    fn name(&self) -> &str {
        "recording"
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn run(&self, command: &str) -> Result<CommandOutput, ExecutorError> {
        self.commands.lock().unwrap().push(command.to_string());

        if self.hang {
            let flag = DropFlag(self.abandoned.clone());
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            std::mem::forget(flag);
        }

        match self.outputs.get(command) {
            Some(out) if out.starts_with("ERR:") => Err(ExecutorError::SpawnFailed {
                command: command.to_string(),
                reason: out.trim_start_matches("ERR:").to_string(),
            }),
            Some(out) => Ok(CommandOutput::success(out.clone())),
            None => Ok(CommandOutput::success(format!("ran {command}"))),
        }
    }
}

/// Drain a receiver to the end.
pub async fn collect_events(mut rx: mpsc::Receiver<LoopEvent>) -> Vec<LoopEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

pub fn chunks(events: &[LoopEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            LoopEvent::Chunk(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}
