//! The loop controller: think, propose commands, execute, feed results back.

use std::sync::Arc;

use cmdloop_core::executor::CommandExecutor;
use cmdloop_core::message::Message;
use cmdloop_core::provider::{Provider, ProviderRequest};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::completion::CompletionDetector;
use crate::extract::{CommandBlock, extract_command_blocks};
use crate::feedback::{ExecutionSummary, compose_feedback};
use crate::invocation::Invocation;
use crate::stream_event::LoopEvent;

pub const COMPLETION_MARKER: &str = "\n✅ Task completed by the agent!\n";
pub const EXECUTOR_OFFLINE_WARNING: &str = "\n⚠️ Executor offline - commands not executed\n";

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    /// The model answered without commands; `completed` if it said so.
    Done { completed: bool },
    /// Auto-execute was off; this many blocks were proposed.
    AwaitingUser { proposals: usize },
    LimitReached { limit: u32 },
    ExecutorUnavailable,
    /// The caller stopped listening.
    Cancelled,
}

/// The receiver went away.
struct Cancelled;

/// Drives invocations against a model provider and an optional executor.
///
/// Cheap to clone; every invocation gets its own state, so one `AgentLoop`
/// serves any number of concurrent callers.
#[derive(Clone)]
pub struct AgentLoop {
    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    /// Runs extracted commands; `None` means every auto-executed block is refused
    executor: Option<Arc<dyn CommandExecutor>>,

    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    system_prompt: Option<String>,
    detector: CompletionDetector,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            executor: None,
            model: model.into(),
            temperature,
            max_tokens: None,
            system_prompt: None,
            detector: CompletionDetector::default(),
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.system_prompt = (!prompt.trim().is_empty()).then_some(prompt);
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_completion_phrases<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.detector = CompletionDetector::new(phrases);
        self
    }

    /// Start an invocation in the background and return its event stream.
    ///
    /// Dropping the receiver cancels the invocation, including any model
    /// stream or command in flight.
    pub fn run_stream(&self, invocation: Invocation) -> mpsc::Receiver<LoopEvent> {
        let (tx, rx) = mpsc::channel(128);
        let agent = self.clone();

        tokio::spawn(async move {
            let id = invocation.id.clone();
            let outcome = agent.run(invocation, &tx).await;
            debug!(invocation_id = %id, ?outcome, "Invocation task finished");
        });

        rx
    }

    /// Run an invocation to its end, writing events to `tx`.
    pub async fn run(&self, invocation: Invocation, tx: &mpsc::Sender<LoopEvent>) -> LoopOutcome {
        let id = invocation.id.clone();
        let outcome = self.drive(invocation, tx).await.unwrap_or(LoopOutcome::Cancelled);
        info!(invocation_id = %id, ?outcome, "Invocation ended");
        outcome
    }

    async fn drive(&self, invocation: Invocation, tx: &mpsc::Sender<LoopEvent>) -> Result<LoopOutcome, Cancelled> {
        let Invocation {
            id,
            instruction,
            settings,
        } = invocation;
        let limit = settings.effective_limit();
        let limit_label = settings.limit_label();

        info!(
            invocation_id = %id,
            limit,
            unlimited = settings.unlimited,
            auto_execute = settings.auto_execute,
            "Starting invocation"
        );

        let mut context = instruction.clone();
        let mut iteration: u32 = 0;

        while iteration < limit {
            iteration += 1;
            debug!(invocation_id = %id, iteration, "Loop iteration");

            if iteration > 1 {
                emit(tx, LoopEvent::Chunk(iteration_marker(iteration, &limit_label))).await?;
            }

            let response = self.stream_response(&context, tx).await?;
            let blocks = extract_command_blocks(&response);

            if blocks.is_empty() {
                let completed = self.detector.is_complete(&response);
                if completed {
                    emit(tx, LoopEvent::Chunk(COMPLETION_MARKER.into())).await?;
                }
                emit(tx, LoopEvent::Done { completed }).await?;
                return Ok(LoopOutcome::Done { completed });
            }

            if !settings.auto_execute {
                for block in &blocks {
                    emit(tx, LoopEvent::Proposal(block.raw.clone())).await?;
                }
                info!(invocation_id = %id, proposals = blocks.len(), "Awaiting user approval");
                return Ok(LoopOutcome::AwaitingUser {
                    proposals: blocks.len(),
                });
            }

            let Some(executor) = self.available_executor(tx).await? else {
                warn!(invocation_id = %id, iteration, "Executor unavailable, stopping");
                emit(tx, LoopEvent::Chunk(EXECUTOR_OFFLINE_WARNING.into())).await?;
                emit(tx, LoopEvent::ExecutorUnavailable).await?;
                return Ok(LoopOutcome::ExecutorUnavailable);
            };

            let summary = execute_blocks(executor, &blocks, tx).await?;
            context = compose_feedback(&instruction, iteration, summary);
        }

        warn!(invocation_id = %id, limit, "Iteration limit reached");
        emit(tx, LoopEvent::Chunk(format!("\n⚠️ Limit of {limit} iterations reached.\n"))).await?;
        emit(tx, LoopEvent::LimitReached { iterations: limit }).await?;
        Ok(LoopOutcome::LimitReached { limit })
    }

    fn request_for(&self, context: &str) -> ProviderRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(prompt) = &self.system_prompt {
            messages.push(Message::system(prompt));
        }
        messages.push(Message::user(context));

        ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: true,
        }
    }

    /// Stream one model response, forwarding every fragment as it arrives.
    ///
    /// A provider failure yields an empty response.
    async fn stream_response(&self, context: &str, tx: &mpsc::Sender<LoopEvent>) -> Result<String, Cancelled> {
        let request = self.request_for(context);

        let started = tokio::select! {
            biased;
            _ = tx.closed() => return Err(Cancelled),
            started = self.provider.stream(request) => started,
        };

        let mut stream_rx = match started {
            Ok(rx) => rx,
            Err(e) => {
                warn!(provider = %self.provider.name(), error = %e, "Model stream failed to start");
                return Ok(String::new());
            }
        };

        let mut full_content = String::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = tx.closed() => return Err(Cancelled),
                next = stream_rx.recv() => next,
            };

            match next {
                None => break,
                Some(Ok(chunk)) => {
                    if let Some(text) = chunk.content
                        && !text.is_empty()
                    {
                        full_content.push_str(&text);
                        emit(tx, LoopEvent::Chunk(text)).await?;
                    }
                    if chunk.done {
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!(provider = %self.provider.name(), error = %e, "Model stream broke, discarding response");
                    return Ok(String::new());
                }
            }
        }

        Ok(full_content)
    }

    async fn available_executor(
        &self,
        tx: &mpsc::Sender<LoopEvent>,
    ) -> Result<Option<&Arc<dyn CommandExecutor>>, Cancelled> {
        let Some(executor) = &self.executor else {
            return Ok(None);
        };

        let available = tokio::select! {
            biased;
            _ = tx.closed() => return Err(Cancelled),
            available = executor.is_available() => available,
        };

        Ok(available.then_some(executor))
    }
}

/// Run every command of every block in order, one at a time.
///
/// A failing command only contributes its error text; nothing aborts early.
async fn execute_blocks(
    executor: &Arc<dyn CommandExecutor>,
    blocks: &[CommandBlock],
    tx: &mpsc::Sender<LoopEvent>,
) -> Result<ExecutionSummary, Cancelled> {
    let mut summary = ExecutionSummary::new();

    for command in blocks.iter().flat_map(|b| b.commands.iter()) {
        emit(tx, LoopEvent::Chunk(format!("🔧 Executing: {command}\n"))).await?;

        // Dropping the run future abandons the command.
        let result = tokio::select! {
            biased;
            _ = tx.closed() => return Err(Cancelled),
            result = executor.run_to_text(command) => result,
        };

        debug!(command = %command, bytes = result.len(), "Command finished");
        emit(tx, LoopEvent::Chunk(format!("{result}\n\n"))).await?;
        summary.record(command.as_str(), result);
    }

    Ok(summary)
}

fn iteration_marker(iteration: u32, limit_label: &str) -> String {
    let rule = "=".repeat(60);
    format!("\n\n{rule}\n🔄 Iteration {iteration}/{limit_label}\n{rule}\n\n")
}

async fn emit(tx: &mpsc::Sender<LoopEvent>, event: LoopEvent) -> Result<(), Cancelled> {
    tx.send(event).await.map_err(|_| Cancelled)
}
