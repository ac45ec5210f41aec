//! The cmdloop controller.
//!
//! One invocation turns a user instruction into a bounded sequence of cycles:
//!
//! 1. **Stream** the session context to the model, forwarding every fragment
//! 2. **Extract** fenced shell blocks from the full response
//! 3. **Decide**: no blocks ends the invocation; propose-only mode emits the
//!    blocks and stops; otherwise run them
//! 4. **Execute** each command line in order through the executor
//! 5. **Feed back** the commands and their output as the next context
//!
//! The loop ends on an answer without commands, a propose-only stop, an
//! unavailable executor, the iteration limit, or the caller hanging up.

pub mod completion;
pub mod extract;
pub mod feedback;
pub mod invocation;
pub mod loop_runner;
pub mod stream_event;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use completion::CompletionDetector;
pub use extract::{CommandBlock, extract_command_blocks};
pub use feedback::{ExecutionSummary, compose_feedback};
pub use invocation::{Invocation, LoopError, LoopSettings};
pub use loop_runner::{AgentLoop, LoopOutcome};
pub use stream_event::{LoopEvent, WireFrame, ndjson_stream, to_ndjson_line};
