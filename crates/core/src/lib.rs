//! # cmdloop core
//!
//! Domain types, traits, and error definitions for the cmdloop command agent.
//! It has no HTTP dependencies and uses tokio only for the `mpsc` channel that
//! carries streamed model output. It defines the two collaborator seams the
//! loop controller drives, plus the values that flow across them.
//!
//! - [`Provider`] streams model text for a prompt (the "brain").
//! - [`CommandExecutor`] runs one shell-like command string (the "body").
//!
//! Implementations live in `cmdloop-providers` and `cmdloop-executor`.

pub mod error;
pub mod executor;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ExecutorError, ProviderError, Result};
pub use executor::{CommandExecutor, CommandOutput};
pub use message::{InvocationId, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
