//! Command executors for cmdloop.
//!
//! All executors implement `cmdloop_core::CommandExecutor`. The process runs
//! at most one of them, wrapped in a [`ManagedExecutor`] so it can be
//! switched on and off at runtime.

pub mod managed;
pub mod remote;
pub mod shell;

pub use managed::ManagedExecutor;
pub use remote::RemoteExecutor;
pub use shell::ShellExecutor;

use cmdloop_config::{ExecutorConfig, ExecutorKind};
use std::sync::Arc;
use std::time::Duration;

/// Build the process-wide executor from configuration.
///
/// Returns `None` for `kind = "none"`, in which case auto-executed
/// invocations end with an executor-unavailable warning.
pub fn build_from_config(config: &ExecutorConfig) -> Option<Arc<ManagedExecutor>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let inner: Arc<dyn cmdloop_core::CommandExecutor> = match config.kind {
        ExecutorKind::Shell => Arc::new(ShellExecutor::new(config.allowed_commands.clone(), timeout)),
        ExecutorKind::Remote => Arc::new(RemoteExecutor::new(&config.remote_url, timeout)),
        ExecutorKind::None => return None,
    };
    Some(Arc::new(ManagedExecutor::new(inner, config.start_online)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdloop_core::CommandExecutor;

    #[test]
    fn none_kind_builds_nothing() {
        let config = ExecutorConfig {
            kind: ExecutorKind::None,
            ..Default::default()
        };
        assert!(build_from_config(&config).is_none());
    }

    #[test]
    fn remote_kind_builds_remote_executor() {
        let config = ExecutorConfig {
            kind: ExecutorKind::Remote,
            start_online: false,
            ..Default::default()
        };
        let executor = build_from_config(&config).unwrap();
        assert_eq!(executor.name(), "remote");
        assert!(!executor.is_online());
    }

    #[test]
    fn default_config_builds_online_shell() {
        let executor = build_from_config(&ExecutorConfig::default()).unwrap();
        assert_eq!(executor.name(), "shell");
        assert!(executor.is_online());
    }
}
