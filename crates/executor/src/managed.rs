//! On/off switch around the process-wide executor.
//!
//! The gateway's `/start_service` and `/stop_service` flip the switch; running
//! invocations see the change at their next availability check.

use async_trait::async_trait;
use cmdloop_core::error::ExecutorError;
use cmdloop_core::executor::{CommandExecutor, CommandOutput};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

pub struct ManagedExecutor {
    inner: Arc<dyn CommandExecutor>,
    online: AtomicBool,
}

impl ManagedExecutor {
    pub fn new(inner: Arc<dyn CommandExecutor>, start_online: bool) -> Self {
        Self {
            inner,
            online: AtomicBool::new(start_online),
        }
    }

    /// Bring the executor online. Returns whether the backend answered its health check.
    pub async fn start(&self) -> bool {
        self.online.store(true, Ordering::SeqCst);
        let healthy = self.inner.is_available().await;
        info!(executor = %self.inner.name(), healthy, "Executor started");
        healthy
    }

    pub fn stop(&self) {
        self.online.store(false, Ordering::SeqCst);
        info!(executor = %self.inner.name(), "Executor stopped");
    }

    /// The switch position, regardless of backend health.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandExecutor for ManagedExecutor {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn is_available(&self) -> bool {
        self.is_online() && self.inner.is_available().await
    }

    async fn run(&self, command: &str) -> Result<CommandOutput, ExecutorError> {
        if !self.is_online() {
            return Err(ExecutorError::Offline("service stopped".into()));
        }
        self.inner.run(command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoExecutor;

    #[async_trait]
    impl CommandExecutor for EchoExecutor {
        fn name(&self) -> &str {
            "echo"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn run(&self, command: &str) -> Result<CommandOutput, ExecutorError> {
            Ok(CommandOutput::success(command))
        }
    }

    #[tokio::test]
    async fn stopped_executor_refuses_commands() {
        let managed = ManagedExecutor::new(Arc::new(EchoExecutor), false);
        assert!(!managed.is_available().await);
        assert!(matches!(managed.run("ls").await, Err(ExecutorError::Offline(_))));
    }

    #[tokio::test]
    async fn start_and_stop_toggle_availability() {
        let managed = ManagedExecutor::new(Arc::new(EchoExecutor), false);
        assert!(managed.start().await);
        assert!(managed.is_available().await);
        assert_eq!(managed.run("ls").await.unwrap().output, "ls");

        managed.stop();
        assert!(!managed.is_online());
        assert!(!managed.is_available().await);
    }
}
