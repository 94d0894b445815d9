//! Remote sandbox capability consumed by the session manager

use async_trait::async_trait;
use tokio::time::Duration;

use crate::Result;

/// Output of one command execution inside the sandbox
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    /// Set when the command was cut off by the execution timeout
    pub timed_out: bool,
}

impl ExecOutput {
    /// Check if the command succeeded
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Get combined output
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }

    /// Output representing a command cut off after `timeout`
    pub fn from_timeout(partial_stdout: String, timeout: Duration) -> Self {
        Self {
            exit_code: -1,
            stdout: partial_stdout,
            stderr: format!("Command timed out after {} seconds", timeout.as_secs()),
            timed_out: true,
        }
    }
}

/// Remote execution environment: create, run commands, destroy.
///
/// Implementations own the transport; callers own handle bookkeeping.
#[async_trait]
pub trait SandboxDriver: Send + Sync {
    /// Allocate a new environment and return its handle id
    async fn create(&self) -> Result<String>;

    /// Run a shell command in the environment identified by `handle`
    async fn run(&self, handle: &str, command: &str, timeout: Duration) -> Result<ExecOutput>;

    /// Tear down the environment. Destroying an unknown handle is a no-op.
    async fn destroy(&self, handle: &str) -> Result<()>;
}
