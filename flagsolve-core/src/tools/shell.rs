//! Shell tool adapter over the session sandbox

use std::sync::Arc;

use tracing::debug;

use crate::conversation::{ToolInvocationRequest, ToolResult, ToolStatus};
use crate::sandbox::SandboxManager;
use crate::state::MetricsTracker;

/// Shell tool that executes commands in the session's sandbox.
///
/// Every failure mode comes back as a [`ToolResult`] the calling agent can
/// reason about; this adapter never raises for command-level problems.
pub struct ShellTool {
    sandbox: Arc<SandboxManager>,
    metrics: MetricsTracker,
}

impl ShellTool {
    pub fn new(sandbox: Arc<SandboxManager>, metrics: MetricsTracker) -> Self {
        Self { sandbox, metrics }
    }

    /// Execute a shell invocation request and return its result as data.
    ///
    /// Distinguishes "the command failed" (`CommandFailure`, `Timeout`) from
    /// "the tool is broken" (`Infrastructure`) so the agent can decide
    /// between retrying and escalating.
    pub async fn invoke(&self, request: &ToolInvocationRequest) -> ToolResult {
        let Some(command) = request.str_arg("command") else {
            return ToolResult::rejected(&request.id, "Missing required 'command' argument");
        };

        debug!("Shell tool invoked: {}", command);
        self.metrics.record_tool_call();

        match self.sandbox.run_command(command).await {
            Ok(output) if output.timed_out => ToolResult::failure(
                &request.id,
                ToolStatus::Timeout,
                output.combined(),
                Some(output.exit_code),
            ),
            Ok(output) if output.exit_code == 0 => {
                let text = if output.combined().is_empty() {
                    "Command executed successfully (no output).".to_string()
                } else {
                    output.combined()
                };
                ToolResult::success(&request.id, text)
            }
            Ok(output) => ToolResult::failure(
                &request.id,
                ToolStatus::CommandFailure,
                format!(
                    "Exit {}:\n{}",
                    output.exit_code,
                    output.combined()
                ),
                Some(output.exit_code),
            ),
            Err(e) => ToolResult::failure(
                &request.id,
                ToolStatus::Infrastructure,
                format!("Sandbox execution error: {}", e),
                None,
            ),
        }
    }
}
