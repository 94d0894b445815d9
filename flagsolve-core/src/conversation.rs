//! Conversation history types shared by the orchestration loop and providers

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source identity of the coordinator agent
pub const COORDINATOR: &str = "coordinator";

/// A tool invocation requested by an agent's reasoning step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocationRequest {
    /// Correlation id linking this request to its eventual result
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolInvocationRequest {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
        }
    }

    /// Get a string argument by key
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }
}

/// Outcome category of a tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    /// Command ran and exited zero
    Success,
    /// Command ran but exited non-zero
    CommandFailure,
    /// Command exceeded its execution timeout
    Timeout,
    /// The sandbox itself was unreachable or failed to start
    Infrastructure,
    /// The request was denied (tool not in the agent's set, bad arguments)
    Rejected,
}

/// Result of a tool invocation, fed back to the requesting agent as data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Correlation id of the originating request
    pub id: String,
    pub success: bool,
    pub status: ToolStatus,
    /// Full output; never truncated here, only at the display boundary
    pub output: String,
    pub exit_code: Option<i64>,
}

impl ToolResult {
    pub fn success(id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: true,
            status: ToolStatus::Success,
            output: output.into(),
            exit_code: Some(0),
        }
    }

    pub fn failure(
        id: impl Into<String>,
        status: ToolStatus,
        output: impl Into<String>,
        exit_code: Option<i64>,
    ) -> Self {
        Self {
            id: id.into(),
            success: false,
            status,
            output: output.into(),
            exit_code,
        }
    }

    pub fn rejected(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::failure(id, ToolStatus::Rejected, reason, None)
    }
}

/// How a delegation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationOutcome {
    /// The sub-agent produced a final answer
    Completed,
    /// The sub-agent's step budget ran out; summary is best-effort
    BudgetExhausted,
    /// No specialist registered under the requested name
    NotFound,
    /// The sub-agent's loop hit an unrecoverable fault (e.g. provider error)
    Failed,
    /// The parent turn was cancelled while the delegation was in flight
    Cancelled,
}

/// Summary returned to the coordinator by a completed delegation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationResult {
    /// Correlation id of the delegate tool call
    pub id: String,
    /// Name of the specialist that handled (or was asked to handle) the task
    pub agent: String,
    pub outcome: DelegationOutcome,
    pub summary: String,
    pub steps_used: u32,
}

impl DelegationResult {
    /// Whether the coordinator should treat this as a successful tool call
    pub fn is_success(&self) -> bool {
        matches!(
            self.outcome,
            DelegationOutcome::Completed | DelegationOutcome::BudgetExhausted
        )
    }
}

/// A single turn unit in a conversation. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// Operator input
    User { text: String },
    /// An agent's reasoning step: free text, tool requests, or both
    Agent {
        /// Coordinator or named sub-agent that produced this step
        source: String,
        text: Option<String>,
        #[serde(default)]
        calls: Vec<ToolInvocationRequest>,
    },
    /// Result of a tool invocation
    Tool(ToolResult),
    /// Summary of a completed delegation
    Delegation(DelegationResult),
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User { text: text.into() }
    }

    pub fn agent_text(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Agent {
            source: source.into(),
            text: Some(text.into()),
            calls: vec![],
        }
    }

    pub fn agent_calls(
        source: impl Into<String>,
        text: Option<String>,
        calls: Vec<ToolInvocationRequest>,
    ) -> Self {
        Self::Agent {
            source: source.into(),
            text,
            calls,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invocation_request_correlation_ids_unique() {
        let a = ToolInvocationRequest::new("shell", json!({"command": "id"}));
        let b = ToolInvocationRequest::new("shell", json!({"command": "id"}));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_str_arg() {
        let req = ToolInvocationRequest::new("shell", json!({"command": "nmap -sV target"}));
        assert_eq!(req.str_arg("command"), Some("nmap -sV target"));
        assert_eq!(req.str_arg("missing"), None);
    }

    #[test]
    fn test_tool_result_constructors() {
        let ok = ToolResult::success("id-1", "output");
        assert!(ok.success);
        assert_eq!(ok.status, ToolStatus::Success);
        assert_eq!(ok.exit_code, Some(0));

        let failed = ToolResult::failure("id-2", ToolStatus::CommandFailure, "boom", Some(1));
        assert!(!failed.success);
        assert_eq!(failed.exit_code, Some(1));

        let rejected = ToolResult::rejected("id-3", "tool not available");
        assert_eq!(rejected.status, ToolStatus::Rejected);
        assert!(rejected.exit_code.is_none());
    }

    #[test]
    fn test_message_roundtrip() {
        let messages = vec![
            Message::user("solve http://10.0.0.5"),
            Message::agent_calls(
                COORDINATOR,
                Some("Starting with a port scan.".to_string()),
                vec![ToolInvocationRequest::new(
                    "shell",
                    json!({"command": "nmap -p- 10.0.0.5"}),
                )],
            ),
            Message::Tool(ToolResult::success("abc", "22/tcp open ssh")),
            Message::Delegation(DelegationResult {
                id: "def".to_string(),
                agent: "recon-specialist".to_string(),
                outcome: DelegationOutcome::Completed,
                summary: "Found an admin panel at /admin".to_string(),
                steps_used: 4,
            }),
        ];

        let json = serde_json::to_string(&messages).expect("should serialize");
        let back: Vec<Message> = serde_json::from_str(&json).expect("should deserialize");
        assert_eq!(back.len(), 4);
        match &back[1] {
            Message::Agent { source, calls, .. } => {
                assert_eq!(source, COORDINATOR);
                assert_eq!(calls.len(), 1);
            }
            other => panic!("expected agent message, got {:?}", other),
        }
    }

    #[test]
    fn test_delegation_is_success() {
        let mut result = DelegationResult {
            id: "x".to_string(),
            agent: "recon-specialist".to_string(),
            outcome: DelegationOutcome::Completed,
            summary: String::new(),
            steps_used: 1,
        };
        assert!(result.is_success());
        result.outcome = DelegationOutcome::BudgetExhausted;
        assert!(result.is_success());
        result.outcome = DelegationOutcome::NotFound;
        assert!(!result.is_success());
    }
}
