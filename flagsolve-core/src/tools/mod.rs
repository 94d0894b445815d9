//! Tool integration: shell adapter and tool schema definitions

pub mod shell;

pub use shell::ShellTool;

use crate::agents::AgentRegistry;
use crate::providers::ToolDefinition;
use serde_json::json;

/// Name of the shell execution tool
pub const SHELL_TOOL: &str = "shell";

/// Name of the delegation tool
pub const DELEGATE_TOOL: &str = "delegate";

/// Schema for the shell tool
pub fn shell_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: SHELL_TOOL.to_string(),
        description: "Execute a shell command in an isolated Kali Linux sandbox with \
                      pentesting tools installed (nmap, sqlmap, nikto, gobuster, curl). \
                      Returns combined stdout/stderr and the exit code. Always bound \
                      blocking network commands with a timeout (e.g. 'nc -w 5 ...')."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute (e.g., 'nmap -sV 10.0.0.5')"
                },
                "reason": {
                    "type": "string",
                    "description": "Brief explanation of what this command does, shown to the operator in real-time"
                }
            },
            "required": ["command"]
        }),
    }
}

/// Schema for the delegate tool, enumerating the registered specialists
pub fn delegate_tool_definition(registry: &AgentRegistry) -> ToolDefinition {
    let mut description = String::from(
        "Delegate a sub-task to a specialist agent with its own sandbox access \
         and step budget. Returns the specialist's summarized findings.\n\
         Available specialists:\n",
    );
    for definition in registry.all() {
        description.push_str(&format!(
            "- '{}': {}\n",
            definition.name, definition.description
        ));
    }

    ToolDefinition {
        name: DELEGATE_TOOL.to_string(),
        description,
        parameters: json!({
            "type": "object",
            "properties": {
                "agent": {
                    "type": "string",
                    "enum": registry.names(),
                    "description": "Name of the specialist to delegate to"
                },
                "task": {
                    "type": "string",
                    "description": "Self-contained description of the sub-task, including the target and any findings the specialist needs"
                }
            },
            "required": ["agent", "task"]
        }),
    }
}
