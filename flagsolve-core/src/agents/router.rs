//! Delegation router: runs specialist sub-agents in isolation

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::conversation::{
    DelegationOutcome, DelegationResult, Message, ToolInvocationRequest, ToolResult,
};
use crate::events::{truncate_display, EventMux, DISPLAY_TRUNCATE_LEN};
use crate::providers::{CompletionRequest, LlmProvider, ToolDefinition};
use crate::tools::{shell_tool_definition, ShellTool, SHELL_TOOL};

use super::{AgentDefinition, AgentRegistry, StepBudget};

/// Routes delegated sub-tasks to specialist agents.
///
/// Each delegation drives an isolated reasoning-action loop: fresh history
/// seeded with the specialist's prompt, its own step budget, and only its
/// assigned tools. Intermediate traffic goes to the event multiplexer for
/// the operator; the coordinator only ever sees the returned summary.
pub struct DelegationRouter {
    registry: Arc<AgentRegistry>,
    provider: Arc<dyn LlmProvider>,
    shell: Arc<ShellTool>,
    mux: EventMux,
}

impl DelegationRouter {
    pub fn new(
        registry: Arc<AgentRegistry>,
        provider: Arc<dyn LlmProvider>,
        shell: Arc<ShellTool>,
        mux: EventMux,
    ) -> Self {
        Self {
            registry,
            provider,
            shell,
            mux,
        }
    }

    /// Execute a delegate tool call to completion or budget exhaustion.
    ///
    /// Never returns a fault to the coordinator: unknown specialists, bad
    /// arguments and provider errors all come back as a failed
    /// [`DelegationResult`] the coordinator can reason about.
    pub async fn delegate(
        &self,
        call: &ToolInvocationRequest,
        cancel: &CancellationToken,
    ) -> DelegationResult {
        let requested = call.str_arg("agent").unwrap_or_default().to_string();

        let Some(task) = call.str_arg("task") else {
            return DelegationResult {
                id: call.id.clone(),
                agent: requested,
                outcome: DelegationOutcome::NotFound,
                summary: "Missing required 'task' argument".to_string(),
                steps_used: 0,
            };
        };

        let Some(definition) = self.registry.resolve(&requested) else {
            warn!("Delegation to unknown specialist: '{}'", requested);
            return DelegationResult {
                id: call.id.clone(),
                agent: requested.clone(),
                outcome: DelegationOutcome::NotFound,
                summary: format!(
                    "No specialist named '{}'. Available: {}",
                    requested,
                    self.registry.names().join(", ")
                ),
                steps_used: 0,
            };
        };

        info!("Delegating to '{}': {}", definition.name, task);
        self.run_sub_agent(&call.id, &definition, task, cancel)
            .await
    }

    /// Drive the specialist's own reasoning-action loop
    async fn run_sub_agent(
        &self,
        correlation_id: &str,
        definition: &AgentDefinition,
        task: &str,
        cancel: &CancellationToken,
    ) -> DelegationResult {
        let mut history = vec![Message::user(task)];
        let mut budget = StepBudget::new(&definition.name, definition.step_limit);
        // Text the specialist produced along the way; the source of the
        // best-effort summary if the budget runs out.
        let mut transcript: Vec<String> = Vec::new();

        let result = |outcome, summary, budget: &StepBudget| DelegationResult {
            id: correlation_id.to_string(),
            agent: definition.name.clone(),
            outcome,
            summary,
            steps_used: budget.consumed(),
        };

        loop {
            if cancel.is_cancelled() {
                return result(
                    DelegationOutcome::Cancelled,
                    "Delegation cancelled".to_string(),
                    &budget,
                );
            }

            if !budget.try_consume() {
                debug!(
                    "Specialist '{}' exhausted its {} steps",
                    definition.name,
                    budget.limit()
                );
                return result(
                    DelegationOutcome::BudgetExhausted,
                    Self::best_effort_summary(definition, &transcript, budget.limit()),
                    &budget,
                );
            }

            let request = CompletionRequest::new(history.clone())
                .with_system(&definition.system_prompt)
                .with_model(definition.model.clone())
                .with_tools(self.tool_definitions(definition));

            let response = tokio::select! {
                _ = cancel.cancelled() => {
                    return result(
                        DelegationOutcome::Cancelled,
                        "Delegation cancelled".to_string(),
                        &budget,
                    );
                }
                response = self.provider.complete(request) => match response {
                    Ok(response) => response,
                    Err(e) => {
                        warn!("Specialist '{}' provider call failed: {}", definition.name, e);
                        return result(
                            DelegationOutcome::Failed,
                            format!("Specialist failed: {}", e),
                            &budget,
                        );
                    }
                },
            };

            if response.tool_calls.is_empty() {
                let text = response.text.unwrap_or_default();
                let message = Message::agent_text(definition.name.as_str(), text.clone());
                self.mux.emit_message(&message);
                return result(DelegationOutcome::Completed, text, &budget);
            }

            let message = Message::agent_calls(
                definition.name.as_str(),
                response.text.clone(),
                response.tool_calls.clone(),
            );
            self.mux.emit_message(&message);
            if let Some(text) = response.text {
                if !text.trim().is_empty() {
                    transcript.push(text);
                }
            }
            history.push(message);

            for call in &response.tool_calls {
                let tool_result = self.dispatch(definition, call, cancel).await;
                if cancel.is_cancelled() {
                    return result(
                        DelegationOutcome::Cancelled,
                        "Delegation cancelled".to_string(),
                        &budget,
                    );
                }
                let message = Message::Tool(tool_result);
                self.mux.emit_message(&message);
                history.push(message);
            }
        }
    }

    /// Run one tool call for the specialist, rejecting anything outside its set
    async fn dispatch(
        &self,
        definition: &AgentDefinition,
        call: &ToolInvocationRequest,
        cancel: &CancellationToken,
    ) -> ToolResult {
        if !definition.allows_tool(&call.name) {
            return ToolResult::rejected(
                &call.id,
                format!(
                    "Tool '{}' is not available to '{}'. Allowed tools: {}",
                    call.name,
                    definition.name,
                    definition.tools.join(", ")
                ),
            );
        }

        match call.name.as_str() {
            SHELL_TOOL => {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        ToolResult::rejected(&call.id, "Cancelled")
                    }
                    result = self.shell.invoke(call) => result,
                }
            }
            other => ToolResult::rejected(
                &call.id,
                format!("Tool '{}' has no adapter registered", other),
            ),
        }
    }

    fn tool_definitions(&self, definition: &AgentDefinition) -> Vec<ToolDefinition> {
        definition
            .tools
            .iter()
            .filter_map(|name| match name.as_str() {
                SHELL_TOOL => Some(shell_tool_definition()),
                _ => None,
            })
            .collect()
    }

    fn best_effort_summary(
        definition: &AgentDefinition,
        transcript: &[String],
        limit: u32,
    ) -> String {
        if transcript.is_empty() {
            format!(
                "'{}' exhausted its step budget ({}) before reporting findings.",
                definition.name, limit
            )
        } else {
            format!(
                "'{}' exhausted its step budget ({}). Findings so far:\n{}",
                definition.name,
                limit,
                truncate_display(&transcript.join("\n"), DISPLAY_TRUNCATE_LEN)
            )
        }
    }
}
