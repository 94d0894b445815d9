//! Orchestration loop: drives the coordinator's reasoning-action cycle

use std::sync::Arc;

use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::SolverConfig;
use crate::conversation::{Message, ToolResult, COORDINATOR};
use crate::events::{truncate_display, EventMux, RenderSink, DISPLAY_TRUNCATE_LEN};
use crate::providers::{CompletionRequest, LlmProvider, ToolDefinition};
use crate::sandbox::{SandboxDriver, SandboxManager, SandboxStatus};
use crate::state::{HistoryStore, Metrics};
use crate::tools::{
    delegate_tool_definition, shell_tool_definition, ShellTool, DELEGATE_TOOL, SHELL_TOOL,
};
use crate::Result;

use super::{AgentRegistry, DelegationRouter, Prompts, StepBudget};

/// How a coordinator turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The coordinator produced a final answer
    Completed { reply: String },
    /// The turn's step budget ran out; partial progress is reported
    BudgetExhausted { partial: String },
    /// The operator cancelled the turn; session state is preserved
    Cancelled,
}

/// Coordinator loop for one session.
///
/// Owns the conversation history and every collaborator the loop needs; all
/// of them are passed in explicitly so tests can substitute fakes.
pub struct Orchestrator {
    session_id: String,
    history: Vec<Message>,
    provider: Arc<dyn LlmProvider>,
    sandbox: Arc<SandboxManager>,
    shell: Arc<ShellTool>,
    router: DelegationRouter,
    registry: Arc<AgentRegistry>,
    store: Arc<dyn HistoryStore>,
    mux: EventMux,
    system_prompt: String,
    step_limit: u32,
    allowed_tools: Vec<String>,
    /// Cumulative reasoning steps across all turns of this session
    steps_total: u64,
}

impl Orchestrator {
    /// Build an orchestrator with the default specialist roster.
    ///
    /// Resumes the session's history from the store if it exists.
    pub fn new(
        session_id: impl Into<String>,
        config: &SolverConfig,
        prompts: &Prompts,
        provider: Arc<dyn LlmProvider>,
        driver: Arc<dyn SandboxDriver>,
        store: Arc<dyn HistoryStore>,
        sink: Arc<dyn RenderSink>,
    ) -> Result<Self> {
        let registry = Arc::new(super::default_specialists(prompts, config));
        Self::with_registry(
            session_id, config, prompts, provider, driver, store, sink, registry,
        )
    }

    /// Build an orchestrator with a custom specialist registry
    #[allow(clippy::too_many_arguments)]
    pub fn with_registry(
        session_id: impl Into<String>,
        config: &SolverConfig,
        prompts: &Prompts,
        provider: Arc<dyn LlmProvider>,
        driver: Arc<dyn SandboxDriver>,
        store: Arc<dyn HistoryStore>,
        sink: Arc<dyn RenderSink>,
        registry: Arc<AgentRegistry>,
    ) -> Result<Self> {
        let session_id = session_id.into();
        let history = store.load(&session_id)?;
        if !history.is_empty() {
            info!(
                "Resumed session '{}' with {} messages",
                session_id,
                history.len()
            );
        }

        let sandbox = Arc::new(SandboxManager::new(
            driver,
            Duration::from_secs(config.sandbox.command_timeout_secs),
        ));
        let shell = Arc::new(ShellTool::new(
            sandbox.clone(),
            provider.metrics().clone(),
        ));
        let mux = EventMux::new(sink);
        let router = DelegationRouter::new(
            registry.clone(),
            provider.clone(),
            shell.clone(),
            mux.clone(),
        );

        Ok(Self {
            session_id,
            history,
            provider,
            sandbox,
            shell,
            router,
            registry,
            store,
            mux,
            system_prompt: prompts.coordinator.prompt.clone(),
            step_limit: config.budgets.coordinator_steps,
            allowed_tools: config.budgets.coordinator_tools.clone(),
            steps_total: 0,
        })
    }

    /// Process one operator input to a terminal outcome.
    ///
    /// The loop is strictly sequential: each iteration's model call, tool
    /// dispatch and budget check complete before the next begins. The model
    /// and tool calls are the only suspension points; both observe `cancel`,
    /// and a cancelled iteration leaves no partial step in history.
    pub async fn run_turn(
        &mut self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome> {
        self.history.push(Message::user(input));
        self.persist();

        let mut budget = StepBudget::new(COORDINATOR, self.step_limit);
        let mut partial: Vec<String> = Vec::new();

        loop {
            if cancel.is_cancelled() {
                return Ok(TurnOutcome::Cancelled);
            }

            if !budget.try_consume() {
                self.mux.warning(format!(
                    "Step limit ({}) reached. Say 'continue' to resume.",
                    self.step_limit
                ));
                return Ok(TurnOutcome::BudgetExhausted {
                    partial: Self::partial_summary(&partial),
                });
            }
            self.steps_total += 1;

            let request = CompletionRequest::new(self.history.clone())
                .with_system(&self.system_prompt)
                .with_tools(self.tool_definitions());

            let response = tokio::select! {
                _ = cancel.cancelled() => return Ok(TurnOutcome::Cancelled),
                response = self.provider.complete(request) => response?,
            };

            // Responding: final text, no further invocations
            if response.tool_calls.is_empty() {
                let reply = response.text.unwrap_or_default();
                let message = Message::agent_text(COORDINATOR, reply.clone());
                self.mux.emit_message(&message);
                self.history.push(message);
                self.persist();
                return Ok(TurnOutcome::Completed { reply });
            }

            // Stage the whole iteration; a cancelled iteration must leave
            // no partial step in history.
            let message = Message::agent_calls(
                COORDINATOR,
                response.text.clone(),
                response.tool_calls.clone(),
            );
            self.mux.emit_message(&message);
            if let Some(text) = &response.text {
                if !text.trim().is_empty() {
                    partial.push(text.clone());
                }
            }
            let mut staged = vec![message];

            for call in &response.tool_calls {
                let message = match call.name.as_str() {
                    DELEGATE_TOOL if self.tool_allowed(DELEGATE_TOOL) => {
                        let result = self.router.delegate(call, cancel).await;
                        if cancel.is_cancelled() {
                            return Ok(TurnOutcome::Cancelled);
                        }
                        partial.push(result.summary.clone());
                        Message::Delegation(result)
                    }
                    SHELL_TOOL if self.tool_allowed(SHELL_TOOL) => {
                        let result = tokio::select! {
                            _ = cancel.cancelled() => return Ok(TurnOutcome::Cancelled),
                            result = self.shell.invoke(call) => result,
                        };
                        partial.push(result.output.clone());
                        Message::Tool(result)
                    }
                    other => Message::Tool(ToolResult::rejected(
                        &call.id,
                        format!("Tool '{}' is not available to the coordinator", other),
                    )),
                };
                self.mux.emit_message(&message);
                staged.push(message);
            }

            self.history.extend(staged);
            self.persist();
        }
    }

    /// Tear down the session's sandbox. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        self.sandbox.release().await;
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn steps_total(&self) -> u64 {
        self.steps_total
    }

    pub fn metrics(&self) -> Metrics {
        self.provider.metrics().snapshot()
    }

    pub async fn sandbox_status(&self) -> SandboxStatus {
        self.sandbox.status().await
    }

    fn tool_allowed(&self, name: &str) -> bool {
        self.allowed_tools.iter().any(|t| t == name)
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions = Vec::new();
        if self.tool_allowed(SHELL_TOOL) {
            definitions.push(shell_tool_definition());
        }
        if self.tool_allowed(DELEGATE_TOOL) && !self.registry.is_empty() {
            definitions.push(delegate_tool_definition(&self.registry));
        }
        definitions
    }

    fn partial_summary(partial: &[String]) -> String {
        if partial.is_empty() {
            "No progress recorded before the step limit.".to_string()
        } else {
            truncate_display(&partial.join("\n---\n"), DISPLAY_TRUNCATE_LEN)
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.session_id, &self.history) {
            warn!("Failed to persist session '{}': {}", self.session_id, e);
        }
    }
}
