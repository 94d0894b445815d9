//! Specialist agent definitions and the registry that resolves them

use std::sync::Arc;

use crate::config::SolverConfig;
use crate::tools::SHELL_TOOL;

use super::Prompts;

/// Immutable configuration of a named specialist agent.
///
/// Read-only at run time; the delegation router instantiates a fresh loop
/// from this definition for every delegated task.
#[derive(Debug, Clone)]
pub struct AgentDefinition {
    pub name: String,
    /// Shown to the coordinator when choosing where to delegate
    pub description: String,
    pub system_prompt: String,
    /// Model override for this specialist; None inherits the provider default
    pub model: Option<String>,
    /// Tools this specialist may call; anything else is rejected back to it
    pub tools: Vec<String>,
    /// Reasoning-action iterations per delegated task
    pub step_limit: u32,
}

impl AgentDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
        step_limit: u32,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            system_prompt: system_prompt.into(),
            model: None,
            tools: vec![SHELL_TOOL.to_string()],
            step_limit,
        }
    }

    /// Bind a specific model to this specialist
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Replace the allowed tool set
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    /// Whether this specialist may call the named tool
    pub fn allows_tool(&self, tool: &str) -> bool {
        self.tools.iter().any(|t| t == tool)
    }
}

/// Registry of specialist agents, resolved by name at delegation time
#[derive(Default)]
pub struct AgentRegistry {
    agents: Vec<Arc<AgentDefinition>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a specialist. A later registration under the same name
    /// replaces the earlier one.
    pub fn register(&mut self, definition: AgentDefinition) {
        self.agents.retain(|a| a.name != definition.name);
        self.agents.push(Arc::new(definition));
    }

    /// Resolve a specialist by name
    pub fn resolve(&self, name: &str) -> Option<Arc<AgentDefinition>> {
        self.agents.iter().find(|a| a.name == name).cloned()
    }

    /// Registered specialist names, in registration order
    pub fn names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name.clone()).collect()
    }

    /// Iterate all registered definitions
    pub fn all(&self) -> impl Iterator<Item = &AgentDefinition> {
        self.agents.iter().map(|a| a.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }
}

/// Build the default specialist roster: reconnaissance and exploitation
pub fn default_specialists(prompts: &Prompts, config: &SolverConfig) -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    let step_limit = config.budgets.specialist_steps;
    let model = config.provider.specialist_model.clone();

    let mut recon = AgentDefinition::new(
        "recon-specialist",
        "Network scanning, port enumeration, directory busting and web \
         vulnerability scanning",
        &prompts.recon.prompt,
        step_limit,
    );
    if let Some(ref model) = model {
        recon = recon.with_model(model);
    }
    registry.register(recon);

    let mut exploit = AgentDefinition::new(
        "exploit-specialist",
        "Exploitation, SQL injection, password cracking and payload delivery",
        &prompts.exploit.prompt,
        step_limit,
    );
    if let Some(ref model) = model {
        exploit = exploit.with_model(model);
    }
    registry.register(exploit);

    registry
}
