//! System prompts for the coordinator and specialist agents

use serde::Deserialize;
use std::path::Path;

use crate::{Error, Result};

/// Agent prompt configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentPrompt {
    pub prompt: String,
}

/// All agent prompts
#[derive(Debug, Clone, Deserialize)]
pub struct Prompts {
    pub coordinator: AgentPrompt,
    pub recon: AgentPrompt,
    pub exploit: AgentPrompt,
}

impl Prompts {
    /// Load prompts from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse prompts from TOML string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse prompts: {}", e)))
    }

    /// Load from default location (embedded)
    #[allow(clippy::expect_used)]
    pub fn default_prompts() -> Self {
        let content = include_str!("../../prompts.toml");
        Self::parse(content).expect("Embedded prompts.toml should be valid")
    }

    /// Get prompt for a specific agent
    pub fn get(&self, agent: &str) -> Option<&str> {
        match agent {
            "coordinator" => Some(&self.coordinator.prompt),
            "recon" => Some(&self.recon.prompt),
            "exploit" => Some(&self.exploit.prompt),
            _ => None,
        }
    }
}

impl Default for Prompts {
    fn default() -> Self {
        Self::default_prompts()
    }
}
