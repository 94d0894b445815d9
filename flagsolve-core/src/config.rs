//! Configuration types for flagsolve sessions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// LLM provider selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    #[default]
    Anthropic,
    OpenAi,
}

/// Target configuration (optional in config file - use CLI --target instead)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default)]
    pub host: String,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub name: ProviderName,
    pub model: String,
    /// Cheaper model bound to specialist agents; falls back to `model`
    #[serde(default)]
    pub specialist_model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: ProviderName::Anthropic,
            model: "claude-sonnet-4-20250514".to_string(),
            specialist_model: None,
            api_key: None,
            base_url: None,
        }
    }
}

/// Step budgets per scope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Reasoning-action iterations per coordinator turn
    #[serde(default = "default_coordinator_steps")]
    pub coordinator_steps: u32,
    /// Reasoning-action iterations per delegation
    #[serde(default = "default_specialist_steps")]
    pub specialist_steps: u32,
    /// Tools the coordinator itself may call
    #[serde(default = "default_coordinator_tools")]
    pub coordinator_tools: Vec<String>,
}

fn default_coordinator_steps() -> u32 {
    20
}

fn default_specialist_steps() -> u32 {
    15
}

fn default_coordinator_tools() -> Vec<String> {
    vec!["shell".to_string(), "delegate".to_string()]
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            coordinator_steps: default_coordinator_steps(),
            specialist_steps: default_specialist_steps(),
            coordinator_tools: default_coordinator_tools(),
        }
    }
}

/// Sandbox configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Docker image with the Kali toolchain
    #[serde(default = "default_image")]
    pub image: String,
    /// Prefix for container names
    #[serde(default = "default_container_prefix")]
    pub container_prefix: String,
    /// Per-command execution timeout in seconds
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Cap on captured output per command, in bytes
    #[serde(default = "default_max_output")]
    pub max_output_bytes: usize,
}

fn default_image() -> String {
    "flagsolve-kali".to_string()
}

fn default_container_prefix() -> String {
    "flagsolve".to_string()
}

fn default_command_timeout() -> u64 {
    300
}

fn default_max_output() -> usize {
    10_485_760
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            container_prefix: default_container_prefix(),
            command_timeout_secs: default_command_timeout(),
            max_output_bytes: default_max_output(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,
}

fn default_session_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".flagsolve")
        .join("sessions")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            session_dir: default_session_dir(),
        }
    }
}

/// Complete solver configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub budgets: BudgetConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl SolverConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> crate::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from default locations with cascade:
    /// 1. ./flagsolve.toml (local override)
    /// 2. ~/.flagsolve/config.toml (global defaults)
    /// 3. Built-in defaults
    pub fn load_default() -> Self {
        if let Ok(config) = Self::from_file("flagsolve.toml") {
            return config;
        }

        if let Some(home) = dirs::home_dir() {
            let global_path = home.join(".flagsolve").join("config.toml");
            if let Ok(config) = Self::from_file(&global_path) {
                return config;
            }
        }

        Self::default()
    }

    /// Expand `${ENV_VAR}` placeholders in credential fields
    pub fn expand_env_vars(&mut self) {
        if let Some(ref key) = self.provider.api_key {
            if key.starts_with("${") && key.ends_with('}') {
                let var_name = &key[2..key.len() - 1];
                if let Ok(value) = std::env::var(var_name) {
                    self.provider.api_key = Some(value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SolverConfig::default();
        assert_eq!(config.budgets.coordinator_steps, 20);
        assert_eq!(config.budgets.specialist_steps, 15);
        assert_eq!(config.sandbox.command_timeout_secs, 300);
        assert!(config
            .budgets
            .coordinator_tools
            .contains(&"delegate".to_string()));
    }

    #[test]
    fn test_parse_provider_only_config() {
        let toml = r#"
[provider]
name = "openai"
model = "gpt-4o"
"#;
        let config = SolverConfig::parse(toml).unwrap();
        assert_eq!(config.provider.name, ProviderName::OpenAi);
        assert_eq!(config.provider.model, "gpt-4o");
        assert_eq!(config.target.host, "");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[target]
host = "ctf.example.com"

[provider]
name = "anthropic"
model = "claude-sonnet-4-20250514"
specialist_model = "claude-haiku-3-5"

[budgets]
coordinator_steps = 8
specialist_steps = 5
coordinator_tools = ["delegate"]

[sandbox]
image = "custom-kali"
command_timeout_secs = 60
"#;
        let config = SolverConfig::parse(toml).unwrap();
        assert_eq!(config.target.host, "ctf.example.com");
        assert_eq!(
            config.provider.specialist_model.as_deref(),
            Some("claude-haiku-3-5")
        );
        assert_eq!(config.budgets.coordinator_steps, 8);
        assert_eq!(config.budgets.coordinator_tools, vec!["delegate"]);
        assert_eq!(config.sandbox.image, "custom-kali");
        assert_eq!(config.sandbox.command_timeout_secs, 60);
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("FLAGSOLVE_TEST_KEY", "expanded_value");
        let toml = r#"
[provider]
model = "claude-sonnet-4-20250514"
api_key = "${FLAGSOLVE_TEST_KEY}"
"#;
        let mut config = SolverConfig::parse(toml).unwrap();
        config.expand_env_vars();
        assert_eq!(config.provider.api_key, Some("expanded_value".to_string()));
        std::env::remove_var("FLAGSOLVE_TEST_KEY");
    }
}
