//! Anthropic Messages API provider

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::conversation::{Message, ToolInvocationRequest};
use crate::state::MetricsTracker;
use crate::{Error, Result};

use super::{CompletionRequest, CompletionResponse, LlmProvider, StopReason, TokenUsage};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Anthropic provider over the Messages API
pub struct AnthropicProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    metrics: MetricsTracker,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider from ANTHROPIC_API_KEY env var
    pub fn new(model: impl Into<String>, metrics: MetricsTracker) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| Error::Provider("ANTHROPIC_API_KEY not set".to_string()))?;
        Ok(Self::with_api_key(api_key, model, metrics))
    }

    /// Create with custom API key
    pub fn with_api_key(
        api_key: impl Into<String>,
        model: impl Into<String>,
        metrics: MetricsTracker,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            metrics,
        }
    }

    /// Override the API base URL (for proxies or compatible endpoints)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Convert conversation history into Messages API wire format.
    ///
    /// Adjacent messages mapping to the same wire role are merged into one
    /// entry, since the API requires alternating user/assistant roles.
    fn wire_messages(history: &[Message]) -> Vec<Value> {
        let mut wire: Vec<(String, Vec<Value>)> = Vec::new();

        let mut push = |role: &str, blocks: Vec<Value>| {
            if blocks.is_empty() {
                return;
            }
            match wire.last_mut() {
                Some((last_role, last_blocks)) if last_role == role => {
                    last_blocks.extend(blocks);
                }
                _ => wire.push((role.to_string(), blocks)),
            }
        };

        for message in history {
            match message {
                Message::User { text } => {
                    push("user", vec![json!({"type": "text", "text": text})]);
                }
                Message::Agent { text, calls, .. } => {
                    let mut blocks = Vec::new();
                    if let Some(text) = text {
                        if !text.trim().is_empty() {
                            blocks.push(json!({"type": "text", "text": text}));
                        }
                    }
                    for call in calls {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": call.arguments,
                        }));
                    }
                    push("assistant", blocks);
                }
                Message::Tool(result) => {
                    push(
                        "user",
                        vec![json!({
                            "type": "tool_result",
                            "tool_use_id": result.id,
                            "content": result.output,
                            "is_error": !result.success,
                        })],
                    );
                }
                Message::Delegation(result) => {
                    push(
                        "user",
                        vec![json!({
                            "type": "tool_result",
                            "tool_use_id": result.id,
                            "content": result.summary,
                            "is_error": !result.is_success(),
                        })],
                    );
                }
            }
        }

        wire.into_iter()
            .map(|(role, content)| json!({"role": role, "content": content}))
            .collect()
    }

    fn parse_response(body: &Value) -> Result<CompletionResponse> {
        let mut text = String::new();
        let mut tool_calls = Vec::new();

        let content = body
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| Error::Provider("Response missing content array".to_string()))?;

        for block in content {
            match block.get("type").and_then(|t| t.as_str()) {
                Some("text") => {
                    if let Some(t) = block.get("text").and_then(|t| t.as_str()) {
                        text.push_str(t);
                    }
                }
                Some("tool_use") => {
                    let id = block
                        .get("id")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string();
                    let name = block
                        .get("name")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string();
                    let arguments = block.get("input").cloned().unwrap_or(Value::Null);
                    tool_calls.push(ToolInvocationRequest {
                        id,
                        name,
                        arguments,
                    });
                }
                _ => {}
            }
        }

        let stop_reason = match body.get("stop_reason").and_then(|s| s.as_str()) {
            Some("tool_use") => StopReason::ToolUse,
            Some("max_tokens") => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        };

        let usage = TokenUsage {
            input_tokens: body
                .pointer("/usage/input_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            output_tokens: body
                .pointer("/usage/output_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
        };

        Ok(CompletionResponse {
            text: if text.is_empty() { None } else { Some(text) },
            tool_calls,
            stop_reason,
            usage,
        })
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = request.model.as_deref().unwrap_or(&self.model);

        let mut body = json!({
            "model": model,
            "max_tokens": request.max_tokens,
            "messages": Self::wire_messages(&request.history),
        });
        if let Some(system) = &request.system {
            body["system"] = json!(system);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() {
            let message = body
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error");
            return Err(Error::Provider(format!(
                "Anthropic API error ({}): {}",
                status, message
            )));
        }

        let parsed = Self::parse_response(&body)?;
        self.metrics.record_model_call();
        self.metrics
            .record_tokens(parsed.usage.input_tokens, parsed.usage.output_tokens);

        Ok(parsed)
    }

    fn metrics(&self) -> &MetricsTracker {
        &self.metrics
    }
}
