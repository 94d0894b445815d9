//! OpenAI Chat Completions provider

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::conversation::{Message, ToolInvocationRequest};
use crate::state::MetricsTracker;
use crate::{Error, Result};

use super::{CompletionRequest, CompletionResponse, LlmProvider, StopReason, TokenUsage};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI provider over the Chat Completions API
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    metrics: MetricsTracker,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider from OPENAI_API_KEY env var
    pub fn new(model: impl Into<String>, metrics: MetricsTracker) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::Provider("OPENAI_API_KEY not set".to_string()))?;
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

    /// Override the API base URL (for proxies or compatible APIs)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Convert conversation history into Chat Completions wire format
    fn wire_messages(system: Option<&str>, history: &[Message]) -> Vec<Value> {
        let mut wire = Vec::new();

        if let Some(system) = system {
            wire.push(json!({"role": "system", "content": system}));
        }

        for message in history {
            match message {
                Message::User { text } => {
                    wire.push(json!({"role": "user", "content": text}));
                }
                Message::Agent { text, calls, .. } => {
                    let mut entry = json!({"role": "assistant"});
                    entry["content"] = match text {
                        Some(text) if !text.trim().is_empty() => json!(text),
                        _ => Value::Null,
                    };
                    if !calls.is_empty() {
                        let tool_calls: Vec<Value> = calls
                            .iter()
                            .map(|call| {
                                json!({
                                    "id": call.id,
                                    "type": "function",
                                    "function": {
                                        "name": call.name,
                                        "arguments": call.arguments.to_string(),
                                    }
                                })
                            })
                            .collect();
                        entry["tool_calls"] = json!(tool_calls);
                    }
                    wire.push(entry);
                }
                Message::Tool(result) => {
                    wire.push(json!({
                        "role": "tool",
                        "tool_call_id": result.id,
                        "content": result.output,
                    }));
                }
                Message::Delegation(result) => {
                    wire.push(json!({
                        "role": "tool",
                        "tool_call_id": result.id,
                        "content": result.summary,
                    }));
                }
            }
        }

        wire
    }

    fn parse_response(body: &Value) -> Result<CompletionResponse> {
        let message = body
            .pointer("/choices/0/message")
            .ok_or_else(|| Error::Provider("Response missing choices".to_string()))?;

        let text = message
            .get("content")
            .and_then(|c| c.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let mut tool_calls = Vec::new();
        if let Some(calls) = message.get("tool_calls").and_then(|c| c.as_array()) {
            for call in calls {
                let id = call
                    .get("id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let name = call
                    .pointer("/function/name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let raw_args = call
                    .pointer("/function/arguments")
                    .and_then(|v| v.as_str())
                    .unwrap_or("{}");
                let arguments = serde_json::from_str(raw_args)
                    .unwrap_or_else(|_| json!({ "raw": raw_args }));
                tool_calls.push(ToolInvocationRequest {
                    id,
                    name,
                    arguments,
                });
            }
        }

        let stop_reason = match body
            .pointer("/choices/0/finish_reason")
            .and_then(|s| s.as_str())
        {
            Some("tool_calls") => StopReason::ToolUse,
            Some("length") => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        };

        let usage = TokenUsage {
            input_tokens: body
                .pointer("/usage/prompt_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            output_tokens: body
                .pointer("/usage/completion_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
        };

        Ok(CompletionResponse {
            text,
            tool_calls,
            stop_reason,
            usage,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = request.model.as_deref().unwrap_or(&self.model);

        let mut body = json!({
            "model": model,
            "max_completion_tokens": request.max_tokens,
            "messages": Self::wire_messages(request.system.as_deref(), &request.history),
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
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
                "OpenAI API error ({}): {}",
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
