//! LLM provider integration

pub mod anthropic;
pub mod factory;
pub mod openai;
pub mod traits;

pub use anthropic::AnthropicProvider;
pub use factory::create_provider;
pub use openai::OpenAiProvider;
pub use traits::{
    CompletionRequest, CompletionResponse, LlmProvider, StopReason, TokenUsage, ToolDefinition,
};
