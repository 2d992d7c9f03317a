//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for all LLM providers (Anthropic, Ollama, etc.)
//! allowing the orchestrator to work with any backend without code changes.
//!
//! A provider handles exactly one generation step per call: it receives the
//! conversation so far plus the advertised tools, and answers with text, tool
//! calls, or both. Looping over steps and running tools is the
//! orchestrator's job.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{LlmProvider, StepRequest};
//!
//! let provider = AnthropicProvider::from_env()?;
//! let completion = provider.complete(&request).await?;
//! if completion.requested_tools() {
//!     // run tools, then call again with the results appended
//! }
//! ```

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::Result;
use crate::message::{Message, Role};
use crate::tool::{ToolCall, ToolResult, ToolSchema};

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "claude-3-5-haiku-20241022", "llama3.2")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate per step
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// System prompt, sent separately from the messages
    #[serde(default)]
    pub system_prompt: Option<String>,
}

const fn default_temperature() -> f32 {
    0.7
}
const fn default_max_tokens() -> u32 {
    2048
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "claude-3-5-haiku-20241022".into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: None,
        }
    }
}

/// One entry of the provider-visible context for a step
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextMessage {
    /// A user turn
    User { content: String },

    /// An assistant turn, possibly carrying the tool calls it requested
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },

    /// Results for the tool calls of the preceding assistant turn
    ToolResults { results: Vec<ToolResult> },
}

impl From<&Message> for ContextMessage {
    fn from(message: &Message) -> Self {
        match message.role {
            Role::User => Self::User {
                content: message.content.clone(),
            },
            Role::Assistant => Self::Assistant {
                content: message.content.clone(),
                tool_calls: Vec::new(),
            },
        }
    }
}

/// Everything a provider needs for one generation step
#[derive(Clone, Debug)]
pub struct StepRequest {
    /// Conversation so far, oldest first
    pub messages: Vec<ContextMessage>,

    /// Full set of tools the model may call
    pub tools: Vec<ToolSchema>,

    /// Generation options
    pub options: GenerationOptions,
}

/// Response from one generation step
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text
    pub content: String,

    /// Tools the model asked to run, in the order it listed them
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,

    /// Finish reason
    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    /// Whether the model wants tools run before it can finish
    pub fn requested_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Token usage statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub const fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Reason for completion finishing
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolUse,
    ContentFilter,
    Error,
}

/// An event from a streaming step
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// Text delta
    TextDelta { delta: String },

    /// A fully assembled tool call
    ToolCall { call: ToolCall },

    /// The step is over
    Finished {
        finish_reason: Option<FinishReason>,
        usage: Option<TokenUsage>,
    },
}

/// Stream type for completion streaming
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Provider metadata
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Provider name (e.g., "Anthropic", "Ollama")
    pub name: String,

    /// Model requests are sent to
    pub model: String,

    /// Whether streaming is supported
    pub supports_streaming: bool,

    /// Whether tool/function calling is supported
    pub supports_tools: bool,
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The orchestrator works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get provider information and capabilities
    async fn info(&self) -> Result<ProviderInfo>;

    /// Check if the provider is available and configured correctly
    async fn health_check(&self) -> Result<bool>;

    /// Run one generation step
    async fn complete(&self, request: &StepRequest) -> Result<Completion>;

    /// Run one generation step, streaming its output
    async fn complete_stream(&self, request: &StepRequest) -> Result<CompletionStream>;
}
