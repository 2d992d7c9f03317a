//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` for local Ollama inference.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    provider::{
        Completion, CompletionStream, ContextMessage, FinishReason, LlmProvider, ProviderInfo,
        StepRequest, StreamChunk, TokenUsage,
    },
    tool::{ToolArguments, ToolCall, ToolSchema},
};
use async_trait::async_trait;
use futures::StreamExt;
use ollama_rs::{
    Ollama,
    error::OllamaError,
    generation::{
        chat::{ChatMessage, ChatMessageResponse, request::ChatMessageRequest},
        tools::{ToolCall as OllamaToolCall, ToolCallFunction, ToolInfo},
    },
    models::ModelOptions,
};
use serde_json::{Value, json};

use crate::status::transport_error;

/// Ollama provider configuration
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,

    /// Model reported by `info`
    pub model: String,

    /// Connection timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
            model: "llama3.2".into(),
            timeout_secs: 120,
        }
    }
}

impl OllamaConfig {
    pub fn from_env() -> Self {
        let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost".into());
        let port = std::env::var("OLLAMA_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(11434);
        let model = std::env::var("WEATHER_CHAT_MODEL").unwrap_or_else(|_| "llama3.2".into());

        Self {
            host,
            port,
            model,
            ..Default::default()
        }
    }
}

/// Ollama LLM provider
pub struct OllamaProvider {
    client: Ollama,
    config: OllamaConfig,
}

impl OllamaProvider {
    /// Create from configuration
    pub fn from_config(config: OllamaConfig) -> Result<Self> {
        // the client panics on a host it cannot parse
        let host = reqwest::Url::parse(&config.host)
            .map_err(|e| AgentError::Config(format!("Invalid OLLAMA_HOST: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(e.to_string()))?;

        #[allow(deprecated)]
        let client = Ollama::new_with_client(host, config.port, http);
        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(OllamaConfig::from_env())
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        Ok(ProviderInfo {
            name: "Ollama".into(),
            model: self.config.model.clone(),
            supports_streaming: true,
            supports_tools: true,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.list_local_models().await {
            Ok(models) => Ok(models.iter().any(|m| m.name.starts_with(&self.config.model))),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(&self, request: &StepRequest) -> Result<Completion> {
        let response = self
            .client
            .send_chat_messages(chat_request(request)?)
            .await
            .map_err(provider_error)?;

        let finish_reason = finish_reason(&response);
        let usage = usage(&response);
        let tool_calls = tool_calls(&response.message);
        Ok(Completion {
            content: response.message.content,
            tool_calls,
            usage,
            finish_reason,
        })
    }

    async fn complete_stream(&self, request: &StepRequest) -> Result<CompletionStream> {
        let stream = self
            .client
            .send_chat_messages_stream(chat_request(request)?)
            .await
            .map_err(provider_error)?;

        let mapped = stream.flat_map(|result| {
            let chunks = match result {
                Ok(response) => stream_chunks(&response),
                Err(()) => vec![Err(AgentError::Provider(
                    "Ollama stream interrupted".into(),
                ))],
            };
            futures::stream::iter(chunks)
        });
        Ok(Box::pin(mapped))
    }
}

fn provider_error(error: OllamaError) -> AgentError {
    match error {
        OllamaError::ReqwestError(e) => transport_error(&e),
        OllamaError::InternalError(e) => AgentError::Provider(e.message),
        other => AgentError::Provider(other.to_string()),
    }
}

/// Split one streamed response into text, tool calls and the final marker
fn stream_chunks(response: &ChatMessageResponse) -> Vec<Result<StreamChunk>> {
    let mut out = Vec::new();
    if !response.message.content.is_empty() {
        out.push(Ok(StreamChunk::TextDelta {
            delta: response.message.content.clone(),
        }));
    }
    out.extend(
        tool_calls(&response.message)
            .into_iter()
            .map(|call| Ok(StreamChunk::ToolCall { call })),
    );
    if response.done {
        out.push(Ok(StreamChunk::Finished {
            finish_reason: finish_reason(response),
            usage: usage(response),
        }));
    }
    out
}

/// Ollama does not assign call ids, so each call gets a fresh one
fn tool_calls(message: &ChatMessage) -> Vec<ToolCall> {
    message
        .tool_calls
        .iter()
        .map(|call| {
            let arguments = match &call.function.arguments {
                Value::Object(map) => map.clone(),
                _ => ToolArguments::new(),
            };
            ToolCall::new(
                format!("call_{}", uuid::Uuid::new_v4().simple()),
                call.function.name.clone(),
                arguments,
            )
        })
        .collect()
}

fn finish_reason(response: &ChatMessageResponse) -> Option<FinishReason> {
    if !response.message.tool_calls.is_empty() {
        return Some(FinishReason::ToolUse);
    }
    response.done.then_some(FinishReason::Stop)
}

fn usage(response: &ChatMessageResponse) -> Option<TokenUsage> {
    response.final_data.as_ref().map(|data| {
        TokenUsage::new(
            u32::try_from(data.prompt_eval_count).unwrap_or(u32::MAX),
            u32::try_from(data.eval_count).unwrap_or(u32::MAX),
        )
    })
}

fn chat_request(request: &StepRequest) -> Result<ChatMessageRequest> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = &request.options.system_prompt {
        messages.push(ChatMessage::system(system.clone()));
    }
    messages.extend(convert_messages(&request.messages));

    let options = ModelOptions::default()
        .temperature(request.options.temperature)
        .num_predict(i32::try_from(request.options.max_tokens).unwrap_or(i32::MAX));

    Ok(
        ChatMessageRequest::new(request.options.model.clone(), messages)
            .options(options)
            .tools(convert_tools(&request.tools)?),
    )
}

fn convert_messages(messages: &[ContextMessage]) -> Vec<ChatMessage> {
    let mut out = Vec::new();
    for message in messages {
        match message {
            ContextMessage::User { content } => out.push(ChatMessage::user(content.clone())),
            ContextMessage::Assistant {
                content,
                tool_calls,
            } => {
                let mut reply = ChatMessage::assistant(content.clone());
                reply.tool_calls = tool_calls
                    .iter()
                    .map(|c| OllamaToolCall {
                        function: ToolCallFunction {
                            name: c.name.clone(),
                            arguments: Value::Object(c.arguments.clone()),
                        },
                    })
                    .collect();
                out.push(reply);
            }
            ContextMessage::ToolResults { results } => {
                out.extend(results.iter().map(|r| ChatMessage::tool(r.output.clone())));
            }
        }
    }
    out
}

fn convert_tools(tools: &[ToolSchema]) -> Result<Vec<ToolInfo>> {
    tools
        .iter()
        .map(|tool| {
            serde_json::from_value(json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.input_schema(),
                }
            }))
            .map_err(|e| AgentError::Parse(format!("Invalid schema for {}: {e}", tool.name)))
        })
        .collect()
}
