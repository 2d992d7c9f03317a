//! Anthropic LLM Provider
//!
//! Implementation of `LlmProvider` for the Claude Messages API. Streaming uses
//! server-sent events; tool-use blocks are assembled from their JSON deltas and
//! surfaced as whole calls once the block closes.

use std::collections::HashMap;
use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    provider::{
        Completion, CompletionStream, ContextMessage, FinishReason, LlmProvider, ProviderInfo,
        StepRequest, StreamChunk, TokenUsage,
    },
    tool::{ToolArguments, ToolCall, ToolSchema},
};
use async_stream::stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest_eventsource::{Event, EventSource, retry::Never};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::status::{status_error, transport_error};

const API_VERSION: &str = "2023-06-01";

/// Anthropic provider configuration
#[derive(Clone, Debug)]
pub struct AnthropicConfig {
    /// API key sent as `x-api-key`
    pub api_key: String,

    /// API base URL
    pub base_url: String,

    /// Model reported by `info`
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com".into(),
            model: "claude-3-5-haiku-20241022".into(),
            timeout_secs: 120,
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| AgentError::Config("ANTHROPIC_API_KEY is not set".into()))?;

        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("ANTHROPIC_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(model) = std::env::var("WEATHER_CHAT_MODEL") {
            config.model = model;
        }
        Ok(config)
    }
}

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    /// Create from configuration
    pub fn from_config(config: AnthropicConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(AnthropicConfig::from_env()?)
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    fn post(&self, body: &MessagesRequest) -> reqwest::RequestBuilder {
        self.client
            .post(self.endpoint())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        Ok(ProviderInfo {
            name: "Anthropic".into(),
            model: self.config.model.clone(),
            supports_streaming: true,
            supports_tools: true,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.config.api_key.is_empty())
    }

    async fn complete(&self, request: &StepRequest) -> Result<Completion> {
        let body = build_request(request, false);
        let response = self
            .post(&body)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Parse(e.to_string()))?;

        Ok(parsed.into_completion())
    }

    async fn complete_stream(&self, request: &StepRequest) -> Result<CompletionStream> {
        let body = build_request(request, true);
        let mut events = EventSource::new(self.post(&body))
            .map_err(|e| AgentError::Provider(format!("Failed to create event source: {e}")))?;
        events.set_retry_policy(Box::new(Never));

        Ok(Box::pin(create_stream(events)))
    }
}

/// Turn Messages API server-sent events into stream chunks
fn create_stream(mut events: EventSource) -> impl Stream<Item = Result<StreamChunk>> + Send {
    stream! {
        let mut pending: HashMap<u32, PendingToolUse> = HashMap::new();
        let mut usage = TokenUsage::default();
        let mut finish_reason = None;

        while let Some(event) = events.next().await {
            let message = match event {
                Ok(Event::Open) => continue,
                Ok(Event::Message(message)) => message,
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    let text = response.text().await.unwrap_or_default();
                    yield Err(status_error(status, &text));
                    break;
                }
                Err(e) => {
                    yield Err(AgentError::Provider(e.to_string()));
                    break;
                }
            };

            let parsed: std::result::Result<SseEvent, _> = serde_json::from_str(&message.data);
            match parsed {
                Ok(SseEvent::MessageStart { message }) => {
                    usage.prompt_tokens = message.usage.input_tokens;
                }
                Ok(SseEvent::ContentBlockStart { index, content_block: BlockStart::ToolUse { id, name } }) => {
                    pending.insert(index, PendingToolUse { id, name, json: String::new() });
                }
                Ok(SseEvent::ContentBlockDelta { index, delta }) => match delta {
                    BlockDelta::TextDelta { text } => yield Ok(StreamChunk::TextDelta { delta: text }),
                    BlockDelta::InputJsonDelta { partial_json } => {
                        if let Some(tool) = pending.get_mut(&index) {
                            tool.json.push_str(&partial_json);
                        }
                    }
                    BlockDelta::Other => {}
                },
                Ok(SseEvent::ContentBlockStop { index }) => {
                    if let Some(tool) = pending.remove(&index) {
                        yield tool.finish().map(|call| StreamChunk::ToolCall { call });
                    }
                }
                Ok(SseEvent::MessageDelta { delta, usage: delta_usage }) => {
                    finish_reason = delta.stop_reason.as_deref().map(map_stop_reason);
                    usage = TokenUsage::new(usage.prompt_tokens, delta_usage.output_tokens);
                }
                Ok(SseEvent::MessageStop) => {
                    yield Ok(StreamChunk::Finished { finish_reason, usage: Some(usage) });
                    break;
                }
                Ok(SseEvent::Error { error }) => {
                    yield Err(AgentError::Provider(error.message));
                    break;
                }
                Ok(SseEvent::ContentBlockStart { .. } | SseEvent::Ping | SseEvent::Other) => {}
                Err(e) => {
                    tracing::debug!(event = %message.event, error = %e, "Skipping unparsed event");
                }
            }
        }

        events.close();
    }
}

struct PendingToolUse {
    id: String,
    name: String,
    json: String,
}

impl PendingToolUse {
    fn finish(self) -> Result<ToolCall> {
        let arguments = if self.json.trim().is_empty() {
            ToolArguments::new()
        } else {
            serde_json::from_str(&self.json)
                .map_err(|e| AgentError::Parse(format!("tool input for {}: {e}", self.name)))?
        };
        Ok(ToolCall::new(self.id, self.name, arguments))
    }
}

fn map_stop_reason(reason: &str) -> FinishReason {
    match reason {
        "tool_use" => FinishReason::ToolUse,
        "max_tokens" => FinishReason::Length,
        "refusal" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Value,
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: Value,
}

fn build_request(request: &StepRequest, stream: bool) -> MessagesRequest {
    MessagesRequest {
        model: request.options.model.clone(),
        messages: convert_messages(&request.messages),
        max_tokens: request.options.max_tokens,
        temperature: request.options.temperature,
        stream,
        system: request.options.system_prompt.clone(),
        tools: convert_tools(&request.tools),
    }
}

fn convert_messages(messages: &[ContextMessage]) -> Vec<AnthropicMessage> {
    messages
        .iter()
        .filter_map(|message| match message {
            ContextMessage::User { content } => Some(AnthropicMessage {
                role: "user",
                content: json!(content),
            }),
            ContextMessage::Assistant {
                content,
                tool_calls,
            } => {
                let mut blocks = Vec::new();
                if !content.is_empty() {
                    blocks.push(json!({ "type": "text", "text": content }));
                }
                for call in tool_calls {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": call.arguments,
                    }));
                }
                (!blocks.is_empty()).then(|| AnthropicMessage {
                    role: "assistant",
                    content: Value::Array(blocks),
                })
            }
            ContextMessage::ToolResults { results } => Some(AnthropicMessage {
                role: "user",
                content: results
                    .iter()
                    .map(|r| {
                        json!({
                            "type": "tool_result",
                            "tool_use_id": r.id,
                            "content": r.output,
                        })
                    })
                    .collect(),
            }),
        })
        .collect()
}

fn convert_tools(tools: &[ToolSchema]) -> Vec<AnthropicTool> {
    tools
        .iter()
        .map(|tool| AnthropicTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: tool.input_schema(),
        })
        .collect()
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    stop_reason: Option<String>,
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: ToolArguments,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl MessagesResponse {
    fn into_completion(self) -> Completion {
        let mut completion = Completion {
            finish_reason: self.stop_reason.as_deref().map(map_stop_reason),
            usage: self
                .usage
                .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens)),
            ..Completion::default()
        };

        for block in self.content {
            match block {
                ResponseBlock::Text { text } => completion.content.push_str(&text),
                ResponseBlock::ToolUse { id, name, input } => {
                    completion.tool_calls.push(ToolCall::new(id, name, input));
                }
                ResponseBlock::Other => {}
            }
        }
        completion
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SseEvent {
    MessageStart {
        message: StartMessage,
    },
    ContentBlockStart {
        index: u32,
        content_block: BlockStart,
    },
    ContentBlockDelta {
        index: u32,
        delta: BlockDelta,
    },
    ContentBlockStop {
        index: u32,
    },
    MessageDelta {
        delta: MessageDelta,
        #[serde(default)]
        usage: ResponseUsage,
    },
    MessageStop,
    Ping,
    Error {
        error: ApiError,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StartMessage {
    #[serde(default)]
    usage: ResponseUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockStart {
    ToolUse {
        id: String,
        name: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta {
        text: String,
    },
    InputJsonDelta {
        partial_json: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::provider::GenerationOptions;
    use agent_core::tool::{ParameterSchema, ToolResult};

    fn weather_schema() -> ToolSchema {
        ToolSchema {
            name: "get_current_weather".into(),
            description: "Get current weather conditions for a specific location".into(),
            parameters: vec![ParameterSchema::string("location", "City name")],
        }
    }

    #[test]
    fn test_request_carries_system_prompt_and_tools() {
        let request = StepRequest {
            messages: vec![ContextMessage::User {
                content: "Weather in Lisbon?".into(),
            }],
            tools: vec![weather_schema()],
            options: GenerationOptions {
                system_prompt: Some("You are WeatherBot.".into()),
                ..GenerationOptions::default()
            },
        };

        let body = serde_json::to_value(build_request(&request, true)).unwrap();
        assert_eq!(body["system"], "You are WeatherBot.");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Weather in Lisbon?");
        assert_eq!(body["tools"][0]["name"], "get_current_weather");
        assert_eq!(body["tools"][0]["input_schema"]["required"], json!(["location"]));
    }

    #[test]
    fn test_tool_exchange_conversion() {
        let call = ToolCall::new(
            "toolu_1",
            "get_current_weather",
            json!({"location": "Lisbon"}).as_object().cloned().unwrap(),
        );
        let messages = convert_messages(&[
            ContextMessage::Assistant {
                content: String::new(),
                tool_calls: vec![call],
            },
            ContextMessage::ToolResults {
                results: vec![ToolResult {
                    id: "toolu_1".into(),
                    name: "get_current_weather".into(),
                    output: "23°C".into(),
                }],
            },
        ]);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "assistant");
        assert_eq!(messages[0].content[0]["type"], "tool_use");
        assert_eq!(messages[0].content[0]["input"]["location"], "Lisbon");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content[0]["tool_use_id"], "toolu_1");
        assert_eq!(messages[1].content[0]["content"], "23°C");
    }

    #[test]
    fn test_empty_assistant_turn_is_dropped() {
        let messages = convert_messages(&[ContextMessage::Assistant {
            content: String::new(),
            tool_calls: Vec::new(),
        }]);
        assert!(messages.is_empty());
    }

    #[test]
    fn test_response_parsing() {
        let raw = json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_9", "name": "get_current_weather", "input": {"location": "Porto"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 7}
        });

        let completion = serde_json::from_value::<MessagesResponse>(raw)
            .unwrap()
            .into_completion();

        assert_eq!(completion.content, "Let me check.");
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].id, "toolu_9");
        assert_eq!(completion.finish_reason, Some(FinishReason::ToolUse));
        assert_eq!(completion.usage.map(|u| u.total_tokens), Some(19));
    }

    #[test]
    fn test_sse_event_parsing() {
        let delta: SseEvent = serde_json::from_str(
            r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"loc"}}"#,
        )
        .unwrap();
        assert!(matches!(
            delta,
            SseEvent::ContentBlockDelta { index: 1, delta: BlockDelta::InputJsonDelta { .. } }
        ));

        let ping: SseEvent = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(ping, SseEvent::Ping));
    }

    #[test]
    fn test_pending_tool_use_assembles_arguments() {
        let tool = PendingToolUse {
            id: "toolu_2".into(),
            name: "get_weather_forecast".into(),
            json: r#"{"location":"Lisbon","date":"tomorrow"}"#.into(),
        };
        let call = tool.finish().unwrap();
        assert_eq!(call.arguments["date"], "tomorrow");

        let empty = PendingToolUse {
            id: "toolu_3".into(),
            name: "load_user_memories".into(),
            json: String::new(),
        };
        assert!(empty.finish().unwrap().arguments.is_empty());
    }
}
