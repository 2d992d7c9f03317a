//! Chat Orchestration
//!
//! Drives one round of a conversation: up to [`MAX_STEPS`] generation steps
//! against the provider, running every tool the model asks for between
//! steps and feeding the results back as context.
//!
//! ```text
//!  history ──▶ step 1 ──tool calls──▶ run tools ──▶ step 2 ──▶ ... ──▶ step N
//!                 │                                   │
//!                 └── no tool calls: final text ◀─────┘
//! ```
//!
//! Failures inside tools are already text by the time they get here. A
//! provider failure or a request for an unknown tool aborts the round; the
//! caller gets a [`RoundFailure`] holding what to show the user.

use std::panic::Location;
use std::pin::Pin;
use std::sync::Arc;

use async_stream::try_stream;
use futures::{Stream, StreamExt};

use crate::error::{AgentError, Result, RoundFailure};
use crate::message::{Message, last_user_content};
use crate::provider::{
    Completion, ContextMessage, GenerationOptions, LlmProvider, StepRequest, StreamChunk,
};
use crate::stream::{
    DisplayInstruction, DisplaySink, FALLBACK_RESPONSE, StreamFragment, reconcile,
};
use crate::tool::{ToolCall, ToolRegistry, ToolResult, ToolSchema};

/// Hard cap on generation steps in one round
pub const MAX_STEPS: usize = 3;

/// Columns blanked before an error message is printed
const ERROR_CLEAR_WIDTH: usize = 50;

/// Width of the non-streaming waiting marker
const PLACEHOLDER_WIDTH: usize = 1;

/// Lazily produced fragments of a streamed round
pub type FragmentStream<'a> = Pin<Box<dyn Stream<Item = Result<StreamFragment>> + Send + 'a>>;

/// Orchestrator configuration
#[derive(Clone, Debug, Default)]
pub struct OrchestratorConfig {
    /// Generation options, including the system prompt
    pub generation: GenerationOptions,

    /// Show raw errors and their location instead of the generic apology
    pub debug: bool,
}

/// One user turn's worth of work
#[derive(Clone, Copy, Debug)]
pub struct Round<'a> {
    /// Who is talking, for error reports
    pub user: &'a str,

    /// Conversation so far, ending with the user's message
    pub history: &'a [Message],

    /// Tools advertised at every step
    pub tools: &'a ToolRegistry,

    /// Requested step budget, clamped to `1..=MAX_STEPS`
    pub max_steps: usize,

    /// Stream text to the display as it arrives
    pub streaming: bool,
}

impl Round<'_> {
    /// Steps this round may actually take
    pub fn step_budget(&self) -> usize {
        self.max_steps.clamp(1, MAX_STEPS)
    }
}

/// An error paired with the place it surfaced
#[derive(Debug)]
struct StepError {
    error: AgentError,
    location: &'static Location<'static>,
}

trait AtCallSite<T> {
    fn at_call_site(self) -> std::result::Result<T, StepError>;
}

impl<T> AtCallSite<T> for Result<T> {
    #[track_caller]
    fn at_call_site(self) -> std::result::Result<T, StepError> {
        let location = Location::caller();
        self.map_err(|error| StepError { error, location })
    }
}

/// Runs rounds against one provider
pub struct ChatOrchestrator {
    provider: Arc<dyn LlmProvider>,
    config: OrchestratorConfig,
}

impl ChatOrchestrator {
    /// Create a new orchestrator
    pub fn new(provider: Arc<dyn LlmProvider>, config: OrchestratorConfig) -> Self {
        Self { provider, config }
    }

    /// Create with default configuration
    pub fn with_defaults(provider: Arc<dyn LlmProvider>) -> Self {
        Self::new(provider, OrchestratorConfig::default())
    }

    /// Run a round and return the assistant's answer.
    ///
    /// Never returns an empty answer: a round that ends without prose yields
    /// [`FALLBACK_RESPONSE`]. Any failure is logged with the user and their
    /// message, and reduced to a [`RoundFailure`].
    pub async fn execute(
        &self,
        round: &Round<'_>,
        sink: &mut dyn DisplaySink,
    ) -> std::result::Result<String, RoundFailure> {
        let outcome = if round.streaming {
            self.run_streamed(round, sink).await
        } else {
            self.run_blocking(round, sink).await
        };

        outcome.map_err(|failure| self.contain(failure, round, sink))
    }

    /// Fragments of a streamed round, produced only as they are pulled.
    ///
    /// Text deltas are forwarded as they arrive; provider events without
    /// text become [`StreamFragment::Tick`]; after each step that requested
    /// tools, the tools run and their results are yielded before the next
    /// step starts.
    pub fn fragments<'a>(&'a self, round: &'a Round<'a>) -> FragmentStream<'a> {
        Box::pin(try_stream! {
            let tools = round.tools.schemas();
            let mut context = history_context(round.history);

            for step in 1..=round.step_budget() {
                let request = self.request(&context, &tools);
                let mut chunks = self.provider.complete_stream(&request).await?;

                let mut text = String::new();
                let mut calls = Vec::new();

                while let Some(chunk) = chunks.next().await {
                    match chunk? {
                        StreamChunk::TextDelta { delta } => {
                            text.push_str(&delta);
                            yield StreamFragment::TextDelta { delta };
                        }
                        StreamChunk::ToolCall { call } => {
                            calls.push(call);
                            yield StreamFragment::Tick;
                        }
                        StreamChunk::Finished { .. } => {
                            yield StreamFragment::Tick;
                        }
                    }
                }

                tracing::debug!(step, tool_calls = calls.len(), "Streamed step finished");
                if calls.is_empty() {
                    break;
                }

                let results = round.tools.invoke_all(&calls).await?;
                append_tool_exchange(&mut context, text, calls, results.clone());
                yield StreamFragment::ToolResults { results };
            }
        })
    }

    async fn run_streamed(
        &self,
        round: &Round<'_>,
        sink: &mut dyn DisplaySink,
    ) -> std::result::Result<String, StepError> {
        sink.show(DisplayInstruction::Prompt);
        reconcile(self.fragments(round), sink).await.at_call_site()
    }

    async fn run_blocking(
        &self,
        round: &Round<'_>,
        sink: &mut dyn DisplaySink,
    ) -> std::result::Result<String, StepError> {
        sink.show(DisplayInstruction::Placeholder);

        let tools = round.tools.schemas();
        let mut context = history_context(round.history);
        let mut last = Completion::default();

        for step in 1..=round.step_budget() {
            let request = self.request(&context, &tools);
            last = self.provider.complete(&request).await.at_call_site()?;

            tracing::debug!(
                step,
                tool_calls = last.tool_calls.len(),
                finish_reason = ?last.finish_reason,
                "Step finished"
            );
            if !last.requested_tools() {
                break;
            }

            let results = round
                .tools
                .invoke_all(&last.tool_calls)
                .await
                .at_call_site()?;
            append_tool_exchange(
                &mut context,
                last.content.clone(),
                last.tool_calls.clone(),
                results,
            );
        }

        sink.show(DisplayInstruction::Clear {
            width: PLACEHOLDER_WIDTH,
        });

        let text = last.content.trim();
        Ok(if text.is_empty() {
            FALLBACK_RESPONSE.to_string()
        } else {
            text.to_string()
        })
    }

    fn request(&self, context: &[ContextMessage], tools: &[ToolSchema]) -> StepRequest {
        StepRequest {
            messages: context.to_vec(),
            tools: tools.to_vec(),
            options: self.config.generation.clone(),
        }
    }

    fn contain(
        &self,
        failure: StepError,
        round: &Round<'_>,
        sink: &mut dyn DisplaySink,
    ) -> RoundFailure {
        sink.show(DisplayInstruction::Clear {
            width: ERROR_CLEAR_WIDTH,
        });

        tracing::error!(
            user = round.user,
            message = last_user_content(round.history),
            error = %failure.error,
            retryable = failure.error.is_retryable(),
            location = %failure.location,
            "Chat processing error"
        );

        RoundFailure::new(failure.error, failure.location, self.config.debug)
    }
}

fn history_context(history: &[Message]) -> Vec<ContextMessage> {
    history.iter().map(ContextMessage::from).collect()
}

fn append_tool_exchange(
    context: &mut Vec<ContextMessage>,
    content: String,
    tool_calls: Vec<ToolCall>,
    results: Vec<ToolResult>,
) {
    context.push(ContextMessage::Assistant {
        content,
        tool_calls,
    });
    context.push(ContextMessage::ToolResults { results });
}

/// Builder for orchestrator configuration
#[derive(Default)]
pub struct ChatOrchestratorBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    config: OrchestratorConfig,
}

impl ChatOrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.generation.system_prompt = Some(prompt.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    pub fn build(self) -> Result<ChatOrchestrator> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        Ok(ChatOrchestrator::new(provider, self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GENERIC_APOLOGY;
    use crate::provider::{CompletionStream, FinishReason, ProviderInfo};
    use crate::tool::{ParameterSchema, Tool, ToolArguments, ToolOutcome, string_arg};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    type Script = std::result::Result<Vec<StreamChunk>, String>;

    /// Provider that replays scripted steps and records every request
    struct ScriptedProvider {
        steps: Mutex<VecDeque<Script>>,
        repeat_last: bool,
        requests: Mutex<Vec<StepRequest>>,
    }

    impl ScriptedProvider {
        fn new(steps: Vec<Script>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                repeat_last: false,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn always(step: Vec<StreamChunk>) -> Self {
            Self {
                repeat_last: true,
                ..Self::new(vec![Ok(step)])
            }
        }

        fn requests(&self) -> Vec<StepRequest> {
            self.requests.lock().unwrap().clone()
        }

        fn next_step(&self, request: &StepRequest) -> Result<Vec<StreamChunk>> {
            self.requests.lock().unwrap().push(request.clone());
            let mut steps = self.steps.lock().unwrap();
            let step = if self.repeat_last && steps.len() == 1 {
                steps.front().cloned()
            } else {
                steps.pop_front()
            };
            step.unwrap_or_else(|| Err("script exhausted".into()))
                .map_err(AgentError::Provider)
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn info(&self) -> Result<ProviderInfo> {
            Ok(ProviderInfo {
                name: "Scripted".into(),
                model: "test".into(),
                supports_streaming: true,
                supports_tools: true,
            })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        async fn complete(&self, request: &StepRequest) -> Result<Completion> {
            let mut completion = Completion::default();
            for chunk in self.next_step(request)? {
                match chunk {
                    StreamChunk::TextDelta { delta } => completion.content.push_str(&delta),
                    StreamChunk::ToolCall { call } => completion.tool_calls.push(call),
                    StreamChunk::Finished { finish_reason, usage } => {
                        completion.finish_reason = finish_reason;
                        completion.usage = usage;
                    }
                }
            }
            Ok(completion)
        }

        async fn complete_stream(&self, request: &StepRequest) -> Result<CompletionStream> {
            let chunks = self.next_step(request)?;
            Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
        }
    }

    /// Tool that records the order it was called in
    struct WeatherStub {
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Tool for WeatherStub {
        fn name(&self) -> &str {
            "get_current_weather"
        }

        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "get_current_weather".into(),
                description: "Get current weather conditions for a specific location".into(),
                parameters: vec![ParameterSchema::string("location", "City name")],
            }
        }

        async fn run(&self, arguments: &ToolArguments) -> ToolOutcome {
            let location = string_arg(arguments, "location")?;
            self.calls.lock().unwrap().push(location.to_string());
            Ok(format!("Current weather in {location}: 23°C"))
        }
    }

    fn text(delta: &str) -> StreamChunk {
        StreamChunk::TextDelta {
            delta: delta.into(),
        }
    }

    fn weather_call(id: &str, location: &str) -> StreamChunk {
        StreamChunk::ToolCall {
            call: ToolCall::new(
                id,
                "get_current_weather",
                json!({ "location": location }).as_object().cloned().unwrap(),
            ),
        }
    }

    fn finished(reason: FinishReason) -> StreamChunk {
        StreamChunk::Finished {
            finish_reason: Some(reason),
            usage: None,
        }
    }

    fn registry() -> (ToolRegistry, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut tools = ToolRegistry::new();
        tools.register(WeatherStub {
            calls: calls.clone(),
        });
        (tools, calls)
    }

    fn round<'a>(history: &'a [Message], tools: &'a ToolRegistry, streaming: bool) -> Round<'a> {
        Round {
            user: "TestUser",
            history,
            tools,
            max_steps: MAX_STEPS,
            streaming,
        }
    }

    #[tokio::test]
    async fn test_terminal_text_without_tools() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(vec![
            text("Sunny, 23°C"),
            finished(FinishReason::Stop),
        ])]));
        let orchestrator = ChatOrchestrator::with_defaults(provider.clone());
        let history = [Message::user("What is the weather in Lisbon?")];
        let (tools, _) = registry();

        let answer = orchestrator
            .execute(&round(&history, &tools, false), &mut Vec::new())
            .await
            .unwrap();

        assert_eq!(answer, "Sunny, 23°C");
        assert_eq!(provider.requests().len(), 1);
        assert_eq!(
            provider.requests()[0].messages,
            vec![ContextMessage::User {
                content: "What is the weather in Lisbon?".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_tool_results_are_fed_into_next_step() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(vec![weather_call("call_1", "Lisbon"), finished(FinishReason::ToolUse)]),
            Ok(vec![text("Lisbon is pleasant at 23°C."), finished(FinishReason::Stop)]),
        ]));
        let orchestrator = ChatOrchestrator::with_defaults(provider.clone());
        let history = [Message::user("What is the weather in Lisbon?")];
        let (tools, calls) = registry();

        let answer = orchestrator
            .execute(&round(&history, &tools, false), &mut Vec::new())
            .await
            .unwrap();

        assert_eq!(answer, "Lisbon is pleasant at 23°C.");
        assert_eq!(*calls.lock().unwrap(), vec!["Lisbon"]);

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools, requests[1].tools);
        assert_eq!(requests[1].tools.len(), 1);
        match &requests[1].messages[2] {
            ContextMessage::ToolResults { results } => {
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].id, "call_1");
                assert_eq!(results[0].output, "Current weather in Lisbon: 23°C");
            }
            other => panic!("expected tool results, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_tools_run_in_listed_order() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(vec![
                weather_call("call_1", "Lisbon"),
                weather_call("call_2", "Porto"),
                finished(FinishReason::ToolUse),
            ]),
            Ok(vec![text("Both are sunny."), finished(FinishReason::Stop)]),
        ]));
        let orchestrator = ChatOrchestrator::with_defaults(provider.clone());
        let history = [Message::user("Lisbon or Porto?")];
        let (tools, calls) = registry();

        orchestrator
            .execute(&round(&history, &tools, false), &mut Vec::new())
            .await
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["Lisbon", "Porto"]);
        let ids: Vec<String> = match &provider.requests()[1].messages[2] {
            ContextMessage::ToolResults { results } => results.iter().map(|r| r.id.clone()).collect(),
            other => panic!("expected tool results, got {other:?}"),
        };
        assert_eq!(ids, vec!["call_1", "call_2"]);
    }

    #[tokio::test]
    async fn test_step_budget_exhaustion_falls_back() {
        let provider = Arc::new(ScriptedProvider::always(vec![
            weather_call("call_x", "Lisbon"),
            finished(FinishReason::ToolUse),
        ]));
        let orchestrator = ChatOrchestrator::with_defaults(provider.clone());
        let history = [Message::user("Keep checking")];
        let (tools, calls) = registry();

        let mut r = round(&history, &tools, false);
        r.max_steps = 10;
        let answer = orchestrator.execute(&r, &mut Vec::new()).await.unwrap();

        assert_eq!(answer, FALLBACK_RESPONSE);
        assert_eq!(provider.requests().len(), MAX_STEPS);
        assert_eq!(calls.lock().unwrap().len(), MAX_STEPS);
    }

    #[tokio::test]
    async fn test_streamed_step_budget_exhaustion_falls_back() {
        let provider = Arc::new(ScriptedProvider::always(vec![
            weather_call("call_x", "Lisbon"),
            finished(FinishReason::ToolUse),
        ]));
        let orchestrator = ChatOrchestrator::with_defaults(provider.clone());
        let history = [Message::user("Keep checking")];
        let (tools, _) = registry();

        let answer = orchestrator
            .execute(&round(&history, &tools, true), &mut Vec::new())
            .await
            .unwrap();

        assert_eq!(answer, FALLBACK_RESPONSE);
        assert_eq!(provider.requests().len(), MAX_STEPS);
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_the_round() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(vec![
            StreamChunk::ToolCall {
                call: ToolCall::new("call_1", "launch_rockets", ToolArguments::new()),
            },
            finished(FinishReason::ToolUse),
        ])]));
        let orchestrator = ChatOrchestrator::with_defaults(provider.clone());
        let history = [Message::user("Do something odd")];
        let (tools, _) = registry();
        let mut shown = Vec::new();

        let failure = orchestrator
            .execute(&round(&history, &tools, false), &mut shown)
            .await
            .unwrap_err();

        assert!(matches!(failure.source, AgentError::ToolNotFound(ref name) if name == "launch_rockets"));
        assert_eq!(failure.user_message, GENERIC_APOLOGY);
        assert_eq!(provider.requests().len(), 1);
        assert_eq!(
            shown.last(),
            Some(&DisplayInstruction::Clear {
                width: ERROR_CLEAR_WIDTH
            })
        );
    }

    #[tokio::test]
    async fn test_provider_failure_in_debug_shows_detail() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err("overloaded".into())]));
        let orchestrator = ChatOrchestratorBuilder::new()
            .provider(provider)
            .debug(true)
            .build()
            .unwrap();
        let history = [Message::user("Hi")];
        let (tools, _) = registry();

        let failure = orchestrator
            .execute(&round(&history, &tools, true), &mut Vec::new())
            .await
            .unwrap_err();

        assert!(failure.user_message.starts_with("DEBUG ERROR: Provider error: overloaded in "));
        assert!(failure.user_message.contains("orchestrator.rs:"));
    }

    #[tokio::test]
    async fn test_streamed_round_resets_between_steps() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(vec![
                text("Tom"),
                text("Tomorrow will"),
                weather_call("call_1", "Lisbon"),
                finished(FinishReason::ToolUse),
            ]),
            Ok(vec![text("It will be sunny"), finished(FinishReason::Stop)]),
        ]));
        let orchestrator = ChatOrchestrator::with_defaults(provider.clone());
        let history = [Message::user("Weather tomorrow?")];
        let (tools, _) = registry();
        let mut shown = Vec::new();

        let answer = orchestrator
            .execute(&round(&history, &tools, true), &mut shown)
            .await
            .unwrap();

        assert_eq!(answer, "It will be sunny");
        assert_eq!(shown.first(), Some(&DisplayInstruction::Prompt));
        assert!(shown.iter().any(|i| matches!(i, DisplayInstruction::Clear { .. })));
        match &provider.requests()[1].messages[1] {
            ContextMessage::Assistant { content, tool_calls } => {
                assert_eq!(content, "TomTomorrow will");
                assert_eq!(tool_calls.len(), 1);
            }
            other => panic!("expected assistant turn, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_streamed_duplicate_response_collapses() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(vec![
            text("Hel"),
            text("lo"),
            text("Hello"),
            finished(FinishReason::Stop),
        ])]));
        let orchestrator = ChatOrchestrator::with_defaults(provider);
        let history = [Message::user("Say hello")];
        let (tools, _) = registry();

        let answer = orchestrator
            .execute(&round(&history, &tools, true), &mut Vec::new())
            .await
            .unwrap();

        assert_eq!(answer, "Hello");
    }

    #[tokio::test]
    async fn test_fragments_are_tagged() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(vec![weather_call("call_1", "Lisbon"), finished(FinishReason::ToolUse)]),
            Ok(vec![text("Sunny"), finished(FinishReason::Stop)]),
        ]));
        let orchestrator = ChatOrchestrator::with_defaults(provider);
        let history = [Message::user("Weather?")];
        let (tools, _) = registry();
        let r = round(&history, &tools, true);

        let fragments: Vec<StreamFragment> = orchestrator
            .fragments(&r)
            .map(|f| f.unwrap())
            .collect()
            .await;

        assert_eq!(fragments[0], StreamFragment::Tick);
        assert_eq!(fragments[1], StreamFragment::Tick);
        assert!(matches!(&fragments[2], StreamFragment::ToolResults { results } if results.len() == 1));
        assert_eq!(fragments[3], StreamFragment::text("Sunny"));
        assert_eq!(fragments[4], StreamFragment::Tick);
        assert_eq!(fragments.len(), 5);
    }

    #[test]
    fn test_builder_requires_provider() {
        assert!(matches!(
            ChatOrchestratorBuilder::new().build(),
            Err(AgentError::Config(_))
        ));
    }
}
