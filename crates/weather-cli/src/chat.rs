//! Interactive Chat Session
//!
//! Greets the user, runs one orchestration round per line of input and, on
//! `/exit`, asks the assistant to save what it learned.

use std::io::{self, Write};
use std::sync::Arc;

use agent_core::{ChatOrchestratorBuilder, ChatSession, LlmProvider};
use tokio_stream::{Stream, StreamExt};
use weather_advisor::{
    AdvisorError, MemoryStore, SUMMARIZE_REQUEST, User, WeatherProvider, chat_tools,
    find_or_create, system_prompt,
};

use crate::console::{BOT_PROMPT, Console};

const EXIT_COMMAND: &str = "/exit";

/// How a chat session ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user left with `/exit` or closed the input
    Finished,

    /// No usable user name was given, so no session started
    NoUser,
}

/// Collaborators shared by every session
pub struct Services {
    pub provider: Arc<dyn LlmProvider>,
    pub weather: Arc<dyn WeatherProvider>,
    pub store: Arc<dyn MemoryStore>,
    pub debug: bool,
}

/// Options of the `chat` command
#[derive(Clone, Debug, Default)]
pub struct ChatOptions {
    pub user: Option<String>,
    pub memory_mode: bool,
    pub streaming: bool,
    pub save_on_exit: bool,
}

/// Run a chat session until `/exit` or end of input
pub async fn run<I, W>(
    services: &Services,
    options: &ChatOptions,
    input: &mut I,
    console: &mut Console<W>,
) -> anyhow::Result<SessionEnd>
where
    I: Stream<Item = io::Result<String>> + Unpin,
    W: Write + Send,
{
    console.line("AI Weather Chatbot");
    if options.streaming {
        console.line("Streaming mode enabled - responses will appear as they are generated");
    }
    console.line("Ask me about the weather! Type \"/exit\" to quit.");
    console.blank();

    let Some(user) = resolve_user(services, options, input, console).await? else {
        return Ok(SessionEnd::NoUser);
    };

    if options.memory_mode {
        match services.store.count(&user)? {
            0 => console.line(
                "Memory mode enabled - I'll remember important details from our conversation.",
            ),
            count => console.line(&format!(
                "I remember {count} things about you from our previous conversations."
            )),
        }
    }
    console.blank();

    let model = services.provider.info().await?.model;
    let orchestrator = ChatOrchestratorBuilder::new()
        .provider(Arc::clone(&services.provider))
        .system_prompt(system_prompt(&user.name, options.memory_mode))
        .model(model)
        .debug(services.debug)
        .build()?;
    let tools = chat_tools(
        Arc::clone(&services.weather),
        Arc::clone(&services.store),
        &user,
        options.memory_mode,
    );
    let mut session = ChatSession::new(user.name.clone(), options.streaming);

    tracing::info!(
        user = %user.name,
        session = %session.id,
        memory_mode = options.memory_mode,
        streaming = options.streaming,
        tools = ?tools.names(),
        "Chat session started"
    );

    loop {
        console.write("You: ");
        let Some(line) = input.next().await.transpose()? else {
            console.blank();
            break;
        };

        let line = line.trim();
        if line.eq_ignore_ascii_case(EXIT_COMMAND) {
            break;
        }
        if line.is_empty() {
            continue;
        }

        match session.turn(&orchestrator, &tools, line, console).await {
            Ok(answer) => show_answer(console, &answer, options.streaming),
            Err(failure) => console.line(&failure.user_message),
        }
        console.blank();
    }

    let saving = options.save_on_exit && options.memory_mode && session.message_count() > 0;
    if saving {
        console.line("Summarizing conversation...");
        match session.aside(&orchestrator, &tools, SUMMARIZE_REQUEST, console).await {
            Ok(answer) => {
                show_answer(console, &answer, options.streaming);
                console.blank();
                console.line("Conversation summarized and saved!");
            }
            Err(failure) => {
                console.line(&failure.user_message);
                console.line("Failed to summarize conversation.");
            }
        }
    }

    tracing::info!(
        session = %session.id,
        messages = session.message_count(),
        duration_secs = session.duration().num_seconds(),
        "Chat session ended"
    );
    console.line("Goodbye!");
    Ok(SessionEnd::Finished)
}

/// Streamed answers, fallback included, are already on screen; only the line
/// needs ending
fn show_answer<W: Write + Send>(console: &mut Console<W>, answer: &str, streaming: bool) {
    if streaming {
        console.blank();
    } else {
        console.line(&format!("{BOT_PROMPT}{answer}"));
    }
}

/// Find or register the chat user, asking for a name when none was given
async fn resolve_user<I, W>(
    services: &Services,
    options: &ChatOptions,
    input: &mut I,
    console: &mut Console<W>,
) -> anyhow::Result<Option<User>>
where
    I: Stream<Item = io::Result<String>> + Unpin,
    W: Write + Send,
{
    let name = match options.user.clone() {
        Some(name) => name,
        None => {
            console.write("What should I call you? ");
            input.next().await.transpose()?.unwrap_or_default()
        }
    };

    if name.trim().is_empty() {
        console.line("A name is required to start a session.");
        return Ok(None);
    }

    let registration = match find_or_create(services.store.as_ref(), &name) {
        Ok(registration) => registration,
        Err(AdvisorError::InvalidUserName(message)) => {
            console.line(&message);
            return Ok(None);
        }
        Err(error) => return Err(error.into()),
    };

    let user = registration.user;
    if registration.created {
        console.line(&format!(
            "Nice to meet you, {}! I'm your AI weather assistant.",
            user.name
        ));
        console.line(
            "I can remember things about you across sessions if you use the --memories flag.",
        );
    } else {
        console.line(&format!("Welcome back, {}!", user.name));
    }
    Ok(Some(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use agent_core::provider::{
        Completion, CompletionStream, FinishReason, ProviderInfo, StepRequest, StreamChunk,
    };
    use agent_core::stream::FALLBACK_RESPONSE;
    use agent_core::{AgentError, ToolCall};
    use async_trait::async_trait;
    use weather_advisor::{MockWeatherProvider, SqliteMemoryStore};

    /// Replays canned completions in order, then fails
    struct CannedProvider {
        replies: Mutex<VecDeque<Completion>>,
    }

    impl CannedProvider {
        fn new(replies: Vec<Completion>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn info(&self) -> agent_core::Result<ProviderInfo> {
            Ok(ProviderInfo {
                name: "Canned".into(),
                model: "canned-1".into(),
                supports_streaming: false,
                supports_tools: true,
            })
        }

        async fn health_check(&self) -> agent_core::Result<bool> {
            Ok(true)
        }

        async fn complete(&self, _request: &StepRequest) -> agent_core::Result<Completion> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgentError::Provider("no more replies".into()))
        }

        async fn complete_stream(
            &self,
            request: &StepRequest,
        ) -> agent_core::Result<CompletionStream> {
            let reply = self.complete(request).await?;
            let mut chunks = Vec::new();
            if !reply.content.is_empty() {
                chunks.push(Ok(StreamChunk::TextDelta {
                    delta: reply.content,
                }));
            }
            let finish_reason = if reply.tool_calls.is_empty() {
                FinishReason::Stop
            } else {
                FinishReason::ToolUse
            };
            chunks.extend(
                reply
                    .tool_calls
                    .into_iter()
                    .map(|call| Ok(StreamChunk::ToolCall { call })),
            );
            chunks.push(Ok(StreamChunk::Finished {
                finish_reason: Some(finish_reason),
                usage: None,
            }));
            Ok(Box::pin(tokio_stream::iter(chunks)))
        }
    }

    fn text(content: &str) -> Completion {
        Completion {
            content: content.into(),
            ..Completion::default()
        }
    }

    fn calling(name: &str, arguments: serde_json::Value) -> Completion {
        Completion {
            tool_calls: vec![ToolCall::new(
                "call_1",
                name,
                arguments.as_object().cloned().unwrap(),
            )],
            ..Completion::default()
        }
    }

    fn wire(provider: Arc<dyn LlmProvider>) -> (Services, Arc<SqliteMemoryStore>) {
        let store = Arc::new(SqliteMemoryStore::open_in_memory().unwrap());
        let services = Services {
            provider,
            weather: Arc::new(MockWeatherProvider::new()),
            store: Arc::clone(&store) as Arc<dyn MemoryStore>,
            debug: false,
        };
        (services, store)
    }

    fn lines(input: &[&str]) -> impl Stream<Item = io::Result<String>> + Unpin {
        let owned: Vec<io::Result<String>> = input.iter().map(|l| Ok((*l).to_string())).collect();
        tokio_stream::iter(owned)
    }

    async fn chat(services: &Services, options: &ChatOptions, input: &[&str]) -> (SessionEnd, String) {
        let mut console = Console::new(Vec::new());
        let code = run(services, options, &mut lines(input), &mut console)
            .await
            .unwrap();
        (code, String::from_utf8(console.into_inner()).unwrap())
    }

    #[tokio::test]
    async fn test_new_user_chat() {
        let provider = CannedProvider::new(vec![text("It's sunny in Lisbon.")]);
        let (services, _) = wire(provider);
        let options = ChatOptions::default();

        let (code, out) = chat(&services, &options, &["Ana", "Weather in Lisbon?", "/exit"]).await;

        assert_eq!(code, SessionEnd::Finished);
        assert!(out.contains("What should I call you? "));
        assert!(out.contains("Nice to meet you, Ana! I'm your AI weather assistant."));
        assert!(out.contains("Bot: It's sunny in Lisbon.\n"));
        assert!(!out.contains("Summarizing conversation..."));
        assert!(out.ends_with("Goodbye!\n"));
    }

    #[tokio::test]
    async fn test_short_name_is_rejected() {
        let (services, _) = wire(CannedProvider::new(vec![]));
        let options = ChatOptions {
            user: Some(" A ".into()),
            ..ChatOptions::default()
        };

        let (code, out) = chat(&services, &options, &[]).await;
        assert_eq!(code, SessionEnd::NoUser);
        assert!(out.contains("Username must be at least 2 characters long."));
    }

    #[tokio::test]
    async fn test_failed_turn_shows_apology() {
        let (services, _) = wire(CannedProvider::new(vec![]));
        let options = ChatOptions {
            user: Some("Ana".into()),
            ..ChatOptions::default()
        };

        let (code, out) = chat(&services, &options, &["Hello"]).await;
        assert_eq!(code, SessionEnd::Finished);
        assert!(out.contains(agent_core::error::GENERIC_APOLOGY));
        assert!(out.ends_with("Goodbye!\n"));
    }

    #[tokio::test]
    async fn test_streamed_answer_from_earlier_step_is_shown() {
        let mut checking = calling(
            "get_current_weather",
            serde_json::json!({"location": "Lisbon"}),
        );
        checking.content = "Let me check.".into();
        let (services, _) = wire(CannedProvider::new(vec![checking, text("")]));
        let options = ChatOptions {
            user: Some("Ana".into()),
            streaming: true,
            ..ChatOptions::default()
        };

        let (_, out) = chat(&services, &options, &["Weather in Lisbon?", "/exit"]).await;
        assert!(out.contains("\rBot: Let me check.\n"));
    }

    #[tokio::test]
    async fn test_streamed_silent_round_shows_fallback() {
        let (services, _) = wire(CannedProvider::new(vec![text("")]));
        let options = ChatOptions {
            user: Some("Ana".into()),
            streaming: true,
            ..ChatOptions::default()
        };

        let (_, out) = chat(&services, &options, &["Hello", "/exit"]).await;
        assert!(out.contains(&format!("\rBot: {FALLBACK_RESPONSE}\n")));
        assert!(!out.contains("Bot: |\n"));
    }

    #[tokio::test]
    async fn test_memory_mode_saves_on_exit() {
        let provider = CannedProvider::new(vec![
            text("Noted, you live in Lisbon."),
            calling(
                "record_user_memory",
                serde_json::json!({"key": "home_location", "value": "Lisbon"}),
            ),
            text("I'll remember that you live in Lisbon."),
        ]);
        let (services, store) = wire(provider);
        let options = ChatOptions {
            user: Some("Ana".into()),
            memory_mode: true,
            save_on_exit: true,
            ..ChatOptions::default()
        };

        let (_, out) = chat(&services, &options, &["I live in Lisbon", "/EXIT"]).await;

        assert!(out.contains("Memory mode enabled - I'll remember important details"));
        assert!(out.contains("Summarizing conversation..."));
        assert!(out.contains("Conversation summarized and saved!"));

        let user = store.find_user("Ana").unwrap().unwrap();
        let memories = store.list(&user).unwrap();
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].value, "Lisbon");

        let (_, again) = chat(&services, &options, &["/exit"]).await;
        assert!(again.contains("Welcome back, Ana!"));
        assert!(again.contains("I remember 1 things about you"));
        assert!(!again.contains("Summarizing conversation..."));
    }
}
