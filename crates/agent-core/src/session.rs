//! Session Management
//!
//! A chat session owns the conversation history and the per-user flags that
//! shape each round. History only changes between rounds: one user message per
//! turn, plus the assistant's answer when the round completes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RoundFailure;
use crate::message::{Conversation, Message};
use crate::orchestrator::{ChatOrchestrator, MAX_STEPS, Round};
use crate::stream::DisplaySink;
use crate::tool::ToolRegistry;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One user's conversation with the assistant
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatSession {
    /// Unique identifier
    pub id: SessionId,

    /// Display name of the user
    pub user: String,

    /// Stream answers as they are generated
    pub streaming: bool,

    /// Step budget handed to each round
    pub max_steps: usize,

    conversation: Conversation,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// Create a new session
    pub fn new(user: impl Into<String>, streaming: bool) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            user: user.into(),
            streaming,
            max_steps: MAX_STEPS,
            conversation: Conversation::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Conversation so far
    pub const fn history(&self) -> &Conversation {
        &self.conversation
    }

    /// Message count
    pub fn message_count(&self) -> usize {
        self.conversation.len()
    }

    /// Duration since creation
    pub fn duration(&self) -> chrono::Duration {
        self.updated_at - self.created_at
    }

    /// Update the activity timestamp
    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Handle one user turn.
    ///
    /// The user's message is recorded whatever happens; the assistant's answer
    /// only when the round succeeds, so a failed turn can simply be retried.
    pub async fn turn(
        &mut self,
        orchestrator: &ChatOrchestrator,
        tools: &ToolRegistry,
        input: impl Into<String>,
        sink: &mut dyn DisplaySink,
    ) -> Result<String, RoundFailure> {
        self.conversation.push(Message::user(input));
        self.touch();

        let round = Round {
            user: &self.user,
            history: self.conversation.messages(),
            tools,
            max_steps: self.max_steps,
            streaming: self.streaming,
        };
        let answer = orchestrator.execute(&round, sink).await?;

        self.conversation.push(Message::assistant(answer.clone()));
        self.touch();
        Ok(answer)
    }

    /// Run a round on the history plus `request` without recording anything
    pub async fn aside(
        &self,
        orchestrator: &ChatOrchestrator,
        tools: &ToolRegistry,
        request: impl Into<String>,
        sink: &mut dyn DisplaySink,
    ) -> Result<String, RoundFailure> {
        let history = self.conversation.with_appended(Message::user(request));
        let round = Round {
            user: &self.user,
            history: history.messages(),
            tools,
            max_steps: self.max_steps,
            streaming: self.streaming,
        };
        orchestrator.execute(&round, sink).await
    }
}
