//! Load Memories Tool

use std::sync::Arc;

use agent_core::tool::{ParameterSchema, Tool, ToolArguments, ToolFailure, ToolOutcome, ToolSchema};
use async_trait::async_trait;

use crate::memory::{MemoryStore, format_memories};
use crate::model::User;

/// Tool that lists what is remembered about the current user
pub struct LoadMemoriesTool {
    store: Arc<dyn MemoryStore>,
    user: User,
}

impl LoadMemoriesTool {
    pub fn new(store: Arc<dyn MemoryStore>, user: User) -> Self {
        Self { store, user }
    }
}

#[async_trait]
impl Tool for LoadMemoriesTool {
    fn name(&self) -> &str {
        "load_user_memories"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().into(),
            description: "Load stored information about the user from previous conversations. Call this at the start of the conversation.".into(),
            parameters: vec![ParameterSchema::string(
                "reason",
                "A short justification for why you need to access user memories.",
            )],
        }
    }

    async fn run(&self, arguments: &ToolArguments) -> ToolOutcome {
        if let Some(reason) = arguments.get("reason").and_then(|v| v.as_str()) {
            tracing::debug!(user = %self.user.name, reason, "Loading memories");
        }

        let memories = self.store.list(&self.user).map_err(|e| {
            tracing::error!(user = %self.user.name, error = %e, "Failed to load memories");
            ToolFailure::Backend("❌ Failed to load memories. Please try again.".into())
        })?;
        Ok(format_memories(&self.user, &memories))
    }
}
