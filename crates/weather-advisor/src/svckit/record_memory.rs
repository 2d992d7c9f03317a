//! Record Memory Tool
//!
//! The only tool with side effects: it writes a durable fact about the user.
//! Keys are validated before the store is touched.

use std::sync::Arc;

use agent_core::tool::{
    ParameterSchema, Tool, ToolArguments, ToolFailure, ToolOutcome, ToolSchema, string_arg,
};
use async_trait::async_trait;

use crate::memory::MemoryStore;
use crate::model::{MemoryContext, User};

/// Shortest accepted memory key
const MIN_KEY_LEN: usize = 3;

/// Whether `key` looks like a semantic key such as `home_location`
pub fn is_valid_key(key: &str) -> bool {
    key.contains('_') && key.len() >= MIN_KEY_LEN
}

/// Tool that stores a fact about the current user
pub struct RecordMemoryTool {
    store: Arc<dyn MemoryStore>,
    user: User,
}

impl RecordMemoryTool {
    pub fn new(store: Arc<dyn MemoryStore>, user: User) -> Self {
        Self { store, user }
    }
}

#[async_trait]
impl Tool for RecordMemoryTool {
    fn name(&self) -> &str {
        "record_user_memory"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().into(),
            description: "Store important information about the user for future conversations. Use semantic keys like \"home_location\", \"preferred_units\", \"favorite_cuisine\".".into(),
            parameters: vec![
                ParameterSchema::string(
                    "key",
                    "A semantic key for this memory using underscores. Examples: \"home_location\", \"work_location\", \"preferred_units\", \"favorite_cuisine\".",
                ),
                ParameterSchema::string("value", "The information to remember."),
            ],
        }
    }

    async fn run(&self, arguments: &ToolArguments) -> ToolOutcome {
        let key = string_arg(arguments, "key")?;
        let value = string_arg(arguments, "value")?;

        if !is_valid_key(key) {
            return Err(ToolFailure::Rejected(
                "Invalid memory key format. Please use descriptive keys with underscores like 'home_location', 'preferred_units'.".into(),
            ));
        }

        match self.store.upsert(&self.user, key, value, &MemoryContext::cli()) {
            Ok(_) => {
                tracing::info!(user = %self.user.name, key, "Memory recorded");
                Ok(format!("✅ Recorded memory: {key} = {value}"))
            }
            Err(e) => {
                tracing::error!(user = %self.user.name, key, error = %e, "Failed to record memory");
                Err(ToolFailure::Backend(
                    "❌ Failed to record memory. Please try again.".into(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::SqliteMemoryStore;
    use serde_json::json;

    fn setup() -> (Arc<SqliteMemoryStore>, RecordMemoryTool) {
        let store = Arc::new(SqliteMemoryStore::open_in_memory().unwrap());
        let (user, _) = store.find_or_create_user("Ana").unwrap();
        let tool = RecordMemoryTool::new(store.clone(), user);
        (store, tool)
    }

    fn args(key: &str, value: &str) -> ToolArguments {
        json!({ "key": key, "value": value }).as_object().cloned().unwrap()
    }

    #[test]
    fn test_key_rules() {
        assert!(is_valid_key("home_location"));
        assert!(is_valid_key("a_b"));
        assert!(!is_valid_key("ab"));
        assert!(!is_valid_key("a_"));
        assert!(!is_valid_key("homelocation"));
    }

    #[tokio::test]
    async fn test_invalid_key_does_not_touch_store() {
        let (store, tool) = setup();
        let user = store.find_user("Ana").unwrap().unwrap();

        let output = tool.invoke(&args("ab", "Lisbon")).await;

        assert!(output.starts_with("Invalid memory key format."));
        assert_eq!(store.count(&user).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_valid_key_upserts_once() {
        let (store, tool) = setup();
        let user = store.find_user("Ana").unwrap().unwrap();

        let output = tool.invoke(&args("home_location", "Lisbon")).await;

        assert_eq!(output, "✅ Recorded memory: home_location = Lisbon");
        let memories = store.list(&user).unwrap();
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].value, "Lisbon");
    }
}
