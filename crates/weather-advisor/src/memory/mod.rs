//! User Memory
//!
//! Durable per-user facts the assistant can load and record, plus the user
//! registry they hang off.

mod sqlite;

pub use sqlite::SqliteMemoryStore;

use crate::error::{AdvisorError, Result};
use crate::model::{MemoryCategory, MemoryContext, MemoryEntry, User};

/// Shortest accepted user name, after trimming
pub const MIN_USER_NAME_LEN: usize = 2;

/// Memory store trait for persistence
pub trait MemoryStore: Send + Sync {
    /// Look a user up by exact name
    fn find_user(&self, name: &str) -> Result<Option<User>>;

    /// Fetch a user by name, creating it when missing.
    ///
    /// The flag is `true` when the user was created by this call.
    fn find_or_create_user(&self, name: &str) -> Result<(User, bool)>;

    /// All memories of a user, most recently recorded first
    fn list(&self, user: &User) -> Result<Vec<MemoryEntry>>;

    /// Insert or replace the memory stored under `key`
    fn upsert(
        &self,
        user: &User,
        key: &str,
        value: &str,
        context: &MemoryContext,
    ) -> Result<MemoryEntry>;

    /// Number of memories held for a user
    fn count(&self, user: &User) -> Result<usize> {
        Ok(self.list(user)?.len())
    }
}

/// Outcome of resolving the user for a chat session
#[derive(Clone, Debug)]
pub struct Registration {
    pub user: User,
    pub created: bool,
}

/// Resolve a chat user by name, creating a record for first-time users
pub fn find_or_create(store: &dyn MemoryStore, name: &str) -> Result<Registration> {
    let name = name.trim();
    if name.chars().count() < MIN_USER_NAME_LEN {
        return Err(AdvisorError::InvalidUserName(
            "Username must be at least 2 characters long.".into(),
        ));
    }

    let (user, created) = store.find_or_create_user(name)?;
    if created {
        tracing::info!(user = %user.name, "Registered new user");
    }
    Ok(Registration { user, created })
}

/// Render memories one per line with an icon for their category
pub fn format_memories(user: &User, memories: &[MemoryEntry]) -> String {
    if memories.is_empty() {
        return format!(
            "No previous memories found for {}. This appears to be a new conversation.",
            user.name
        );
    }

    let lines: Vec<String> = memories
        .iter()
        .map(|m| format!("{} {}: {}", MemoryCategory::of(&m.key).icon(), m.key, m.value))
        .collect();
    format!("Loaded memories for {}:\n{}", user.name, lines.join("\n"))
}
