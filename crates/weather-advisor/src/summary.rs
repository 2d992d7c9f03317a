//! User Context Summary
//!
//! A read-only report of everything remembered about a user, grouped by the
//! category conventions of the memory keys.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::memory::MemoryStore;
use crate::model::{MemoryCategory, MemoryEntry, User};

/// Render the summary for `user_name`, or a not-found notice
pub fn summarize_user(store: &dyn MemoryStore, user_name: &str, now: DateTime<Utc>) -> Result<String> {
    let Some(user) = store.find_user(user_name)? else {
        return Ok(format!("No data found for user: {user_name}"));
    };

    let mut memories = store.list(&user)?;
    memories.reverse();
    Ok(render_summary(&user, &memories, now))
}

/// Summary text for a user and their memories, in the order given
pub fn render_summary(user: &User, memories: &[MemoryEntry], now: DateTime<Utc>) -> String {
    let mut out = format!("Summary for {}:\n\n", user.name);

    if memories.is_empty() {
        out.push_str("No memories found for this user.\n");
        return out;
    }

    for category in MemoryCategory::ALL {
        let group: Vec<&MemoryEntry> = memories
            .iter()
            .filter(|m| category.includes(&m.key))
            .collect();
        if group.is_empty() {
            continue;
        }

        out.push_str(&format!("{}:\n", category.heading()));
        for memory in group {
            out.push_str(&format!("  • {}: {}\n", memory.key, memory.value));
        }
        out.push('\n');
    }

    out.push_str(&format!(
        "Account created: {}\nLast updated: {}",
        relative_time(user.created_at, now),
        relative_time(user.updated_at, now)
    ));
    out
}

/// Describe how long ago `then` was, e.g. `3 days ago`
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds();
    let (amount, unit) = match seconds.abs() {
        s if s < 60 => (s.max(1), "second"),
        s if s < 3_600 => (s / 60, "minute"),
        s if s < 86_400 => (s / 3_600, "hour"),
        s if s < 7 * 86_400 => (s / 86_400, "day"),
        s if s < 30 * 86_400 => (s / (7 * 86_400), "week"),
        s if s < 365 * 86_400 => (s / (30 * 86_400), "month"),
        s => (s / (365 * 86_400), "year"),
    };

    let plural = if amount == 1 { "" } else { "s" };
    if seconds < 0 {
        format!("{amount} {unit}{plural} from now")
    } else {
        format!("{amount} {unit}{plural} ago")
    }
}
