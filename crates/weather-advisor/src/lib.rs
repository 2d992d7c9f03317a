//! # weather-advisor
//!
//! Weather lookups, durable user memories and the chat tools that expose
//! them to the assistant.
//!
//! ## Tool Sets
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Every session                                               │
//! │    get_current_weather   ── WeatherProvider (Open-Meteo)     │
//! │    get_weather_forecast  ── WeatherProvider (Open-Meteo)     │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Memory mode only                                            │
//! │    load_user_memories    ── MemoryStore (SQLite)             │
//! │    record_user_memory    ── MemoryStore (SQLite)             │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod memory;
pub mod model;
pub mod prompt;
pub mod summary;
pub mod svckit;
pub mod weather;

use std::sync::Arc;

use agent_core::ToolRegistry;

pub use error::{AdvisorError, Result};
pub use memory::{MemoryStore, Registration, SqliteMemoryStore, find_or_create};
pub use model::{MemoryCategory, MemoryContext, MemoryEntry, User};
pub use prompt::system_prompt;
pub use summary::summarize_user;
pub use weather::{MockWeatherProvider, OpenMeteoProvider, WeatherProvider};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{CurrentWeatherTool, ForecastTool, LoadMemoriesTool, RecordMemoryTool};
}

/// Instruction sent on exit so the assistant records what it learned
pub const SUMMARIZE_REQUEST: &str = "Please summarize our conversation and save any important information I shared using your memory tools. Focus on preferences, locations, or other details that would be useful to remember for future conversations.";

/// Tools offered to `user` for one session
pub fn chat_tools(
    weather: Arc<dyn WeatherProvider>,
    store: Arc<dyn MemoryStore>,
    user: &User,
    memory_mode: bool,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(tools::CurrentWeatherTool::new(Arc::clone(&weather)));
    registry.register(tools::ForecastTool::new(weather));

    if memory_mode {
        registry.register(tools::LoadMemoriesTool::new(Arc::clone(&store), user.clone()));
        registry.register(tools::RecordMemoryTool::new(store, user.clone()));
    }
    registry
}
