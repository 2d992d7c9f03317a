//! Service Kit - Agent Tools
//!
//! Domain-specific tools that implement `agent_core::Tool` for the weather
//! assistant.

mod current_weather;
mod forecast;
mod load_memories;
mod record_memory;

pub use current_weather::CurrentWeatherTool;
pub use forecast::ForecastTool;
pub use load_memories::LoadMemoriesTool;
pub use record_memory::RecordMemoryTool;
