//! # agent-runtime
//!
//! Runtime providers for the weather chat agent.
//!
//! ## Providers
//!
//! - **Anthropic** (default): Claude Messages API with SSE streaming
//! - **Ollama**: Local LLM inference via Ollama's `/api/chat`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::AnthropicProvider;
//!
//! let provider = AnthropicProvider::from_env()?;
//! let orchestrator = ChatOrchestratorBuilder::new()
//!     .provider(Arc::new(provider))
//!     .build()?;
//! ```

#[cfg(feature = "anthropic")]
pub mod anthropic;

#[cfg(feature = "ollama")]
pub mod ollama;

mod status;

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicConfig, AnthropicProvider};

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};

// Re-export core types for convenience
pub use agent_core::{AgentError, LlmProvider, Result};
