//! # agent-core
//!
//! Tool orchestration and streaming reconciliation for LLM chat agents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ChatSession                           │
//! │  ┌──────────────────┐  ┌─────────────┐  ┌────────────────┐  │
//! │  │ ChatOrchestrator │──│    Tool     │  │  LlmProvider   │  │
//! │  │   (≤ 3 steps)    │  │  Registry   │  │  (Strategy)    │  │
//! │  └────────┬─────────┘  └─────────────┘  └────────────────┘  │
//! │           │ StreamFragment                                  │
//! │  ┌────────▼─────────┐                                       │
//! │  │ StreamReconciler │──▶ DisplaySink                        │
//! │  └──────────────────┘                                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait enables swapping between Anthropic, Ollama, or any
//! other provider without changing the orchestration logic.

pub mod error;
pub mod message;
pub mod orchestrator;
pub mod provider;
pub mod session;
pub mod stream;
pub mod tool;

pub use error::{AgentError, Result, RoundFailure};
pub use message::{Conversation, Message, Role};
pub use orchestrator::{ChatOrchestrator, ChatOrchestratorBuilder, MAX_STEPS, Round};
pub use provider::{LlmProvider, StepRequest};
pub use session::{ChatSession, SessionId};
pub use stream::{DisplayInstruction, DisplaySink, StreamFragment, StreamReconciler};
pub use tool::{Tool, ToolCall, ToolFailure, ToolRegistry, ToolResult, ToolSchema};
