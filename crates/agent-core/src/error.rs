//! Error Types

use std::panic::Location;

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error (transport, API status, stream interruption)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The model asked for a tool that is not registered for this round
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Parse error (e.g., malformed provider payload)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rate limited
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),
}

impl AgentError {
    /// Whether the same request could succeed if sent again
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_) | Self::RateLimited(_))
    }
}

/// Apology shown to the user when a round fails and debug output is off.
pub const GENERIC_APOLOGY: &str =
    "I'm sorry, I encountered an error while processing your request. Please try again.";

/// A failed orchestration round, already reduced to what the user should see.
///
/// The underlying error stays attached for callers that want to inspect it;
/// the session history is never touched by a failed round.
#[derive(Debug, Error)]
#[error("{user_message}")]
pub struct RoundFailure {
    /// Text to show the end user
    pub user_message: String,

    /// Where the round failed
    pub location: &'static Location<'static>,

    /// The error that aborted the round
    #[source]
    pub source: AgentError,
}

impl RoundFailure {
    /// Reduce `source` to a user-facing failure.
    ///
    /// With `debug` set the raw error and call site are shown instead of the
    /// generic apology.
    pub fn new(source: AgentError, location: &'static Location<'static>, debug: bool) -> Self {
        let user_message = if debug {
            format!(
                "DEBUG ERROR: {source} in {}:{}",
                location.file(),
                location.line()
            )
        } else {
            GENERIC_APOLOGY.to_string()
        };

        Self {
            user_message,
            location,
            source,
        }
    }
}
