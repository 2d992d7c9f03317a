use agent_core::AgentError;
use reqwest::StatusCode;

/// Classify a failed HTTP response from a provider API
pub(crate) fn status_error(status: StatusCode, body: &str) -> AgentError {
    let detail = format!("HTTP {status}: {}", truncate(body, 512));
    match status.as_u16() {
        401 | 403 => AgentError::Auth(detail),
        429 => AgentError::RateLimited(detail),
        500..=599 => AgentError::ProviderUnavailable(detail),
        _ => AgentError::Provider(detail),
    }
}

/// Map a transport failure, treating connection problems as unavailability
pub(crate) fn transport_error(err: &reqwest::Error) -> AgentError {
    if err.is_connect() || err.is_timeout() {
        AgentError::ProviderUnavailable(err.to_string())
    } else {
        AgentError::Provider(err.to_string())
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
