use thiserror::Error;

// Client-facing error taxonomy. Every variant carries the human-readable text shown to the
// user; server-supplied messages are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    // Rejected input, either locally before any request or by the backend.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    // Join, join-code and session failures.
    #[error("{0}")]
    Auth(String),
    // Network unreachable or timed out.
    #[error("transport error: {0}")]
    Transport(String),
    // A success response that was not the JSON shape we expected.
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
}

// Display-only refinement of a server message. Never derived from local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureHint {
    InsufficientFunds,
    UnknownPlayer,
    Unauthorized,
    InvalidInput,
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            ClientError::Validation(message)
            | ClientError::NotFound(message)
            | ClientError::Auth(message)
            | ClientError::Transport(message)
            | ClientError::Protocol(message) => message,
            ClientError::Server { message, .. } => message,
        }
    }

    // Only errors that carry a backend-asserted message are classified.
    pub fn hint(&self) -> Option<FailureHint> {
        match self {
            ClientError::Validation(message)
            | ClientError::NotFound(message)
            | ClientError::Auth(message) => classify_message(message),
            _ => None,
        }
    }
}

fn classify_message(message: &str) -> Option<FailureHint> {
    let lower = message.to_lowercase();
    if lower.contains("insufficient") || lower.contains("not enough") {
        Some(FailureHint::InsufficientFunds)
    } else if lower.contains("not found") || lower.contains("unknown player") {
        Some(FailureHint::UnknownPlayer)
    } else if lower.contains("unauthorized")
        || lower.contains("forbidden")
        || lower.contains("not allowed")
    {
        Some(FailureHint::Unauthorized)
    } else if lower.contains("invalid") || lower.contains("must be") {
        Some(FailureHint::InvalidInput)
    } else {
        None
    }
}
