//! Error types for relaychat

use thiserror::Error;

/// Main error type for relaychat operations
#[derive(Error, Debug)]
pub enum RelayChatError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Relay server errors (bind, serve, client construction)
    #[error("Relay error: {0}")]
    Relay(String),

    /// Network-level failure on either leg of an exchange
    #[error("{0}")]
    Transport(String),

    /// The relay or provider answered with a non-success status before streaming
    #[error("API error ({status}): {message}")]
    UpstreamRejected { status: u16, message: String },

    /// Conversation store and persistence errors
    #[error("Store error: {0}")]
    Store(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// General errors
    #[error("{0}")]
    General(String),
}

impl From<serde_json::Error> for RelayChatError {
    fn from(e: serde_json::Error) -> Self {
        RelayChatError::Serialization(e.to_string())
    }
}

/// Result type alias for relaychat operations
pub type Result<T> = std::result::Result<T, RelayChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_rejected_display() {
        let err = RelayChatError::UpstreamRejected {
            status: 429,
            message: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "API error (429): rate limited");
    }

    #[test]
    fn test_transport_display_is_bare_message() {
        let err = RelayChatError::Transport("connection refused".to_string());
        assert_eq!(err.to_string(), "connection refused");
    }
}
