use relaychat::RelayChatError;
use thiserror::Error;

/// Failures surfaced by the terminal front end
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("Ambiguous conversation id '{0}', use more characters")]
    AmbiguousConversation(String),

    #[error("No conversations yet")]
    NoConversations,

    #[error(transparent)]
    Chat(#[from] RelayChatError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_keep_their_message() {
        let err = CliError::from(RelayChatError::Config("bad relay URL".to_string()));
        assert_eq!(err.to_string(), RelayChatError::Config("bad relay URL".to_string()).to_string());
    }

    #[test]
    fn test_lookup_errors_name_the_id() {
        assert_eq!(
            CliError::ConversationNotFound("1a2b".to_string()).to_string(),
            "Conversation not found: 1a2b"
        );
        assert!(
            CliError::AmbiguousConversation("1".to_string())
                .to_string()
                .contains("'1'")
        );
    }
}
