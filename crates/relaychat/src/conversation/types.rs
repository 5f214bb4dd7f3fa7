use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{RelayChatError, Result};

/// Title given to a conversation until its first user message arrives
pub const DEFAULT_TITLE: &str = "New Chat";

/// Maximum characters of the first user line kept in a title
pub const TITLE_MAX_CHARS: usize = 30;

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl Sender {
    /// Role name in the chat-completion schema
    pub fn role(self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Ai => "assistant",
        }
    }
}

/// One message of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub content: String,
    /// Marks the in-progress assistant entry of an exchange
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            content: content.into(),
            pending: false,
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            sender: Sender::Ai,
            content: content.into(),
            pending: false,
        }
    }

    /// The "assembling" entry shown before a reply is committed
    pub fn placeholder() -> Self {
        Self {
            sender: Sender::Ai,
            content: String::new(),
            pending: true,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.pending
    }
}

/// Opaque unique conversation identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(Uuid);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConversationId {
    type Err = RelayChatError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| RelayChatError::Store(format!("Invalid conversation id '{s}': {e}")))
    }
}

/// Derive a title from the first line of a user message
pub fn derive_title(content: &str) -> String {
    let first_line = content.split('\n').next().unwrap_or_default();
    let title: String = first_line.chars().take(TITLE_MAX_CHARS).collect();
    if title.chars().count() < TITLE_MAX_CHARS {
        title
    } else {
        format!("{title}...")
    }
}

/// An ordered exchange history with a fixed title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            id: ConversationId::new(),
            title: DEFAULT_TITLE.to_string(),
            created_at: Utc::now(),
            messages: Vec::new(),
        }
    }

    /// Append a user message; the first one fixes the title
    pub fn add_user_message(&mut self, content: impl Into<String>) {
        let content = content.into();
        if !self.messages.iter().any(|m| m.sender == Sender::User) {
            self.title = derive_title(&content);
        }
        self.messages.push(ChatMessage::user(content));
    }

    pub fn placeholder(&self) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.is_placeholder())
    }

    /// Add the in-progress entry; a conversation holds at most one
    pub fn push_placeholder(&mut self) -> Result<()> {
        if self.placeholder().is_some() {
            return Err(RelayChatError::Store(format!(
                "Conversation {} already has a reply in progress",
                self.id
            )));
        }
        self.messages.push(ChatMessage::placeholder());
        Ok(())
    }

    /// Replace the placeholder with the final reply, or append it if none exists
    pub fn resolve_placeholder(&mut self, content: impl Into<String>) -> ChatMessage {
        let message = ChatMessage::ai(content);
        match self.messages.iter_mut().find(|m| m.is_placeholder()) {
            Some(slot) => *slot = message.clone(),
            None => self.messages.push(message.clone()),
        }
        message
    }

    /// Drop any in-progress entry without committing anything
    pub fn discard_placeholder(&mut self) {
        self.messages.retain(|m| !m.is_placeholder());
    }

    /// Messages that are committed, in order
    pub fn committed_messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| !m.is_placeholder())
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
