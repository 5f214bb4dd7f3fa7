//! Conversation history: message types, the in-memory store and its persistence

mod kv;
mod store;
mod types;

pub use kv::{CHATS_KEY, FileKvStore, KeyValueStore, MODEL_KEY, MemoryKvStore};
pub use store::ConversationStore;
pub use types::{
    ChatMessage, Conversation, ConversationId, DEFAULT_TITLE, Sender, TITLE_MAX_CHARS,
    derive_title,
};
