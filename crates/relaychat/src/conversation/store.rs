use super::kv::{CHATS_KEY, KeyValueStore};
use super::types::{Conversation, ConversationId};
use crate::error::{RelayChatError, Result};

/// All conversations, newest first, plus the active selection
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    active: Option<ConversationId>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the key-value store. The first conversation becomes active
    /// and any placeholder left behind by an interrupted exchange is dropped.
    pub fn load(kv: &dyn KeyValueStore) -> Result<Self> {
        let Some(raw) = kv.get(CHATS_KEY)? else {
            return Ok(Self::new());
        };

        let mut conversations: Vec<Conversation> = serde_json::from_str(&raw).map_err(|e| {
            RelayChatError::Serialization(format!("Failed to parse saved conversations: {e}"))
        })?;
        for conversation in &mut conversations {
            conversation.discard_placeholder();
        }

        let active = conversations.first().map(|c| c.id);
        tracing::debug!(count = conversations.len(), "Loaded conversations");
        Ok(Self {
            conversations,
            active,
        })
    }

    pub fn save(&self, kv: &dyn KeyValueStore) -> Result<()> {
        let json = serde_json::to_string(&self.conversations)?;
        kv.set(CHATS_KEY, &json)
    }

    pub fn list(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn get(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: ConversationId) -> Option<&mut Conversation> {
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    pub fn active_id(&self) -> Option<ConversationId> {
        self.active
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active.and_then(|id| self.get(id))
    }

    /// Start an empty conversation at the front of the list and make it active
    pub fn create_new(&mut self) -> ConversationId {
        let conversation = Conversation::new();
        let id = conversation.id;
        self.conversations.insert(0, conversation);
        self.active = Some(id);
        id
    }

    pub fn switch_to(&mut self, id: ConversationId) -> Result<()> {
        if self.get(id).is_none() {
            return Err(RelayChatError::Store(format!("Unknown conversation: {id}")));
        }
        self.active = Some(id);
        Ok(())
    }

    /// Delete a conversation; if it was active, the first remaining one takes over
    pub fn delete(&mut self, id: ConversationId) -> Result<()> {
        let before = self.conversations.len();
        self.conversations.retain(|c| c.id != id);
        if self.conversations.len() == before {
            return Err(RelayChatError::Store(format!("Unknown conversation: {id}")));
        }
        if self.active == Some(id) {
            self.active = self.conversations.first().map(|c| c.id);
        }
        Ok(())
    }

    /// Active conversation, creating one if none is active
    pub fn active_or_create(&mut self) -> &mut Conversation {
        let id = match self.active.filter(|id| self.get(*id).is_some()) {
            Some(id) => id,
            None => self.create_new(),
        };
        let index = self
            .conversations
            .iter()
            .position(|c| c.id == id)
            .unwrap_or(0);
        &mut self.conversations[index]
    }
}
