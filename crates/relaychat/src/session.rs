//! Session context: conversations, model selection and their persistence
//!
//! Every piece of state a front-end would otherwise keep in globals lives
//! here and is passed explicitly to the request controller.

use std::sync::Arc;

use crate::controller::{ChatRequest, OutboundMessage};
use crate::conversation::{
    ChatMessage, Conversation, ConversationId, ConversationStore, KeyValueStore, MODEL_KEY,
    Sender,
};
use crate::error::{RelayChatError, Result};
use crate::models::{ModelCatalog, ModelProfile};

pub struct ChatSession {
    store: ConversationStore,
    catalog: ModelCatalog,
    selected: String,
    include_history: bool,
    kv: Arc<dyn KeyValueStore>,
}

impl ChatSession {
    /// Load conversations and the persisted model selection
    pub fn open(
        kv: Arc<dyn KeyValueStore>,
        catalog: ModelCatalog,
        include_history: bool,
    ) -> Result<Self> {
        let store = ConversationStore::load(kv.as_ref())?;

        let persisted = match kv.get(MODEL_KEY)? {
            Some(raw) => match serde_json::from_str::<String>(&raw) {
                Ok(name) => Some(name),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable saved model selection: {e}");
                    None
                }
            },
            None => None,
        };
        let selected = catalog.resolve(persisted.as_deref()).name.clone();

        Ok(Self {
            store,
            catalog,
            selected,
            include_history,
            kv,
        })
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn selected_model(&self) -> &ModelProfile {
        self.catalog.resolve(Some(&self.selected))
    }

    /// Select a model by name and persist the choice
    pub fn select_model(&mut self, name: &str) -> Result<()> {
        let profile = self
            .catalog
            .get(name)
            .ok_or_else(|| RelayChatError::Config(format!("Unknown model: {name}")))?;
        self.selected = profile.name.clone();
        self.kv
            .set(MODEL_KEY, &serde_json::to_string(&self.selected)?)?;
        tracing::info!(model = %self.selected, "Selected model");
        Ok(())
    }

    pub fn conversations(&self) -> &[Conversation] {
        self.store.list()
    }

    pub fn conversation(&self, id: ConversationId) -> Option<&Conversation> {
        self.store.get(id)
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.store.active()
    }

    pub fn new_conversation(&mut self) -> Result<ConversationId> {
        let id = self.store.create_new();
        self.persist()?;
        Ok(id)
    }

    pub fn switch_conversation(&mut self, id: ConversationId) -> Result<()> {
        self.store.switch_to(id)
    }

    pub fn delete_conversation(&mut self, id: ConversationId) -> Result<()> {
        self.store.delete(id)?;
        self.persist()
    }

    pub fn persist(&self) -> Result<()> {
        self.store.save(self.kv.as_ref())
    }

    /// Record the user's message in the active conversation (creating one if
    /// none is active), save it, and add the placeholder for the reply.
    ///
    /// A placeholder left behind by an abandoned exchange is dropped first.
    pub fn begin_exchange(&mut self, text: &str) -> Result<ConversationId> {
        let conversation = self.store.active_or_create();
        if conversation.placeholder().is_some() {
            tracing::warn!(conversation = %conversation.id, "Discarding stale reply placeholder");
            conversation.discard_placeholder();
        }
        conversation.add_user_message(text);
        let id = conversation.id;
        self.persist()?;

        self.conversation_mut(id)?.push_placeholder()?;
        Ok(id)
    }

    /// Outbound request for the latest user message of a conversation
    pub fn build_request(&self, id: ConversationId) -> Result<ChatRequest> {
        let conversation = self
            .store
            .get(id)
            .ok_or_else(|| unknown_conversation(id))?;

        let messages: Vec<OutboundMessage> = if self.include_history {
            conversation
                .committed_messages()
                .map(OutboundMessage::from)
                .collect()
        } else {
            conversation
                .committed_messages()
                .filter(|m| m.sender == Sender::User)
                .last()
                .map(OutboundMessage::from)
                .into_iter()
                .collect()
        };

        Ok(ChatRequest::new(self.selected_model(), messages))
    }

    /// Replace the placeholder with the final reply and save
    pub fn commit_reply(&mut self, id: ConversationId, content: &str) -> Result<ChatMessage> {
        let message = self.conversation_mut(id)?.resolve_placeholder(content);
        self.persist()?;
        Ok(message)
    }

    /// Remove the placeholder without committing anything
    pub fn discard_placeholder(&mut self, id: ConversationId) -> Result<()> {
        if let Some(conversation) = self.store.get_mut(id) {
            conversation.discard_placeholder();
        }
        Ok(())
    }

    fn conversation_mut(&mut self, id: ConversationId) -> Result<&mut Conversation> {
        self.store
            .get_mut(id)
            .ok_or_else(|| unknown_conversation(id))
    }
}

fn unknown_conversation(id: ConversationId) -> RelayChatError {
    RelayChatError::Store(format!("Unknown conversation: {id}"))
}
