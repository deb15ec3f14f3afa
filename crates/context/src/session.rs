//! Per-conversation state

use docguard_common::ConversationTurn;
use docguard_search::VectorStore;
use uuid::Uuid;

/// One user's conversation and knowledge base.
///
/// Owned by the caller and passed into each assistant operation; nothing is
/// shared between sessions.
pub struct Session {
    id: Uuid,
    pub(crate) history: Vec<ConversationTurn>,
    pub(crate) knowledge_base: Option<VectorStore>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        Self {
            id,
            history: Vec::new(),
            knowledge_base: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Conversation so far, oldest first
    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn knowledge_base(&self) -> Option<&VectorStore> {
        self.knowledge_base.as_ref()
    }

    pub fn has_knowledge_base(&self) -> bool {
        self.knowledge_base.is_some()
    }

    /// Number of indexed chunks, 0 without a knowledge base
    pub fn chunk_count(&self) -> usize {
        self.knowledge_base.as_ref().map_or(0, VectorStore::len)
    }

    /// Drop the whole conversation
    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub(crate) fn record_exchange(&mut self, query: &str, answer: &str) {
        self.history.push(ConversationTurn::human(query));
        self.history.push(ConversationTurn::assistant(answer));
    }
}
