//! Conversation updater helper for the "find → update → save" pattern.

use pocketchat_core::conversation::{Conversation, ConversationRepository};
use pocketchat_core::{ChatError, Result};
use std::sync::Arc;

/// Loads a stored conversation, applies an update, refreshes its timestamp
/// and saves it back.
pub struct ConversationUpdater {
    repository: Arc<dyn ConversationRepository>,
}

impl ConversationUpdater {
    pub fn new(repository: Arc<dyn ConversationRepository>) -> Self {
        Self { repository }
    }

    /// Updates a conversation by applying the given updater function.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The conversation doesn't exist
    /// - The updater function returns an error
    /// - Saving to storage fails
    pub async fn update<F>(&self, conversation_id: &str, updater: F) -> Result<Conversation>
    where
        F: FnOnce(&mut Conversation) -> Result<()>,
    {
        tracing::debug!("[ConversationUpdater] update() called for id: {}", conversation_id);

        let mut conversation = self
            .repository
            .find_by_id(conversation_id)
            .await?
            .ok_or_else(|| ChatError::not_found("Conversation", conversation_id))?;

        updater(&mut conversation)?;
        conversation.touch();

        self.repository.save(&conversation).await?;
        tracing::debug!(
            "[ConversationUpdater] Conversation saved: id={}, title={}",
            conversation.id,
            conversation.title
        );

        Ok(conversation)
    }
}
