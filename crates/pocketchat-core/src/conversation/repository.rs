//! Conversation repository trait.
//!
//! Defines the interface for conversation persistence operations.

use super::model::Conversation;
use crate::error::Result;
use async_trait::async_trait;

/// An abstract store for persisted conversations.
///
/// Decouples the session manager from the concrete storage mechanism. Errors
/// are reported as [`crate::ChatError::StoreFailure`] (or `NotFound` where
/// noted); the in-memory state of callers is never rolled back on failure.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Lists all stored conversations, most recently updated first.
    async fn list_all(&self) -> Result<Vec<Conversation>>;

    /// Finds a conversation by its ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Conversation))`: Conversation found
    /// - `Ok(None)`: Conversation not found
    /// - `Err(_)`: Error occurred during retrieval
    async fn find_by_id(&self, conversation_id: &str) -> Result<Option<Conversation>>;

    /// Saves (creates or replaces) a conversation.
    async fn save(&self, conversation: &Conversation) -> Result<()>;

    /// Deletes a conversation.
    ///
    /// Deleting an id that is already gone is a no-op and must not corrupt
    /// the store.
    async fn delete(&self, conversation_id: &str) -> Result<()>;
}
