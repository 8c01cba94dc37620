//! Error types for the Pocketchat session manager.

use thiserror::Error;

/// Errors reported by an inference engine binding.
///
/// The engine is authoritative for its own failures; the session manager only
/// classifies them so they can be carried inside [`ChatError::CompletionFailed`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The completion call failed inside the engine.
    #[error("completion failed: {0}")]
    Completion(String),

    /// Resetting the engine's internal history failed.
    #[error("rewind failed: {0}")]
    Rewind(String),

    /// The engine rejected or failed a stop request.
    #[error("cancellation failed: {0}")]
    Cancellation(String),

    /// The engine has no loaded model or context.
    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

/// A shared error type for the entire Pocketchat workspace.
///
/// Every variant is a recoverable, reportable condition. Cancellation of a
/// completion is deliberately absent: a stopped completion resolves with its
/// partial content.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    /// No engine context exists yet; the caller must prime first.
    #[error("Inference context is not available")]
    ContextUnavailable,

    /// Rewind timed out or the history-load completion failed.
    #[error("Context synchronization failed: {reason}")]
    ContextSyncFailed { reason: String },

    /// The engine failed mid-completion. Partial output is discarded.
    #[error("Completion failed: {0}")]
    CompletionFailed(#[source] EngineError),

    /// The conversation store failed to persist, load or delete.
    #[error("Conversation store failure: {0}")]
    StoreFailure(String),

    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// The operation is not valid in the coordinator's current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The caller supplied unusable input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },
}

impl ChatError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a ContextSyncFailed error
    pub fn context_sync(reason: impl Into<String>) -> Self {
        Self::ContextSyncFailed {
            reason: reason.into(),
        }
    }

    /// Creates a StoreFailure error
    pub fn store(message: impl Into<String>) -> Self {
        Self::StoreFailure(message.into())
    }

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an InvalidState error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a ContextUnavailable error
    pub fn is_context_unavailable(&self) -> bool {
        matches!(self, Self::ContextUnavailable)
    }

    /// Check if this is a ContextSyncFailed error
    pub fn is_context_sync_failed(&self) -> bool {
        matches!(self, Self::ContextSyncFailed { .. })
    }

    /// Check if this is a CompletionFailed error
    pub fn is_completion_failed(&self) -> bool {
        matches!(self, Self::CompletionFailed(_))
    }

    /// Check if this is a StoreFailure error
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::StoreFailure(_))
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<EngineError> for ChatError {
    fn from(err: EngineError) -> Self {
        Self::CompletionFailed(err)
    }
}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ChatError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for ChatError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, ChatError>`.
pub type Result<T> = std::result::Result<T, ChatError>;
