//! Conversation message types.
//!
//! This module contains types for representing a single turn in a conversation
//! and the model descriptor recorded with it.

use crate::id::generate_unique_id;
use crate::metrics::ModelMetrics;
use serde::{Deserialize, Serialize};

/// Represents the author of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// Message typed by the user.
    User,
    /// Message generated by the model.
    Assistant,
}

/// Identifies a model the user can chat with.
///
/// `value` is the stable identifier (for example the weights file name) and
/// `label` is the human-readable name shown above assistant messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub value: String,
    pub label: String,
}

impl ModelDescriptor {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// A single turn in a conversation.
///
/// Messages are immutable once created and owned by the conversation that
/// contains them. Only assistant messages carry metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Opaque unique identifier.
    pub id: String,
    /// Whether the user authored this turn.
    pub is_user: bool,
    /// Raw text, including any reasoning delimiters or directives.
    pub text: String,
    /// Model that produced (or was selected for) this turn.
    #[serde(default)]
    pub model: ModelDescriptor,
    /// Performance metrics for assistant turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ModelMetrics>,
}

impl Message {
    /// Creates a user message with a fresh id.
    pub fn user(text: impl Into<String>, model: ModelDescriptor) -> Self {
        Self {
            id: generate_unique_id(),
            is_user: true,
            text: text.into(),
            model,
            metrics: None,
        }
    }

    /// Creates an assistant message with a fresh id.
    pub fn assistant(
        text: impl Into<String>,
        model: ModelDescriptor,
        metrics: Option<ModelMetrics>,
    ) -> Self {
        Self {
            id: generate_unique_id(),
            is_user: false,
            text: text.into(),
            model,
            metrics,
        }
    }

    pub fn role(&self) -> MessageRole {
        if self.is_user {
            MessageRole::User
        } else {
            MessageRole::Assistant
        }
    }
}
