//! Inference engine interface.
//!
//! The engine is a native, stateful binding that keeps its own message
//! history. The session manager consumes it only through [`InferenceEngine`].

use crate::conversation::Message;
use crate::error::EngineError;
use crate::metrics::TimingSummary;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Role tag attached to each turn sent to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A `{role, content}` pair as the engine understands it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Message> for ChatTurn {
    fn from(message: &Message) -> Self {
        let role = if message.is_user {
            ChatRole::User
        } else {
            ChatRole::Assistant
        };
        Self {
            role,
            content: message.text.clone(),
        }
    }
}

/// Parameters of a single completion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatTurn>,
    /// Prediction-length ceiling (`n_predict`).
    pub max_tokens: u32,
    /// Sentinels at which the engine truncates generation.
    pub stop: Vec<String>,
}

/// One pushed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEvent {
    pub token: String,
}

/// Per-token callback. The engine may invoke it from any thread, rapidly and
/// repeatedly, so implementations must never block.
pub type TokenCallback = Arc<dyn Fn(TokenEvent) + Send + Sync>;

/// Outcome of a completion call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResult {
    pub text: String,
    /// End-of-completion timing summary, when the engine reports one.
    pub timings: Option<TimingSummary>,
}

/// The live, stateful inference engine binding.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Runs a completion. When `on_token` is set, tokens are pushed through it
    /// as they are generated.
    async fn completion(
        &self,
        request: CompletionRequest,
        on_token: Option<TokenCallback>,
    ) -> Result<CompletionResult, EngineError>;

    /// Best-effort cancellation of any in-flight completion.
    async fn stop_completion(&self) -> Result<(), EngineError>;

    /// Best-effort reset of the engine's internal history. May hang; callers
    /// must bound it with a timeout.
    async fn rewind(&self) -> Result<(), EngineError>;

    /// Whether the engine reports a completion in flight.
    fn is_completion_in_flight(&self) -> bool;

    /// Whether the engine is still loading its model.
    fn is_loading(&self) -> bool {
        false
    }
}
