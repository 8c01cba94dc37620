//! Context synchronization.
//!
//! Brings the engine's internal history into agreement with a conversation's
//! message list before any completion runs against it.

use crate::context::{ContextLease, InferenceContext};
use crate::prompt::SystemPrompt;
use pocketchat_core::config::ChatConfig;
use pocketchat_core::conversation::Message;
use pocketchat_core::engine::{ChatTurn, CompletionRequest};
use pocketchat_core::{ChatError, Result};
use std::time::Duration;

/// Primes an [`InferenceContext`] for a conversation.
#[derive(Debug, Clone)]
pub struct ContextSynchronizer {
    prompt: SystemPrompt,
    prime_predict: u32,
    prime_stop: Vec<String>,
    rewind_timeout: Duration,
}

impl ContextSynchronizer {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        Ok(Self {
            prompt: SystemPrompt::new(config.system_prompt.clone())?,
            prime_predict: config.prime_predict,
            prime_stop: config.prime_stop.clone(),
            rewind_timeout: config.rewind_timeout(),
        })
    }

    /// Primes the context for a brand-new conversation.
    ///
    /// Issues a minimal completion carrying only the system instruction. If
    /// the engine still holds turns from an earlier conversation, they are
    /// rewound first so nothing stale survives.
    pub async fn prime_empty(&self, context: &InferenceContext, voice_mode: bool) -> Result<()> {
        let lease = context.acquire().await;
        lease.mark_unprimed();

        if lease.has_history() {
            self.reset_history(&lease).await?;
        }

        self.load(&lease, Vec::new(), voice_mode).await
    }

    /// Primes the context with a conversation's full history.
    ///
    /// An empty history behaves exactly like [`prime_empty`](Self::prime_empty).
    /// Otherwise any in-flight completion is cancelled, the engine history is
    /// rewound (bounded by the configured timeout), and every turn is loaded
    /// in a single silent completion call.
    pub async fn prime_with_history(
        &self,
        context: &InferenceContext,
        messages: &[Message],
        voice_mode: bool,
    ) -> Result<()> {
        if messages.is_empty() {
            return self.prime_empty(context, voice_mode).await;
        }

        let lease = context.acquire().await;
        lease.mark_unprimed();

        self.reset_history(&lease).await?;

        let history = messages.iter().map(ChatTurn::from).collect();
        self.load(&lease, history, voice_mode).await
    }

    async fn reset_history(&self, lease: &ContextLease) -> Result<()> {
        let engine = lease.engine();

        if engine.is_completion_in_flight() {
            tracing::debug!("[ContextSynchronizer] Stopping in-flight completion before rewind");
            if let Err(e) = engine.stop_completion().await {
                tracing::warn!("[ContextSynchronizer] stop_completion failed: {}", e);
            }
        }

        // A timed-out rewind future is dropped here, never resumed. The lease
        // stays unprimed until a later priming succeeds.
        match tokio::time::timeout(self.rewind_timeout, engine.rewind()).await {
            Ok(Ok(())) => {
                lease.clear_history();
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::warn!("[ContextSynchronizer] Rewind failed: {}", e);
                Err(ChatError::context_sync(format!("rewind failed: {e}")))
            }
            Err(_) => {
                tracing::warn!(
                    "[ContextSynchronizer] Rewind timed out after {}ms",
                    self.rewind_timeout.as_millis()
                );
                Err(ChatError::context_sync(format!(
                    "rewind timed out after {}ms",
                    self.rewind_timeout.as_millis()
                )))
            }
        }
    }

    async fn load(&self, lease: &ContextLease, history: Vec<ChatTurn>, voice_mode: bool) -> Result<()> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatTurn::system(self.prompt.render(voice_mode)?));
        messages.extend(history);

        let turns = messages.len();
        let request = CompletionRequest {
            messages,
            max_tokens: self.prime_predict,
            stop: self.prime_stop.clone(),
        };

        lease.mark_history();
        lease
            .engine()
            .completion(request, None)
            .await
            .map_err(|e| ChatError::context_sync(format!("history load failed: {e}")))?;

        lease.mark_primed();
        tracing::debug!(
            "[ContextSynchronizer] Context primed with {} turns (epoch={})",
            turns,
            lease.epoch()
        );
        Ok(())
    }
}
