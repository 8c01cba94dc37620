//! A single completion run against a primed context.

use crate::context::{ContextLease, InferenceContext};
use pocketchat_core::config::ChatConfig;
use pocketchat_core::conversation::{Message, ModelDescriptor};
use pocketchat_core::engine::{
    ChatTurn, CompletionRequest, CompletionResult, TokenCallback, TokenEvent,
};
use pocketchat_core::feedback::{NoFeedback, TokenFeedback};
use pocketchat_core::metrics::{MetricsCollector, ModelMetrics, TimingSummary};
use pocketchat_core::{ChatError, EngineError, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::listener::CompletionListener;

/// Per-request options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionOptions {
    pub streaming: bool,
    /// Overrides the configured streaming ceiling.
    pub max_tokens: Option<u32>,
    /// Suppresses per-token feedback.
    pub voice_mode: bool,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            streaming: true,
            max_tokens: None,
            voice_mode: false,
        }
    }
}

/// Final result of a completion run.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOutcome {
    pub text: String,
    pub metrics: ModelMetrics,
    pub model: ModelDescriptor,
    /// The run was stopped before the engine finished on its own.
    pub stopped: bool,
}

/// Requests cancellation of a running [`CompletionSession`].
#[derive(Debug, Clone)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    /// Cooperative stop. After this returns no further progress is delivered.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Runs exactly one user request against an already-primed context.
///
/// Only the most recent turn is forwarded: the engine already holds the
/// earlier ones from priming.
pub struct CompletionSession {
    config: Arc<ChatConfig>,
    feedback: Arc<dyn TokenFeedback>,
    stop: CancellationToken,
}

impl CompletionSession {
    pub fn new(config: Arc<ChatConfig>) -> Self {
        Self {
            config,
            feedback: Arc::new(NoFeedback),
            stop: CancellationToken::new(),
        }
    }

    pub fn with_feedback(mut self, feedback: Arc<dyn TokenFeedback>) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            token: self.stop.clone(),
        }
    }

    /// Drives the request to completion or cancellation.
    ///
    /// # Errors
    ///
    /// - `ContextUnavailable` if there is no context or it is not primed; no
    ///   engine call is issued.
    /// - `InvalidInput` if `messages` is empty.
    /// - `CompletionFailed` if the engine errors; partial text is discarded
    ///   and the completion callback does not fire.
    pub async fn run(
        self,
        context: Option<&InferenceContext>,
        messages: &[Message],
        model: &ModelDescriptor,
        options: CompletionOptions,
        listener: &mut dyn CompletionListener,
    ) -> Result<CompletionOutcome> {
        let context = context.ok_or(ChatError::ContextUnavailable)?;
        let latest = messages
            .last()
            .ok_or_else(|| ChatError::InvalidInput("no turn to complete".to_string()))?;

        let lease = context.acquire_linked(&self.stop).await;
        if !lease.is_primed() {
            return Err(ChatError::ContextUnavailable);
        }

        let turn = ChatTurn::from(latest);
        let (text, metrics, stopped) = if options.streaming {
            let max_tokens = options.max_tokens.unwrap_or(self.config.stream_max_tokens);
            self.stream(&lease, turn, max_tokens, options.voice_mode, listener)
                .await?
        } else {
            self.batch(&lease, turn, listener).await?
        };

        tracing::debug!(
            "[CompletionSession] Finished epoch={} stopped={} tokens={}",
            lease.epoch(),
            stopped,
            metrics.completion_tokens
        );
        listener.on_complete(&metrics, model, &text);

        Ok(CompletionOutcome {
            text,
            metrics,
            model: model.clone(),
            stopped,
        })
    }

    async fn stream(
        &self,
        lease: &ContextLease,
        turn: ChatTurn,
        max_tokens: u32,
        voice_mode: bool,
        listener: &mut dyn CompletionListener,
    ) -> Result<(String, ModelMetrics, bool)> {
        let (tx, mut rx) = mpsc::unbounded_channel::<(Instant, String)>();
        let epoch = lease.epoch_guard();
        let on_token: TokenCallback = Arc::new(move |event: TokenEvent| {
            if event.token.is_empty() || !epoch.is_current() {
                return;
            }
            // Receiver gone means the run is over; late tokens are dropped.
            let _ = tx.send((Instant::now(), event.token));
        });

        let request = self.request(turn, max_tokens);
        let engine = lease.engine().clone();
        let cancel = lease.cancellation().clone();
        let mut collector = MetricsCollector::start();
        let mut buffer = String::new();
        let mut stopped = false;

        lease.mark_history();
        let completion = engine.completion(request, Some(on_token));
        tokio::pin!(completion);

        let result = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled(), if !stopped => {
                    stopped = true;
                    self.forward_stop(lease).await;
                }
                result = &mut completion => break result,
                Some((at, token)) = rx.recv(), if !stopped => {
                    self.accept_token(&mut collector, &mut buffer, at, &token, voice_mode, listener);
                }
            }
        };

        // Tokens pushed right before the engine returned are still queued.
        while !stopped {
            if cancel.is_cancelled() {
                stopped = true;
                break;
            }
            match rx.try_recv() {
                Ok((at, token)) => {
                    self.accept_token(&mut collector, &mut buffer, at, &token, voice_mode, listener)
                }
                Err(_) => break,
            }
        }

        let summary = self.summary(result, stopped)?;
        Ok((buffer, collector.finish(summary.as_ref()), stopped))
    }

    async fn batch(
        &self,
        lease: &ContextLease,
        turn: ChatTurn,
        listener: &mut dyn CompletionListener,
    ) -> Result<(String, ModelMetrics, bool)> {
        let request = self.request(turn, self.config.batch_max_tokens);
        let engine = lease.engine().clone();
        let cancel = lease.cancellation().clone();
        let collector = MetricsCollector::start();
        let mut stopped = false;

        lease.mark_history();
        let completion = engine.completion(request, None);
        tokio::pin!(completion);

        let result = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled(), if !stopped => {
                    stopped = true;
                    self.forward_stop(lease).await;
                }
                result = &mut completion => break result,
            }
        };

        let stopped = stopped || cancel.is_cancelled();
        let text = match &result {
            Ok(result) => result.text.clone(),
            Err(_) => String::new(),
        };
        let summary = self.summary(result, stopped)?;

        if !stopped {
            listener.on_progress(&text);
        }
        Ok((text, collector.finish(summary.as_ref()), stopped))
    }

    fn request(&self, turn: ChatTurn, max_tokens: u32) -> CompletionRequest {
        CompletionRequest {
            messages: vec![turn],
            max_tokens,
            stop: self.config.stop_words.clone(),
        }
    }

    fn accept_token(
        &self,
        collector: &mut MetricsCollector,
        buffer: &mut String,
        at: Instant,
        token: &str,
        voice_mode: bool,
        listener: &mut dyn CompletionListener,
    ) {
        collector.record_token(at);
        buffer.push_str(token);
        if !voice_mode {
            self.feedback.token_emitted();
        }
        listener.on_progress(buffer);
    }

    async fn forward_stop(&self, lease: &ContextLease) {
        tracing::debug!("[CompletionSession] Stop requested (epoch={})", lease.epoch());
        if let Err(e) = lease.engine().stop_completion().await {
            tracing::warn!("[CompletionSession] stop_completion failed: {}", e);
        }
    }

    /// Engine timing summary, or the failure to surface.
    ///
    /// An engine error after a stop request is the engine reacting to the
    /// stop, not a failure.
    fn summary(
        &self,
        result: std::result::Result<CompletionResult, EngineError>,
        stopped: bool,
    ) -> Result<Option<TimingSummary>> {
        match result {
            Ok(result) => Ok(result.timings),
            Err(e) if stopped => {
                tracing::debug!("[CompletionSession] Engine ended with error after stop: {}", e);
                Ok(None)
            }
            Err(e) => {
                tracing::warn!("[CompletionSession] Completion failed: {}", e);
                Err(ChatError::CompletionFailed(e))
            }
        }
    }
}
