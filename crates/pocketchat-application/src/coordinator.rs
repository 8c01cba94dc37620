//! Conversation lifecycle coordination.
//!
//! Owns the mapping from the selected conversation id to the primed
//! inference context, decides when resynchronization is required, and keeps
//! the context off deleted conversations.

use crate::context::InferenceContext;
use crate::session::{
    CompletionListener, CompletionOptions, CompletionOutcome, CompletionSession, StopHandle,
};
use crate::synchronizer::ContextSynchronizer;
use crate::updater::ConversationUpdater;
use pocketchat_core::config::ChatConfig;
use pocketchat_core::conversation::{Conversation, ConversationRepository, Message, ModelDescriptor};
use pocketchat_core::feedback::{NoFeedback, TokenFeedback};
use pocketchat_core::id::generate_unique_id;
use pocketchat_core::segment::NO_THINK_DIRECTIVE;
use pocketchat_core::{ChatError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};

/// Coordinator state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LifecyclePhase {
    /// No conversation is selected (initial state, or priming failed).
    NoSelection,
    /// The context is being synchronized with the selected conversation.
    Priming,
    /// The context matches the selected conversation.
    Ready,
    /// A completion is running for the selected conversation.
    Streaming,
}

/// Result of a (batch) delete.
#[derive(Debug, Default)]
pub struct DeleteOutcome {
    /// Ids whose deletion was issued to the store, in order.
    pub deleted: Vec<String>,
    /// Conversation selected in place of a deleted active one.
    pub replacement: Option<String>,
    /// Priming the replacement failed; the coordinator is in `NoSelection`.
    pub sync_error: Option<ChatError>,
    /// The store call that stopped the batch. Ids after it were not issued.
    pub store_error: Option<ChatError>,
}

impl DeleteOutcome {
    /// Every id was deleted and the replacement, if any, is primed.
    pub fn is_complete(&self) -> bool {
        self.sync_error.is_none() && self.store_error.is_none()
    }
}

struct CoordinatorState {
    phase: LifecyclePhase,
    active: Option<Conversation>,
    /// Bumped on every selection; stale priming or completion results
    /// compare against it before touching state.
    selection: u64,
    selected_model: ModelDescriptor,
    /// Voice mode the context was last primed with.
    primed_voice_mode: bool,
}

/// Coordinates conversation selection, priming, completion and deletion.
pub struct ConversationCoordinator {
    repository: Arc<dyn ConversationRepository>,
    context: RwLock<Option<Arc<InferenceContext>>>,
    synchronizer: ContextSynchronizer,
    config: Arc<ChatConfig>,
    feedback: Arc<dyn TokenFeedback>,
    state: RwLock<CoordinatorState>,
    active_stop: std::sync::Mutex<Option<StopHandle>>,
    /// Deleted ids mapped to the selection current at deletion. Turns
    /// started at or before that selection are not saved. Holding the lock
    /// serializes store writes against deletions.
    tombstones: Mutex<HashMap<String, u64>>,
    voice_mode: AtomicBool,
    reasoning_enabled: AtomicBool,
}

impl ConversationCoordinator {
    /// Creates a coordinator with no context attached and nothing selected.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Config` if the configuration is invalid.
    pub fn new(
        repository: Arc<dyn ConversationRepository>,
        config: ChatConfig,
        model: ModelDescriptor,
    ) -> Result<Self> {
        config.validate()?;
        let synchronizer = ContextSynchronizer::new(&config)?;

        Ok(Self {
            repository,
            context: RwLock::new(None),
            synchronizer,
            voice_mode: AtomicBool::new(config.voice_mode),
            reasoning_enabled: AtomicBool::new(config.reasoning_enabled),
            config: Arc::new(config),
            feedback: Arc::new(NoFeedback),
            state: RwLock::new(CoordinatorState {
                phase: LifecyclePhase::NoSelection,
                active: None,
                selection: 0,
                selected_model: model,
                primed_voice_mode: false,
            }),
            active_stop: std::sync::Mutex::new(None),
            tombstones: Mutex::new(HashMap::new()),
        })
    }

    /// Sets the per-token feedback sink used outside voice mode.
    pub fn with_feedback(mut self, feedback: Arc<dyn TokenFeedback>) -> Self {
        self.feedback = feedback;
        self
    }

    // ============================================================================
    // Queries
    // ============================================================================

    pub async fn phase(&self) -> LifecyclePhase {
        self.state.read().await.phase
    }

    pub async fn active_id(&self) -> Option<String> {
        self.state.read().await.active.as_ref().map(|c| c.id.clone())
    }

    pub async fn active_conversation(&self) -> Option<Conversation> {
        self.state.read().await.active.clone()
    }

    pub async fn context(&self) -> Option<Arc<InferenceContext>> {
        self.context.read().await.clone()
    }

    /// Whether the attached engine is still loading. Priming and submits are
    /// refused until it finishes.
    pub async fn is_loading(&self) -> bool {
        self.context()
            .await
            .map(|context| context.is_loading())
            .unwrap_or(false)
    }

    pub fn voice_mode(&self) -> bool {
        self.voice_mode.load(Ordering::SeqCst)
    }

    pub fn reasoning_enabled(&self) -> bool {
        self.reasoning_enabled.load(Ordering::SeqCst)
    }

    /// Lists stored conversations, most recent first.
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        self.repository.list_all().await
    }

    // ============================================================================
    // Context and settings
    // ============================================================================

    /// Installs a (new) inference context and re-primes the active
    /// conversation against it.
    pub async fn attach_context(&self, context: Arc<InferenceContext>) -> Result<()> {
        self.stop();
        if let Some(previous) = self.context.write().await.replace(context) {
            previous.cancel_in_flight();
        }

        match self.active_conversation().await {
            Some(conversation) => self.activate(conversation).await,
            None => Ok(()),
        }
    }

    /// Switches voice mode. The system instruction depends on it, so a ready
    /// conversation is re-primed when the value changes.
    pub async fn set_voice_mode(&self, enabled: bool) -> Result<()> {
        let previous = self.voice_mode.swap(enabled, Ordering::SeqCst);
        if previous == enabled {
            return Ok(());
        }
        self.sync_voice_mode().await
    }

    /// Re-primes a ready conversation whose context was primed with another
    /// voice mode. A change made mid-turn is picked up by the next submit.
    async fn sync_voice_mode(&self) -> Result<()> {
        let voice_mode = self.voice_mode();
        let stale = {
            let state = self.state.read().await;
            match (&state.active, state.phase) {
                (Some(active), LifecyclePhase::Ready) if state.primed_voice_mode != voice_mode => {
                    Some(active.clone())
                }
                _ => None,
            }
        };
        match stale {
            Some(conversation) => {
                tracing::debug!(
                    "[Coordinator] Re-priming {} for voice_mode={}",
                    conversation.id,
                    voice_mode
                );
                self.activate(conversation).await
            }
            None => Ok(()),
        }
    }

    /// When disabled, user turns are sent with the `/no_think` directive.
    pub fn set_reasoning_enabled(&self, enabled: bool) {
        self.reasoning_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Selects the model recorded on new turns and new conversations.
    pub async fn set_model(&self, model: ModelDescriptor) {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        if let Some(active) = state.active.as_mut() {
            active.model = model.clone();
        }
        state.selected_model = model;
    }

    // ============================================================================
    // Selection
    // ============================================================================

    /// Selects an existing (or not yet stored) conversation and primes the
    /// context with its history.
    ///
    /// Selecting the conversation that is already ready or streaming is a
    /// no-op.
    pub async fn select_conversation(&self, conversation_id: &str) -> Result<()> {
        {
            let state = self.state.read().await;
            let is_active = state.active.as_ref().map(|c| c.id.as_str()) == Some(conversation_id);
            if is_active
                && matches!(state.phase, LifecyclePhase::Ready | LifecyclePhase::Streaming)
            {
                tracing::debug!("[Coordinator] {} already selected", conversation_id);
                return Ok(());
            }
        }

        let conversation = match self.repository.find_by_id(conversation_id).await? {
            Some(conversation) => conversation,
            None => Conversation::new(conversation_id, self.selected_model().await),
        };
        self.activate(conversation).await
    }

    /// Creates a fresh conversation, selects it and primes an empty context.
    ///
    /// The conversation is stored once its first turn completes.
    pub async fn new_conversation(&self) -> Result<String> {
        let conversation = Conversation::new(generate_unique_id(), self.selected_model().await);
        let id = conversation.id.clone();
        self.activate(conversation).await?;
        Ok(id)
    }

    async fn activate(&self, conversation: Conversation) -> Result<()> {
        // The synchronizer must never race a running completion.
        self.stop();

        let selection = {
            let mut state = self.state.write().await;
            state.selection += 1;
            state.phase = LifecyclePhase::Priming;
            state.active = Some(conversation.clone());
            state.selection
        };
        tracing::info!(
            "[Coordinator] Priming conversation {} ({} messages)",
            conversation.id,
            conversation.messages.len()
        );

        let voice_mode = self.voice_mode();
        let result = match self.context().await {
            Some(context) if context.is_loading() => {
                tracing::debug!("[Coordinator] Engine still loading, not priming");
                Err(ChatError::ContextUnavailable)
            }
            Some(context) => {
                self.synchronizer
                    .prime_with_history(&context, &conversation.messages, voice_mode)
                    .await
            }
            None => Err(ChatError::ContextUnavailable),
        };

        let mut state = self.state.write().await;
        if state.selection == selection {
            match &result {
                Ok(()) => {
                    state.phase = LifecyclePhase::Ready;
                    state.primed_voice_mode = voice_mode;
                    tracing::info!("[Coordinator] Conversation {} ready", conversation.id);
                }
                Err(e) => {
                    tracing::warn!(
                        "[Coordinator] Priming {} failed, clearing selection: {}",
                        conversation.id,
                        e
                    );
                    state.phase = LifecyclePhase::NoSelection;
                    state.active = None;
                }
            }
        }
        result
    }

    // ============================================================================
    // Completion
    // ============================================================================

    /// Submits a user turn on the ready conversation.
    ///
    /// The user message is appended locally before the engine is involved.
    /// When the completion finishes (or is stopped) the assistant message is
    /// appended and the conversation is saved.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the coordinator is `Ready`.
    /// - `ContextUnavailable` while the engine is still loading; nothing is
    ///   appended.
    /// - Completion errors from [`CompletionSession::run`]; the user turn
    ///   stays in the local conversation so the caller can retry.
    /// - `StoreFailure` if saving fails; local state is kept.
    pub async fn submit(
        &self,
        text: &str,
        listener: &mut dyn CompletionListener,
    ) -> Result<CompletionOutcome> {
        if text.trim().is_empty() {
            return Err(ChatError::InvalidInput("message is empty".to_string()));
        }
        self.sync_voice_mode().await?;

        let context = self.context().await;
        let session = CompletionSession::new(self.config.clone()).with_feedback(self.feedback.clone());
        let (snapshot, selection) = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            if state.phase != LifecyclePhase::Ready {
                return Err(ChatError::invalid_state(format!(
                    "cannot submit while {}",
                    state.phase
                )));
            }
            if context.as_ref().is_some_and(|context| context.is_loading()) {
                return Err(ChatError::ContextUnavailable);
            }
            let conversation = state
                .active
                .as_mut()
                .ok_or_else(|| ChatError::invalid_state("no conversation selected"))?;

            let user_text = if self.reasoning_enabled() {
                text.to_string()
            } else {
                format!("{NO_THINK_DIRECTIVE} {text}")
            };
            conversation.append(Message::user(user_text, conversation.model.clone()));
            let snapshot = conversation.clone();

            state.phase = LifecyclePhase::Streaming;
            *self.stop_slot() = Some(session.stop_handle());
            (snapshot, state.selection)
        };

        let options = CompletionOptions {
            streaming: self.config.streaming,
            max_tokens: None,
            voice_mode: self.voice_mode(),
        };
        let result = session
            .run(
                context.as_deref(),
                &snapshot.messages,
                &snapshot.model,
                options,
                listener,
            )
            .await;
        *self.stop_slot() = None;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                let mut state = self.state.write().await;
                if state.selection == selection && state.phase == LifecyclePhase::Streaming {
                    state.phase = LifecyclePhase::Ready;
                }
                return Err(e);
            }
        };

        let reply = Message::assistant(
            outcome.text.clone(),
            outcome.model.clone(),
            Some(outcome.metrics),
        );
        let updated = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            match state.active.as_mut() {
                Some(active) if state.selection == selection => {
                    active.append(reply);
                    state.phase = LifecyclePhase::Ready;
                    active.clone()
                }
                // Selection moved on mid-turn; the reply still belongs to the
                // conversation it was generated for.
                _ => {
                    let mut conversation = snapshot;
                    conversation.append(reply);
                    conversation
                }
            }
        };

        self.persist(&updated, selection).await?;
        Ok(outcome)
    }

    /// Requests cancellation of the running completion, if any.
    pub fn stop(&self) {
        if let Some(handle) = self.stop_slot().as_ref() {
            tracing::debug!("[Coordinator] Stop requested");
            handle.stop();
        }
    }

    fn stop_slot(&self) -> std::sync::MutexGuard<'_, Option<StopHandle>> {
        self.active_stop
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Saves a conversation on behalf of a turn started under `selection`.
    ///
    /// A turn that was already running when its conversation was deleted is
    /// dropped. A later turn on a reused id clears the tombstone.
    async fn persist(&self, conversation: &Conversation, selection: u64) -> Result<()> {
        let mut tombstones = self.tombstones.lock().await;
        if let Some(&deleted_at) = tombstones.get(&conversation.id) {
            if selection <= deleted_at {
                tracing::debug!(
                    "[Coordinator] Skipping save of deleted conversation {}",
                    conversation.id
                );
                return Ok(());
            }
            tombstones.remove(&conversation.id);
        }
        self.repository.save(conversation).await
    }

    async fn selected_model(&self) -> ModelDescriptor {
        self.state.read().await.selected_model.clone()
    }

    // ============================================================================
    // Mutation and deletion
    // ============================================================================

    /// Renames a conversation.
    pub async fn rename_conversation(&self, conversation_id: &str, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ChatError::InvalidInput("title is empty".to_string()));
        }

        let active = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            match state.active.as_mut() {
                Some(active) if active.id == conversation_id => {
                    active.rename(title);
                    Some((active.clone(), state.selection))
                }
                _ => None,
            }
        };

        match active {
            Some((conversation, selection)) => self.persist(&conversation, selection).await,
            None => {
                ConversationUpdater::new(self.repository.clone())
                    .update(conversation_id, |conversation| {
                        conversation.rename(title);
                        Ok(())
                    })
                    .await?;
                Ok(())
            }
        }
    }

    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<DeleteOutcome> {
        self.delete_conversations(&[conversation_id.to_string()]).await
    }

    /// Deletes a batch of conversations.
    ///
    /// If the batch contains the active conversation, a replacement (the most
    /// recently updated survivor, or a fresh conversation) is selected and
    /// primed before any deletion reaches the store.
    ///
    /// The batch stops at the first failed store call. That error is
    /// recorded in [`DeleteOutcome::store_error`] together with the ids
    /// already deleted and the replacement, so the caller can reconcile.
    ///
    /// # Errors
    ///
    /// Returns `StoreFailure` if listing the survivors fails; nothing has
    /// been deleted or reselected then.
    pub async fn delete_conversations(&self, conversation_ids: &[String]) -> Result<DeleteOutcome> {
        let mut outcome = DeleteOutcome::default();
        if conversation_ids.is_empty() {
            return Ok(outcome);
        }

        let doomed_active = self
            .active_id()
            .await
            .filter(|id| conversation_ids.contains(id));

        if let Some(active_id) = doomed_active {
            tracing::info!(
                "[Coordinator] Active conversation {} is being deleted, selecting a replacement",
                active_id
            );
            let replacement = match self
                .repository
                .list_all()
                .await?
                .into_iter()
                .find(|c| !conversation_ids.contains(&c.id))
            {
                Some(survivor) => survivor,
                None => Conversation::new(generate_unique_id(), self.selected_model().await),
            };
            outcome.replacement = Some(replacement.id.clone());

            {
                let mut tombstones = self.tombstones.lock().await;
                self.tombstone(&mut tombstones, conversation_ids).await;
            }

            if let Err(e) = self.activate(replacement).await {
                outcome.sync_error = Some(e);
            }
        }

        let mut tombstones = self.tombstones.lock().await;
        self.tombstone(&mut tombstones, conversation_ids).await;
        for id in conversation_ids {
            tracing::info!("[Coordinator] Deleting conversation: {}", id);
            if let Err(e) = self.repository.delete(id).await {
                tracing::warn!("[Coordinator] Failed to delete {}: {}", id, e);
                outcome.store_error = Some(e);
                break;
            }
            outcome.deleted.push(id.clone());
        }

        Ok(outcome)
    }

    async fn tombstone(&self, tombstones: &mut HashMap<String, u64>, conversation_ids: &[String]) {
        let selection = self.state.read().await.selection;
        for id in conversation_ids {
            tombstones.insert(id.clone(), selection);
        }
    }
}
