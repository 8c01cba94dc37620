//! Shared fakes for the application integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use pocketchat_application::{CompletionListener, ConversationCoordinator, InferenceContext};
use pocketchat_core::config::ChatConfig;
use pocketchat_core::conversation::{
    Conversation, ConversationRepository, Message, ModelDescriptor,
};
use pocketchat_core::engine::{
    ChatRole, CompletionRequest, CompletionResult, InferenceEngine, TokenCallback, TokenEvent,
};
use pocketchat_core::metrics::{ModelMetrics, TimingSummary};
use pocketchat_core::{ChatError, EngineError, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Engine throughput reported in every timing summary.
pub const ENGINE_TOKENS_PER_SECOND: f64 = 12.5;

/// Engine and store calls, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Completion {
        roles: Vec<ChatRole>,
        max_tokens: u32,
        streaming: bool,
    },
    StopCompletion,
    Rewind,
    List,
    Save(String),
    Delete(String),
}

impl Event {
    pub fn is_load(&self) -> bool {
        matches!(self, Event::Completion { roles, .. } if roles.first() == Some(&ChatRole::System))
    }

    pub fn is_rewind(&self) -> bool {
        matches!(self, Event::Rewind)
    }
}

#[derive(Debug, Default, Clone)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|e| predicate(*e)).count()
    }

    pub fn position(&self, predicate: impl Fn(&Event) -> bool) -> Option<usize> {
        self.0.lock().unwrap().iter().position(predicate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewindBehavior {
    Succeed,
    Fail,
    Hang,
}

/// Engine fake that replays scripted token sequences.
///
/// Priming calls (those led by a system turn) never consume a script. Each
/// other completion pops the next script and pushes its tokens one per
/// scheduler turn, honoring `stop_completion` between tokens.
pub struct ScriptedEngine {
    log: EventLog,
    scripts: Mutex<VecDeque<Vec<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    rewind: Mutex<RewindBehavior>,
    fail_after: Mutex<Option<usize>>,
    hold_after: Mutex<Option<usize>>,
    fail_load: AtomicBool,
    loading: AtomicBool,
    stop_requested: AtomicBool,
    stop_notify: Notify,
    in_flight: AtomicBool,
}

impl ScriptedEngine {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            scripts: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            rewind: Mutex::new(RewindBehavior::Succeed),
            fail_after: Mutex::new(None),
            hold_after: Mutex::new(None),
            fail_load: AtomicBool::new(false),
            loading: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            stop_notify: Notify::new(),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn script(&self, tokens: &[&str]) {
        self.scripts
            .lock()
            .unwrap()
            .push_back(tokens.iter().map(|t| t.to_string()).collect());
    }

    pub fn set_rewind(&self, behavior: RewindBehavior) {
        *self.rewind.lock().unwrap() = behavior;
    }

    /// The next scripted completion fails after emitting `tokens` tokens.
    pub fn fail_next_after(&self, tokens: usize) {
        *self.fail_after.lock().unwrap() = Some(tokens);
    }

    /// The next scripted completion stalls after emitting `tokens` tokens
    /// until `stop_completion` is called.
    pub fn hold_after(&self, tokens: usize) {
        *self.hold_after.lock().unwrap() = Some(tokens);
    }

    pub fn set_fail_load(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    pub fn set_loading(&self, loading: bool) {
        self.loading.store(loading, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> CompletionRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl InferenceEngine for ScriptedEngine {
    async fn completion(
        &self,
        request: CompletionRequest,
        on_token: Option<TokenCallback>,
    ) -> std::result::Result<CompletionResult, EngineError> {
        let priming = request.messages.first().map(|t| t.role) == Some(ChatRole::System);
        self.log.push(Event::Completion {
            roles: request.messages.iter().map(|t| t.role).collect(),
            max_tokens: request.max_tokens,
            streaming: on_token.is_some(),
        });
        self.requests.lock().unwrap().push(request);

        if priming {
            if self.fail_load.load(Ordering::SeqCst) {
                return Err(EngineError::Completion("history load failed".to_string()));
            }
            return Ok(CompletionResult::default());
        }

        self.stop_requested.store(false, Ordering::SeqCst);
        self.in_flight.store(true, Ordering::SeqCst);
        let tokens = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        let fail_after = self.fail_after.lock().unwrap().take();
        let hold_after = self.hold_after.lock().unwrap().take();

        let mut emitted: Vec<String> = Vec::new();
        for token in tokens {
            if hold_after == Some(emitted.len()) {
                while !self.stop_requested.load(Ordering::SeqCst) {
                    self.stop_notify.notified().await;
                }
            }
            if self.stop_requested.load(Ordering::SeqCst) {
                break;
            }
            if fail_after == Some(emitted.len()) {
                self.in_flight.store(false, Ordering::SeqCst);
                return Err(EngineError::Completion("decode error".to_string()));
            }
            if let Some(on_token) = &on_token {
                on_token(TokenEvent {
                    token: token.clone(),
                });
            }
            emitted.push(token);
            tokio::task::yield_now().await;
        }
        self.in_flight.store(false, Ordering::SeqCst);

        Ok(CompletionResult {
            text: emitted.concat(),
            timings: Some(TimingSummary {
                predicted_n: emitted.len() as u64,
                predicted_per_second: ENGINE_TOKENS_PER_SECOND,
            }),
        })
    }

    async fn stop_completion(&self) -> std::result::Result<(), EngineError> {
        self.log.push(Event::StopCompletion);
        self.stop_requested.store(true, Ordering::SeqCst);
        self.stop_notify.notify_one();
        Ok(())
    }

    async fn rewind(&self) -> std::result::Result<(), EngineError> {
        self.log.push(Event::Rewind);
        let behavior = *self.rewind.lock().unwrap();
        match behavior {
            RewindBehavior::Succeed => Ok(()),
            RewindBehavior::Fail => Err(EngineError::Rewind("native rewind failed".to_string())),
            RewindBehavior::Hang => std::future::pending().await,
        }
    }

    fn is_completion_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }
}

/// In-memory conversation store sharing the engine's event log.
pub struct MemoryRepository {
    conversations: Mutex<HashMap<String, Conversation>>,
    log: EventLog,
    fail_saves: AtomicBool,
    fail_delete: Mutex<Option<String>>,
}

impl MemoryRepository {
    pub fn new(log: EventLog) -> Self {
        Self {
            conversations: Mutex::new(HashMap::new()),
            log,
            fail_saves: AtomicBool::new(false),
            fail_delete: Mutex::new(None),
        }
    }

    /// Stores a conversation without logging.
    pub fn seed(&self, conversation: Conversation) {
        self.conversations
            .lock()
            .unwrap()
            .insert(conversation.id.clone(), conversation);
    }

    pub fn get(&self, id: &str) -> Option<Conversation> {
        self.conversations.lock().unwrap().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.conversations.lock().unwrap().contains_key(id)
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Deleting `id` fails with a store error.
    pub fn fail_delete_of(&self, id: &str) {
        *self.fail_delete.lock().unwrap() = Some(id.to_string());
    }
}

#[async_trait]
impl ConversationRepository for MemoryRepository {
    async fn list_all(&self) -> Result<Vec<Conversation>> {
        self.log.push(Event::List);
        let mut conversations: Vec<Conversation> =
            self.conversations.lock().unwrap().values().cloned().collect();
        conversations.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(conversations)
    }

    async fn find_by_id(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        Ok(self.get(conversation_id))
    }

    async fn save(&self, conversation: &Conversation) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(ChatError::store("disk full"));
        }
        self.log.push(Event::Save(conversation.id.clone()));
        self.seed(conversation.clone());
        Ok(())
    }

    async fn delete(&self, conversation_id: &str) -> Result<()> {
        if self.fail_delete.lock().unwrap().as_deref() == Some(conversation_id) {
            return Err(ChatError::store("permission denied"));
        }
        self.log.push(Event::Delete(conversation_id.to_string()));
        self.conversations.lock().unwrap().remove(conversation_id);
        Ok(())
    }
}

/// Records every listener notification; optionally runs a hook once the
/// given number of progress updates has been seen.
#[derive(Default)]
pub struct RecordingListener {
    pub progress: Vec<String>,
    pub completions: Vec<(ModelMetrics, ModelDescriptor, String)>,
    hook: Option<(usize, Box<dyn FnMut() + Send>)>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress_count(mut self, count: usize, hook: impl FnMut() + Send + 'static) -> Self {
        self.hook = Some((count, Box::new(hook)));
        self
    }
}

impl CompletionListener for RecordingListener {
    fn on_progress(&mut self, text_so_far: &str) {
        self.progress.push(text_so_far.to_string());
        if let Some((count, hook)) = self.hook.as_mut() {
            if self.progress.len() == *count {
                hook();
            }
        }
    }

    fn on_complete(&mut self, metrics: &ModelMetrics, model: &ModelDescriptor, text: &str) {
        self.completions
            .push((*metrics, model.clone(), text.to_string()));
    }
}

pub fn model() -> ModelDescriptor {
    ModelDescriptor::new("qwen3-0.6b-q8_0.gguf", "Qwen3 0.6B")
}

/// Builds a stored conversation from `(is_user, text)` turns.
pub fn conversation(id: &str, last_updated: &str, turns: &[(bool, &str)]) -> Conversation {
    let mut conversation = Conversation::new(id, model());
    for (is_user, text) in turns {
        let message = if *is_user {
            Message::user(*text, model())
        } else {
            Message::assistant(*text, model(), Some(ModelMetrics::default()))
        };
        conversation.append(message);
    }
    conversation.last_updated = last_updated.to_string();
    conversation
}

pub struct Harness {
    pub log: EventLog,
    pub engine: Arc<ScriptedEngine>,
    pub repository: Arc<MemoryRepository>,
    pub context: Arc<InferenceContext>,
    pub coordinator: Arc<ConversationCoordinator>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(ChatConfig::default()).await
    }

    pub async fn with_config(config: ChatConfig) -> Self {
        let log = EventLog::default();
        let engine = Arc::new(ScriptedEngine::new(log.clone()));
        let repository = Arc::new(MemoryRepository::new(log.clone()));
        let context = Arc::new(InferenceContext::new(engine.clone()));
        let coordinator = Arc::new(
            ConversationCoordinator::new(repository.clone(), config, model()).unwrap(),
        );
        coordinator.attach_context(context.clone()).await.unwrap();

        Self {
            log,
            engine,
            repository,
            context,
            coordinator,
        }
    }
}
