//! Application layer for Pocketchat.
//!
//! Coordinates the domain types with the single live inference context:
//! priming it with a conversation's history, running completions against
//! it, and keeping it off deleted conversations.

pub mod context;
pub mod coordinator;
pub mod prompt;
pub mod session;
pub mod synchronizer;
pub mod updater;

pub use context::{ContextLease, InferenceContext};
pub use coordinator::{ConversationCoordinator, DeleteOutcome, LifecyclePhase};
pub use prompt::SystemPrompt;
pub use session::{
    CompletionCallbacks, CompletionListener, CompletionOptions, CompletionOutcome,
    CompletionSession, NullListener, StopHandle,
};
pub use synchronizer::ContextSynchronizer;
pub use updater::ConversationUpdater;
