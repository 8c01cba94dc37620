//! Completion sessions.
//!
//! - `completion`: one request against a primed context (`CompletionSession`)
//! - `listener`: UI-facing callbacks (`CompletionListener`)

mod completion;
mod listener;

pub use completion::{CompletionOptions, CompletionOutcome, CompletionSession, StopHandle};
pub use listener::{CompletionCallbacks, CompletionListener, NullListener};
