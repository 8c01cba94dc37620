//! Domain layer for Pocketchat.
//!
//! Holds the conversation model, the pure output segmenter and metrics
//! collector, and the interfaces of the two external collaborators: the
//! inference engine and the conversation store.

pub mod config;
pub mod conversation;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod id;
pub mod metrics;
pub mod segment;

// Re-export common error type
pub use error::{ChatError, EngineError, Result};
