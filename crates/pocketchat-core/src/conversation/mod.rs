//! Conversation domain module.
//!
//! # Module Structure
//!
//! - `model`: Core conversation model (`Conversation`)
//! - `message`: Turn types (`Message`, `MessageRole`, `ModelDescriptor`)
//! - `repository`: Repository trait for conversation persistence

mod message;
mod model;
mod repository;

pub use message::{Message, MessageRole, ModelDescriptor};
pub use model::{Conversation, derive_title};
pub use repository::ConversationRepository;
