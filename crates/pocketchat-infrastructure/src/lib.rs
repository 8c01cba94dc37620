//! Infrastructure layer for Pocketchat: on-disk conversation store,
//! configuration loading, paths and logging bootstrap.

pub mod config_service;
pub mod logging;
pub mod paths;
pub mod storage;
pub mod toml_conversation_repository;

pub use crate::config_service::ConfigService;
pub use crate::paths::PocketchatPaths;
pub use crate::toml_conversation_repository::TomlConversationRepository;
