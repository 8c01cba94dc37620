//! Configuration service implementation.
//!
//! Loads [`ChatConfig`] from `config.toml` in the Pocketchat base directory.

use crate::paths::PocketchatPaths;
use crate::storage::AtomicTomlFile;
use pocketchat_core::Result;
use pocketchat_core::config::ChatConfig;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Loads and caches the chat configuration.
///
/// A missing or empty file yields the defaults; a present file is parsed
/// (missing fields fall back to defaults) and validated.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
    config: Arc<RwLock<Option<ChatConfig>>>,
}

impl ConfigService {
    pub fn new(paths: &PocketchatPaths) -> Result<Self> {
        Ok(Self::with_path(paths.config_file()?))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Gets the configuration, loading it from disk if not cached.
    pub fn get_config(&self) -> Result<ChatConfig> {
        {
            let cached = self.config.read().unwrap_or_else(|e| e.into_inner());
            if let Some(config) = cached.as_ref() {
                return Ok(config.clone());
            }
        }

        let loaded = self.load()?;
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = Some(loaded.clone());
        Ok(loaded)
    }

    /// Forces a reload on next access.
    pub fn invalidate_cache(&self) {
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn load(&self) -> Result<ChatConfig> {
        let config = match AtomicTomlFile::<ChatConfig>::new(self.path.clone()).load()? {
            Some(config) => config,
            None => {
                tracing::debug!(
                    "[ConfigService] No config at {:?}, using defaults",
                    self.path
                );
                ChatConfig::default()
            }
        };
        config.validate()?;
        Ok(config)
    }
}
