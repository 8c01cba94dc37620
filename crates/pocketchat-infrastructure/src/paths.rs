//! Path management for Pocketchat's on-disk state.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/pocketchat/        # Base directory (platform config dir)
//! ├── config.toml              # ChatConfig
//! └── conversations/           # One TOML file per conversation
//!     ├── <id>.toml
//!     └── ...
//! ```
//!
//! Every path can be re-rooted with an explicit base directory, which is how
//! the CLI's `--data-dir` and the tests work.

use pocketchat_core::{ChatError, Result};
use std::path::PathBuf;

const APP_DIR: &str = "pocketchat";

/// Resolves Pocketchat's directories, optionally under an explicit base.
#[derive(Debug, Clone, Default)]
pub struct PocketchatPaths {
    base_dir: Option<PathBuf>,
}

impl PocketchatPaths {
    /// `None` uses the platform configuration directory.
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        Self { base_dir }
    }

    /// Returns the base directory (e.g., `~/.config/pocketchat/`).
    ///
    /// # Errors
    ///
    /// `ChatError::Config` if no base was given and the platform config
    /// directory cannot be determined.
    pub fn base_dir(&self) -> Result<PathBuf> {
        match &self.base_dir {
            Some(base) => Ok(base.clone()),
            None => dirs::config_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or_else(|| ChatError::config("cannot determine the config directory")),
        }
    }

    pub fn config_file(&self) -> Result<PathBuf> {
        Ok(self.base_dir()?.join("config.toml"))
    }

    pub fn conversations_dir(&self) -> Result<PathBuf> {
        Ok(self.base_dir()?.join("conversations"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_base_dir() {
        let paths = PocketchatPaths::new(Some(PathBuf::from("/tmp/pc")));

        assert_eq!(paths.base_dir().unwrap(), PathBuf::from("/tmp/pc"));
        assert_eq!(paths.config_file().unwrap(), PathBuf::from("/tmp/pc/config.toml"));
        assert_eq!(
            paths.conversations_dir().unwrap(),
            PathBuf::from("/tmp/pc/conversations")
        );
    }

    #[test]
    fn test_default_base_dir_is_app_named() {
        if let Ok(base) = PocketchatPaths::default().base_dir() {
            assert!(base.ends_with(APP_DIR));
        }
    }
}
