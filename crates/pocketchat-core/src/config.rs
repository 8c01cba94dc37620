//! Session manager configuration.
//!
//! Loaded from `config.toml` by the infrastructure layer. Every field has a
//! default so a missing or partial file is valid.

use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};

/// Default system prompt template (minijinja syntax).
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Cactus, a very capable AI assistant running offline on a smartphone. {% if voice_mode %}Keep your messages VERY short. One-two sentences max.{% endif %}";

/// End-of-turn / end-of-text sentinels recognized across model families.
pub const DEFAULT_STOP_WORDS: [&str; 11] = [
    "</s>",
    "<|end|>",
    "<|eot_id|>",
    "<|end_of_text|>",
    "<|im_end|>",
    "<|EOT|>",
    "<|END_OF_TURN_TOKEN|>",
    "<|end_of_turn|>",
    "<|endoftext|>",
    "<end_of_turn>",
    "<|end_of_sentence|>",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// System instruction template; receives `voice_mode`.
    pub system_prompt: String,
    /// Prediction length used when priming the context.
    pub prime_predict: u32,
    /// Stop list used when priming the context.
    pub prime_stop: Vec<String>,
    /// Default prediction ceiling for streaming completions.
    pub stream_max_tokens: u32,
    /// Prediction ceiling for non-streaming completions.
    pub batch_max_tokens: u32,
    /// Upper bound for the engine's rewind call.
    pub rewind_timeout_ms: u64,
    pub stop_words: Vec<String>,
    pub streaming: bool,
    pub reasoning_enabled: bool,
    pub voice_mode: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            prime_predict: 1,
            prime_stop: vec!["</s>".to_string()],
            stream_max_tokens: 1024,
            batch_max_tokens: 1024,
            rewind_timeout_ms: 3000,
            stop_words: DEFAULT_STOP_WORDS.iter().map(|s| s.to_string()).collect(),
            streaming: true,
            reasoning_enabled: true,
            voice_mode: false,
        }
    }
}

impl ChatConfig {
    /// Checks invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.rewind_timeout_ms == 0 {
            return Err(ChatError::config("rewind_timeout_ms must be greater than zero"));
        }
        if self.batch_max_tokens == 0 || self.stream_max_tokens == 0 {
            return Err(ChatError::config("max token ceilings must be greater than zero"));
        }
        if self.stop_words.is_empty() {
            return Err(ChatError::config("at least one stop word is required"));
        }
        Ok(())
    }

    pub fn rewind_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.rewind_timeout_ms)
    }
}
