//! System instruction rendering.

use minijinja::{Environment, context};
use pocketchat_core::{ChatError, Result};

/// Renders the system instruction sent at the head of every priming call.
///
/// The template receives a single `voice_mode` boolean; voice mode asks the
/// model for very short replies.
#[derive(Debug, Clone)]
pub struct SystemPrompt {
    template: String,
}

impl SystemPrompt {
    /// Parses the template, rejecting syntax errors up front.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let prompt = Self {
            template: template.into(),
        };
        prompt.render(false)?;
        Ok(prompt)
    }

    pub fn render(&self, voice_mode: bool) -> Result<String> {
        Environment::new()
            .render_str(&self.template, context! { voice_mode => voice_mode })
            .map_err(|e| ChatError::config(format!("invalid system prompt template: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocketchat_core::config::DEFAULT_SYSTEM_PROMPT;

    #[test]
    fn test_default_prompt_varies_by_voice_mode() {
        let prompt = SystemPrompt::new(DEFAULT_SYSTEM_PROMPT).unwrap();
        let text = prompt.render(false).unwrap();
        let voice = prompt.render(true).unwrap();

        assert!(text.starts_with("You are Cactus"));
        assert!(!text.contains("VERY short"));
        assert!(voice.ends_with("Keep your messages VERY short. One-two sentences max."));
    }

    #[test]
    fn test_invalid_template_is_a_config_error() {
        let err = SystemPrompt::new("{% if voice_mode %}unterminated").unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
    }
}
