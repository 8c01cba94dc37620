//! Conversation domain model.

use super::message::{Message, ModelDescriptor};
use serde::{Deserialize, Serialize};

/// Maximum number of characters kept when deriving a title from a user turn.
const TITLE_MAX_CHARS: usize = 40;

/// Represents a conversation in the application's domain layer.
///
/// The message sequence is in turn order. It conceptually alternates
/// user/assistant, but consecutive same-author entries (after a failed
/// completion or a retry) are valid and must be tolerated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Opaque conversation identifier
    pub id: String,
    /// Human-readable title (empty until the first user turn)
    #[serde(default)]
    pub title: String,
    /// Model selected for this conversation
    #[serde(default)]
    pub model: ModelDescriptor,
    /// Timestamp of the last mutation (RFC 3339)
    pub last_updated: String,
    /// Ordered turns
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Creates an empty conversation with the given id.
    pub fn new(id: impl Into<String>, model: ModelDescriptor) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            model,
            last_updated: chrono::Utc::now().to_rfc3339(),
            messages: Vec::new(),
        }
    }

    /// Appends a turn and refreshes `last_updated`.
    ///
    /// The first user turn of an untitled conversation also sets its title.
    pub fn append(&mut self, message: Message) {
        if self.title.is_empty() && message.is_user {
            self.title = derive_title(&message.text);
        }
        self.messages.push(message);
        self.touch();
    }

    /// Replaces the title.
    pub fn rename(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.touch();
    }

    pub fn touch(&mut self) {
        self.last_updated = chrono::Utc::now().to_rfc3339();
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Derives a display title from the text of a user turn.
///
/// Uses the first non-empty line with whitespace collapsed, stripped of a
/// leading `/no_think` directive, truncated with an ellipsis.
pub fn derive_title(text: &str) -> String {
    let text = text
        .trim_start()
        .strip_prefix(crate::segment::NO_THINK_DIRECTIVE)
        .unwrap_or(text);
    let line = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();
    let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() > TITLE_MAX_CHARS {
        let truncated: String = collapsed.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}…", truncated.trim_end())
    } else {
        collapsed
    }
}
