//! Splits raw model text into a reasoning segment and a response segment.
//!
//! Segmentation is a pure function of the current raw text snapshot. During
//! streaming it is re-run on every partial update, so it must never keep
//! state between calls.

use crate::conversation::{Message, MessageRole};
use serde::{Deserialize, Serialize};

/// Opening delimiter of an assistant reasoning block.
pub const THINK_OPEN: &str = "<think>";
/// Closing delimiter of an assistant reasoning block.
pub const THINK_CLOSE: &str = "</think>";
/// User-side directive asking the model to skip reasoning.
pub const NO_THINK_DIRECTIVE: &str = "/no_think";

/// Derived view of a message's raw text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentedOutput {
    pub reasoning: String,
    pub response: String,
    /// `true` while the closing delimiter has not been streamed in yet.
    pub reasoning_open: bool,
}

impl SegmentedOutput {
    fn response_only(response: impl Into<String>) -> Self {
        Self {
            reasoning: String::new(),
            response: response.into(),
            reasoning_open: false,
        }
    }

    pub fn has_reasoning(&self) -> bool {
        !self.reasoning.is_empty() || self.reasoning_open
    }
}

/// Segments raw text authored by `role`.
pub fn segment(raw: &str, role: MessageRole) -> SegmentedOutput {
    match role {
        MessageRole::User => segment_user(raw),
        MessageRole::Assistant => segment_assistant(raw),
    }
}

/// Segments a stored message.
pub fn segment_message(message: &Message) -> SegmentedOutput {
    segment(&message.text, message.role())
}

fn segment_user(raw: &str) -> SegmentedOutput {
    match raw.strip_prefix(NO_THINK_DIRECTIVE) {
        Some(rest) => SegmentedOutput::response_only(rest.trim_start()),
        None => SegmentedOutput::response_only(raw),
    }
}

fn segment_assistant(raw: &str) -> SegmentedOutput {
    if let Some(open) = raw.find(THINK_OPEN) {
        let after_open = &raw[open + THINK_OPEN.len()..];
        return match after_open.find(THINK_CLOSE) {
            Some(close) => SegmentedOutput {
                reasoning: after_open[..close].trim().to_string(),
                response: after_open[close + THINK_CLOSE.len()..].trim().to_string(),
                reasoning_open: false,
            },
            None => SegmentedOutput {
                reasoning: after_open.trim().to_string(),
                response: String::new(),
                reasoning_open: true,
            },
        };
    }

    // Some chat templates inject the opening delimiter into the prompt, so
    // only the closing one shows up in the generated text.
    if let Some(close) = raw.find(THINK_CLOSE) {
        return SegmentedOutput {
            reasoning: raw[..close].trim().to_string(),
            response: raw[close + THINK_CLOSE.len()..].trim().to_string(),
            reasoning_open: false,
        };
    }

    SegmentedOutput::response_only(raw)
}

/// Decides whether the reasoning block should be rendered expanded.
///
/// Expanded while the completion is running, collapsed once metrics are
/// attached. An explicit user toggle always wins.
pub fn reasoning_expanded(has_metrics: bool, user_toggle: Option<bool>) -> bool {
    user_toggle.unwrap_or(!has_metrics)
}
