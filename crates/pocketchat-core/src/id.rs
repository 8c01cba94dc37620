//! Identifier generation for conversations and messages.

use uuid::Uuid;

/// Generates an opaque identifier that is unique within a conversation store.
///
/// Identifiers carry no format guarantees beyond uniqueness; callers must
/// treat them as opaque tokens.
pub fn generate_unique_id() -> String {
    Uuid::new_v4().simple().to_string()
}
