//! TOML-based ConversationRepository implementation.

use crate::paths::PocketchatPaths;
use crate::storage::AtomicTomlFile;
use async_trait::async_trait;
use pocketchat_core::conversation::{Conversation, ConversationRepository};
use pocketchat_core::{ChatError, Result};
use std::path::{Path, PathBuf};

/// Stores each conversation as an individual TOML file.
///
/// ```text
/// conversations/
/// ├── 3f2a9c...e1.toml
/// └── 7b41d0...9c.toml
/// ```
///
/// Writes are atomic (tmp file + rename) and run on the blocking pool.
pub struct TomlConversationRepository {
    dir: PathBuf,
}

impl TomlConversationRepository {
    /// Creates a repository rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| {
            ChatError::store(format!(
                "failed to create conversations directory {}: {e}",
                dir.display()
            ))
        })?;

        Ok(Self { dir })
    }

    /// Creates a repository in the conversations directory of `paths`.
    pub fn from_paths(paths: &PocketchatPaths) -> Result<Self> {
        Self::new(paths.conversations_dir()?)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file(&self, conversation_id: &str) -> Result<AtomicTomlFile<Conversation>> {
        let valid = !conversation_id.is_empty()
            && conversation_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ChatError::InvalidInput(format!(
                "invalid conversation id: '{conversation_id}'"
            )));
        }

        Ok(AtomicTomlFile::new(
            self.dir.join(format!("{conversation_id}.toml")),
        ))
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ChatError::store(format!("storage task failed: {e}")))?
}

fn store_error(action: &str, conversation_id: &str, err: ChatError) -> ChatError {
    match err {
        ChatError::StoreFailure(_) | ChatError::InvalidInput(_) => err,
        other => ChatError::store(format!(
            "failed to {action} conversation '{conversation_id}': {other}"
        )),
    }
}

#[async_trait]
impl ConversationRepository for TomlConversationRepository {
    async fn list_all(&self) -> Result<Vec<Conversation>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ChatError::store(format!(
                    "failed to read conversations directory: {e}"
                )));
            }
        };

        let mut conversations = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ChatError::store(format!("failed to read directory entry: {e}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("toml") {
                continue;
            }

            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!("[TomlConversationRepository] Skipping {:?}: {}", path, e);
                    continue;
                }
            };
            match toml::from_str::<Conversation>(&content) {
                Ok(conversation) => conversations.push(conversation),
                Err(e) => {
                    tracing::warn!("[TomlConversationRepository] Skipping {:?}: {}", path, e);
                }
            }
        }

        // Most recent first
        conversations.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(conversations)
    }

    async fn find_by_id(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        let file = self.file(conversation_id)?;
        let id = conversation_id.to_string();

        blocking(move || file.load())
            .await
            .map_err(|e| store_error("load", &id, e))
    }

    async fn save(&self, conversation: &Conversation) -> Result<()> {
        let file = self.file(&conversation.id)?;
        let conversation = conversation.clone();
        let id = conversation.id.clone();

        blocking(move || file.store(&conversation))
            .await
            .map_err(|e| store_error("save", &id, e))?;

        tracing::debug!("[TomlConversationRepository] Saved conversation {}", id);
        Ok(())
    }

    async fn delete(&self, conversation_id: &str) -> Result<()> {
        let file = self.file(conversation_id)?;
        let id = conversation_id.to_string();

        let removed = blocking(move || file.remove())
            .await
            .map_err(|e| store_error("delete", &id, e))?;

        if removed {
            tracing::info!("[TomlConversationRepository] Deleted conversation {}", id);
        } else {
            tracing::debug!("[TomlConversationRepository] Conversation {} already gone", id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocketchat_core::conversation::{Message, ModelDescriptor};
    use pocketchat_core::metrics::ModelMetrics;
    use tempfile::TempDir;

    fn model() -> ModelDescriptor {
        ModelDescriptor::new("gemma3-1b-q4.gguf", "Gemma 3 1B")
    }

    fn create_test_conversation(id: &str, last_updated: &str) -> Conversation {
        let mut conversation = Conversation::new(id, model());
        conversation.append(Message::user("Hello", model()));
        conversation.append(Message::assistant(
            "<think>greeting</think>Hi there!",
            model(),
            Some(ModelMetrics {
                time_to_first_token_ms: 182.0,
                completion_tokens: 9,
                tokens_per_second: 21.5,
            }),
        ));
        conversation.last_updated = last_updated.to_string();
        conversation
    }

    #[tokio::test]
    async fn test_save_and_find_by_id() {
        let temp_dir = TempDir::new().unwrap();
        let repository = TomlConversationRepository::new(temp_dir.path()).unwrap();
        let conversation = create_test_conversation("conv-1", "2026-03-01T09:00:00+00:00");

        repository.save(&conversation).await.unwrap();

        let loaded = repository.find_by_id("conv-1").await.unwrap().unwrap();
        assert_eq!(loaded, conversation);
        assert!(repository.find_by_id("conv-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_all_most_recent_first() {
        let temp_dir = TempDir::new().unwrap();
        let repository = TomlConversationRepository::new(temp_dir.path()).unwrap();

        for (id, at) in [
            ("a", "2026-01-01T00:00:00+00:00"),
            ("b", "2026-03-01T00:00:00+00:00"),
            ("c", "2026-02-01T00:00:00+00:00"),
        ] {
            repository.save(&create_test_conversation(id, at)).await.unwrap();
        }

        let ids: Vec<String> = repository
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_list_all_skips_unreadable_files() {
        let temp_dir = TempDir::new().unwrap();
        let repository = TomlConversationRepository::new(temp_dir.path()).unwrap();
        repository
            .save(&create_test_conversation("good", "2026-01-01T00:00:00+00:00"))
            .await
            .unwrap();
        std::fs::write(temp_dir.path().join("broken.toml"), "id = ").unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let conversations = repository.list_all().await.unwrap();

        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].id, "good");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let repository = TomlConversationRepository::new(temp_dir.path()).unwrap();
        repository
            .save(&create_test_conversation("doomed", "2026-01-01T00:00:00+00:00"))
            .await
            .unwrap();

        repository.delete("doomed").await.unwrap();
        repository.delete("doomed").await.unwrap();

        assert!(repository.find_by_id("doomed").await.unwrap().is_none());
        assert!(repository.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_store_failure() {
        let temp_dir = TempDir::new().unwrap();
        let repository = TomlConversationRepository::new(temp_dir.path()).unwrap();
        std::fs::write(temp_dir.path().join("bad.toml"), "messages = 3").unwrap();

        let err = repository.find_by_id("bad").await.unwrap_err();
        assert!(err.is_store_failure());
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let temp_dir = TempDir::new().unwrap();
        let repository = TomlConversationRepository::new(temp_dir.path()).unwrap();

        let err = repository.find_by_id("../config").await.unwrap_err();
        assert!(matches!(err, ChatError::InvalidInput(_)));
    }
}
