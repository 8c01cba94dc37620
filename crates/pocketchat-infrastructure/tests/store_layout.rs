use pocketchat_core::conversation::{Conversation, ConversationRepository, Message, ModelDescriptor};
use pocketchat_infrastructure::{ConfigService, PocketchatPaths, TomlConversationRepository};
use tempfile::TempDir;

#[tokio::test]
async fn test_store_and_config_share_one_base_dir() {
    let temp_dir = TempDir::new().unwrap();
    let paths = PocketchatPaths::new(Some(temp_dir.path().to_path_buf()));
    std::fs::write(paths.config_file().unwrap(), "voice_mode = true\n").unwrap();

    let config = ConfigService::new(&paths).unwrap().get_config().unwrap();
    assert!(config.voice_mode);

    let repository = TomlConversationRepository::from_paths(&paths).unwrap();
    let model = ModelDescriptor::new("qwen3-0.6b-q8_0.gguf", "Qwen3 0.6B");
    let mut conversation = Conversation::new("c1", model.clone());
    conversation.append(Message::user("/no_think plan my day", model));
    repository.save(&conversation).await.unwrap();

    assert!(temp_dir.path().join("conversations").join("c1.toml").exists());
    let listed = repository.list_all().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "plan my day");
}
