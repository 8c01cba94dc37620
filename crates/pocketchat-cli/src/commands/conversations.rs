use anyhow::{Context, Result};
use colored::Colorize;
use pocketchat_application::ConversationUpdater;
use pocketchat_core::conversation::{ConversationRepository, Message};
use pocketchat_core::segment::{reasoning_expanded, segment_message};
use pocketchat_infrastructure::{PocketchatPaths, TomlConversationRepository};
use std::sync::Arc;

fn open_store(paths: &PocketchatPaths) -> Result<Arc<TomlConversationRepository>> {
    let repository =
        TomlConversationRepository::from_paths(paths).context("Failed to open conversation store")?;
    Ok(Arc::new(repository))
}

pub async fn list(paths: &PocketchatPaths) -> Result<()> {
    let conversations = open_store(paths)?
        .list_all()
        .await
        .context("Failed to list conversations")?;

    if conversations.is_empty() {
        println!("{}", "No conversations.".dimmed());
        return Ok(());
    }

    for conversation in conversations {
        let title = if conversation.title.is_empty() {
            "(untitled)".to_string()
        } else {
            conversation.title.clone()
        };
        println!(
            "{}  {}  {}",
            conversation.id.yellow(),
            title.bold(),
            format!(
                "{} messages, updated {}",
                conversation.messages.len(),
                conversation.last_updated
            )
            .dimmed()
        );
    }
    Ok(())
}

pub async fn show(paths: &PocketchatPaths, id: &str, expand_reasoning: bool) -> Result<()> {
    let conversation = open_store(paths)?
        .find_by_id(id)
        .await
        .with_context(|| format!("Failed to load conversation '{}'", id))?
        .with_context(|| format!("Conversation '{}' not found", id))?;

    println!("{}", format!("=== {} ===", conversation.title).bright_magenta().bold());
    for message in &conversation.messages {
        print_message(message, expand_reasoning);
    }
    Ok(())
}

fn print_message(message: &Message, expand_reasoning: bool) {
    let author = if message.is_user {
        "You".cyan().bold()
    } else if message.model.label.is_empty() {
        "Assistant".magenta().bold()
    } else {
        message.model.label.magenta().bold()
    };
    println!("\n{}", author);

    let segmented = segment_message(message);
    if segmented.has_reasoning() {
        let toggle = expand_reasoning.then_some(true);
        if reasoning_expanded(message.metrics.is_some(), toggle) {
            println!("{}", segmented.reasoning.trim().dimmed().italic());
        } else {
            println!("{}", "[reasoning hidden, use --reasoning]".dimmed());
        }
    }
    println!("{}", segmented.response);

    if let Some(metrics) = &message.metrics {
        println!("{}", metrics.to_string().dimmed());
    }
}

pub async fn rename(paths: &PocketchatPaths, id: &str, title: &str) -> Result<()> {
    let title = title.trim();
    if title.is_empty() {
        anyhow::bail!("Title must not be empty");
    }

    let conversation = ConversationUpdater::new(open_store(paths)?)
        .update(id, |conversation| {
            conversation.rename(title);
            Ok(())
        })
        .await
        .with_context(|| format!("Failed to rename conversation '{}'", id))?;

    println!("{}", format!("Renamed {} to \"{}\"", conversation.id, conversation.title).green());
    Ok(())
}

pub async fn delete(paths: &PocketchatPaths, ids: &[String]) -> Result<()> {
    let repository = open_store(paths)?;
    for id in ids {
        repository
            .delete(id)
            .await
            .with_context(|| format!("Failed to delete conversation '{}'", id))?;
        println!("{}", format!("Deleted {}", id).green());
    }
    Ok(())
}
