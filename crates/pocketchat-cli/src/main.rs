use anyhow::Result;
use clap::{Parser, Subcommand};
use pocketchat_infrastructure::PocketchatPaths;
use pocketchat_infrastructure::logging::init_tracing;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "pocketchat")]
#[command(about = "Pocketchat CLI - inspect and maintain stored conversations", long_about = None)]
struct Cli {
    /// Base directory holding config.toml and conversations/
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List conversations, most recent first
    List,
    /// Show a conversation's messages
    Show {
        id: String,
        /// Expand reasoning segments
        #[arg(long)]
        reasoning: bool,
    },
    /// Rename a conversation
    Rename { id: String, title: String },
    /// Delete one or more conversations
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let paths = PocketchatPaths::new(cli.data_dir);
    match cli.command {
        Commands::List => commands::conversations::list(&paths).await?,
        Commands::Show { id, reasoning } => commands::conversations::show(&paths, &id, reasoning).await?,
        Commands::Rename { id, title } => commands::conversations::rename(&paths, &id, &title).await?,
        Commands::Delete { ids } => commands::conversations::delete(&paths, &ids).await?,
        Commands::Config => commands::config::show(&paths)?,
    }

    Ok(())
}
