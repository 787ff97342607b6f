use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// Log filter used when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str =
    "warn,reactforge=info,session_store=info,autosave=info,unload=info,editing_surface=info";

#[derive(Parser)]
#[command(name = "reactforge")]
#[command(about = "ReactForge CLI - chat-driven React component sessions", long_about = None)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved sessions, most recently modified first
    List,
    /// Print a session as JSON
    Show { id: String },
    /// Create and save an empty session
    New {
        /// Initial session name
        #[arg(long)]
        name: Option<String>,
    },
    /// Rename a session
    Rename { id: String, name: String },
    /// Delete a session
    Delete { id: String },
    /// Send one chat message and save the result
    Say { id: String, message: String },
    /// Interactive chat with autosave; Ctrl-C saves and exits
    Chat { id: String },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let context = commands::CliContext::load(cli.config).await?;

    match cli.command {
        Commands::List => commands::sessions::list(&context).await?,
        Commands::Show { id } => commands::sessions::show(&context, &id).await?,
        Commands::New { name } => commands::sessions::create(&context, name.as_deref()).await?,
        Commands::Rename { id, name } => commands::sessions::rename(&context, &id, &name).await?,
        Commands::Delete { id } => commands::sessions::delete(&context, &id).await?,
        Commands::Say { id, message } => commands::chat::say(&context, &id, &message).await?,
        Commands::Chat { id } => commands::chat::interactive(&context, &id).await?,
    }

    Ok(())
}
