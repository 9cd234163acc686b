//! agentvfs CLI — the main entry point.
//!
//! Commands:
//! - `write`  — Write a file (content from the argument or stdin)
//! - `read`   — Print a file
//! - `rm`     — Delete a file
//! - `ls`     — List files, optionally filtered by a `*` pattern
//! - `stats`  — Show cache counters for the scope
//! - `config` — Show or locate the configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "agentvfs",
    about = "agentvfs — per-agent virtual filesystem",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Scope (agent or session) whose filesystem to use
    #[arg(short, long, global = true, default_value = "default", env = "AGENTVFS_SCOPE")]
    scope: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a file, creating or overwriting it
    Write {
        /// Absolute path, e.g. /Memories/notes.md
        path: String,

        /// Content to write; read from stdin when omitted
        content: Option<String>,

        /// MIME type of the content
        #[arg(long)]
        mime_type: Option<String>,
    },

    /// Print a file's contents
    Read { path: String },

    /// Delete a file
    Rm { path: String },

    /// List files
    Ls {
        /// Wildcard pattern, e.g. "/Memories/*.md"
        pattern: Option<String>,
    },

    /// Show file counters for the scope
    Stats,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Print a default config file
    Default,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so file contents on stdout stay clean
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let scope = cli.scope.as_str();
    match cli.command {
        Commands::Write {
            path,
            content,
            mime_type,
        } => commands::fs::write(scope, &path, content, mime_type).await?,
        Commands::Read { path } => commands::fs::read(scope, &path).await?,
        Commands::Rm { path } => commands::fs::remove(scope, &path).await?,
        Commands::Ls { pattern } => commands::fs::list(scope, pattern).await?,
        Commands::Stats => commands::fs::stats(scope).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Default => commands::config_cmd::default().await?,
        },
    }

    Ok(())
}
