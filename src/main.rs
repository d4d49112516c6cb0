use std::path::PathBuf;

use clap::{Parser, Subcommand};
use wafr_rag::Result;
use wafr_rag::commands::{init_config, run_chat, run_chunk, run_embed, show_config, show_status};
use wafr_rag::config::Config;

#[derive(Parser)]
#[command(name = "wafr-rag")]
#[command(about = "Retrieval-augmented chat over AWS Well-Architected Framework documentation")]
#[command(version)]
struct Cli {
    /// Override the base data/config directory
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split raw documents into overlapping word-window chunks
    Chunk,
    /// Generate embeddings for chunks via Ollama
    Embed {
        /// Print enriched records to stdout instead of writing the file
        #[arg(long)]
        stdout: bool,
    },
    /// Ask a question against the indexed documentation
    Chat {
        /// Natural language question
        query: String,
    },
    /// Show pipeline status
    Status,
    /// Show or initialize configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config_dir {
        Some(dir) => Config::load(dir)?,
        None => Config::load_default()?,
    };

    match cli.command {
        Commands::Chunk => run_chunk(&config)?,
        Commands::Embed { stdout } => run_embed(&config, stdout)?,
        Commands::Chat { query } => run_chat(&config, &query, &[])?,
        Commands::Status => show_status(&config)?,
        Commands::Config { init } => {
            if init {
                init_config(&config)?;
            } else {
                show_config(&config)?;
            }
        }
    }

    Ok(())
}
