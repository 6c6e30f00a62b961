use anyhow::Result;
use clap::{Parser, Subcommand};
use docs_rag::commands::{ingest, query, resolve_base_dir, run_config, show_status};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "docs-rag")]
#[command(about = "Ingest documents into a local vector store and answer questions from them")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the default store location
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write the configuration file, or show the effective configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Chunk, embed and store one or more URLs or files
    Ingest {
        /// URLs (http/https) or paths to text files
        #[arg(required = true)]
        identifiers: Vec<String>,
        /// Words per chunk, overriding the configured value
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Words shared between consecutive chunks, overriding the configured value
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },
    /// Retrieve the passages most similar to a question and answer from them
    Query {
        /// The question to answer
        text: String,
        /// Number of passages to retrieve
        #[arg(long)]
        top_k: Option<usize>,
        /// Skip the language model and show the retrieved passages
        #[arg(long)]
        no_generate: bool,
    },
    /// Show the active backends and the state of the store
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let base_dir = resolve_base_dir(cli.base_dir)?;

    match cli.command {
        Commands::Config { show } => run_config(&base_dir, show)?,
        Commands::Ingest {
            identifiers,
            chunk_size,
            chunk_overlap,
        } => ingest(&base_dir, &identifiers, chunk_size, chunk_overlap)?,
        Commands::Query {
            text,
            top_k,
            no_generate,
        } => query(&base_dir, &text, top_k, no_generate)?,
        Commands::Status => show_status(&base_dir)?,
    }

    Ok(())
}
