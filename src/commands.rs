use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

use crate::chunking::ChunkingConfig;
use crate::config::{Config, GenerationBackend, get_config_dir};
use crate::pipeline::RagContext;
use crate::store::{BackendFallback, open_backend};

/// Explicit `--base-dir`, or the default configuration directory
#[inline]
pub fn resolve_base_dir(base_dir: Option<PathBuf>) -> Result<PathBuf> {
    match base_dir {
        Some(dir) => Ok(dir),
        None => get_config_dir().context("Failed to determine configuration directory"),
    }
}

/// Print the effective configuration, or write it to disk
#[inline]
pub fn run_config(base_dir: &Path, show: bool) -> Result<()> {
    if show {
        let config = Config::load(base_dir).context("Failed to load configuration")?;
        show_config(&config);
        return Ok(());
    }

    let config = Config::load_file(base_dir).context("Failed to load configuration")?;
    config.save().context("Failed to save configuration")?;
    eprintln!(
        "{} {}",
        style("Configuration written to").green(),
        style(config.config_file_path().display()).cyan()
    );
    Ok(())
}

fn show_config(config: &Config) {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedding:").bold().yellow());
    eprintln!("  Backend: {}", style(config.embedding.backend).cyan());
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!("  Batch Size: {}", style(config.embedding.batch_size).cyan());
    match config.embedding.ollama.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  OpenAI URL: {}", style(&config.embedding.openai.base_url).cyan());

    eprintln!();
    eprintln!("{}", style("Storage:").bold().yellow());
    eprintln!("  Backend: {}", style(config.storage.backend).cyan());
    eprintln!("  Path: {}", style(config.store_path().display()).cyan());
    eprintln!("  Collection: {}", style(&config.storage.collection).cyan());

    eprintln!();
    eprintln!("{}", style("Chunking & Retrieval:").bold().yellow());
    eprintln!("  Chunk Size: {} words", style(config.chunking.chunk_size).cyan());
    eprintln!(
        "  Chunk Overlap: {} words",
        style(config.chunking.chunk_overlap).cyan()
    );
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());

    eprintln!();
    eprintln!("{}", style("Generation:").bold().yellow());
    eprintln!("  Backend: {}", style(config.generation.backend).cyan());
    if config.generation.backend != GenerationBackend::Disabled {
        eprintln!("  URL: {}", style(&config.generation.base_url).cyan());
        eprintln!("  Model: {}", style(&config.generation.model).cyan());
        eprintln!("  API Key Variable: {}", style(&config.generation.api_key_env).cyan());
    }

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
}

fn report_fallback(fallback: Option<&BackendFallback>) {
    if let Some(fallback) = fallback {
        eprintln!(
            "{} {} backend unavailable, using simple store instead: {}",
            style("⚠️").yellow(),
            fallback.requested,
            fallback.reason
        );
    }
}

fn spinner(message: String) -> ProgressBar {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Ingest each identifier in turn. Failures are reported and skipped; the
/// command fails if nothing could be ingested.
#[inline]
pub fn ingest(
    base_dir: &Path,
    identifiers: &[String],
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
) -> Result<()> {
    let mut config = Config::load(base_dir).context("Failed to load configuration")?;
    config.chunking = ChunkingConfig::new(
        chunk_size.unwrap_or(config.chunking.chunk_size),
        chunk_overlap.unwrap_or(config.chunking.chunk_overlap),
    )?;

    let mut context = RagContext::from_config(config)?;
    report_fallback(context.fallback());

    let mut total_chunks = 0;
    let mut failures = 0;
    for identifier in identifiers {
        let bar = spinner(format!("Ingesting {}", identifier));
        let result = context.ingest(identifier);
        bar.finish_and_clear();

        match result {
            Ok(report) if report.chunks == 0 => {
                println!(
                    "{} {}: no text found, nothing ingested",
                    style("⚠️").yellow(),
                    report.source
                );
            }
            Ok(report) => {
                total_chunks += report.chunks;
                println!(
                    "{} {}: {} chunks",
                    style("✅").green(),
                    report.source,
                    report.chunks
                );
            }
            Err(e) => {
                failures += 1;
                error!("Failed to ingest {}: {}", identifier, e);
                println!("{} {}: {}", style("❌").red(), identifier, e);
            }
        }
    }

    info!(
        "Ingestion finished: {} chunks, {} failures",
        total_chunks, failures
    );
    if failures == identifiers.len() && failures > 0 {
        anyhow::bail!("No sources could be ingested");
    }
    Ok(())
}

/// Answer a question from the store
#[inline]
pub fn query(base_dir: &Path, question: &str, top_k: Option<usize>, no_generate: bool) -> Result<()> {
    let mut config = Config::load(base_dir).context("Failed to load configuration")?;
    if no_generate {
        config.generation.backend = GenerationBackend::Disabled;
    }
    let top_k = top_k.unwrap_or(config.retrieval.top_k);

    let context = RagContext::from_config(config)?;
    report_fallback(context.fallback());

    let bar = spinner("Searching".to_string());
    let result = context.answer(question, top_k);
    bar.finish_and_clear();
    let answer = result?;

    if answer.hits.is_empty() {
        println!("No matching passages. Ingest some sources first.");
        return Ok(());
    }

    println!("{}", style("Answer").bold().cyan());
    println!("{}", answer.answer);
    if let Some(error) = &answer.generation_error {
        eprintln!();
        eprintln!(
            "{} Generation failed, showing retrieved passages: {}",
            style("⚠️").yellow(),
            error
        );
    }

    println!();
    println!("{}", style("Sources").bold().cyan());
    for (rank, hit) in answer.hits.iter().enumerate() {
        let chunk = hit
            .metadata
            .chunk_id
            .map(|id| format!(" #{}", id))
            .unwrap_or_default();
        println!(
            "  {}. {}{} {}",
            rank + 1,
            hit.metadata.source,
            chunk,
            style(format!("(score {:.3})", hit.score)).dim()
        );
    }

    Ok(())
}

/// Show the active configuration choices and the state of the store
#[inline]
pub fn show_status(base_dir: &Path) -> Result<()> {
    let config = Config::load(base_dir).context("Failed to load configuration")?;

    println!("📊 docs-rag Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Embedding:");
    println!(
        "   Backend: {} (model {})",
        config.embedding.backend, config.embedding.model
    );

    println!("🔍 Vector Store:");
    println!("   Configured backend: {}", config.storage.backend);
    println!("   Location: {}", config.store_path().display());
    match open_backend(&config.storage, config.get_base_dir()) {
        Ok(opened) => {
            println!("   Active backend: {}", opened.backend.kind());
            if let Some(fallback) = &opened.fallback {
                println!(
                    "   ⚠️  Fallback from {}: {}",
                    fallback.requested, fallback.reason
                );
            }
            match opened.backend.is_empty() {
                Ok(true) => println!("   Records: none"),
                Ok(false) => println!("   Records: present"),
                Err(e) => println!("   ❌ Records: unavailable - {}", e),
            }
        }
        Err(e) => {
            println!("   ❌ Failed to open store - {}", e);
        }
    }

    println!("💬 Generation:");
    println!("   Backend: {}", config.generation.backend);
    if config.generation.backend != GenerationBackend::Disabled {
        println!("   Model: {}", config.generation.model);
    }

    Ok(())
}
