use std::sync::Arc;

use anyhow::Context;
use console::style;
use tracing::{info, warn};

use crate::Result;
use crate::chat::{ChatService, ConversationTurn, Generation, IndexState};
use crate::config::Config;
use crate::embeddings::{EmbeddingModel, OllamaClient};
use crate::ingest;
use crate::llm::DeepSeekClient;
use crate::store::VectorIndex;

/// Chunking pass: raw documents into the chunk file.
#[inline]
pub fn run_chunk(config: &Config) -> Result<()> {
    let total = ingest::generate_chunks(config)?;
    println!(
        "Generated {} chunks -> {}",
        style(total).bold(),
        config.chunk_file_path().display()
    );
    Ok(())
}

/// Embedding pass: chunk file into the chunk+embedding file, or onto stdout
/// for inspection.
#[inline]
pub fn run_embed(config: &Config, to_stdout: bool) -> Result<()> {
    let client = OllamaClient::new(config)?;
    client
        .ping()
        .context("Ollama server is not reachable; is it running?")?;

    if to_stdout {
        let mut writer = ingest::StdoutChunkWriter;
        let written = ingest::embed_chunks_with(config, &client, &mut writer)?;
        info!("Printed {written} embedded chunks to stdout");
        return Ok(());
    }

    let written = ingest::embed_chunks(config, &client)?;
    println!(
        "Embedded {} chunks -> {}",
        style(written).bold(),
        config.embeddings_file_path().display()
    );
    Ok(())
}

/// Wire up the chat service from configuration: embedding client, vector
/// index (degraded mode when missing), and the optional generation backend.
#[inline]
pub fn build_chat_service(config: &Config) -> Result<ChatService> {
    let embedder: Arc<dyn EmbeddingModel> = Arc::new(OllamaClient::new(config)?);

    let index = match VectorIndex::load(&config.embeddings_file_path()) {
        Ok(index) => IndexState::Ready(Arc::new(index)),
        Err(e) => {
            warn!("Vector index unavailable, answering in degraded mode: {e}");
            IndexState::Unavailable
        }
    };

    let generation = match config.deepseek_api_key() {
        Some(key) => {
            let client = DeepSeekClient::new(&config.deepseek, key)?;
            Generation::Configured(Arc::new(client))
        }
        None => {
            info!("No DeepSeek API key configured; answers will preview retrieved context");
            Generation::Unconfigured
        }
    };

    Ok(ChatService::new(
        embedder,
        index,
        generation,
        config.retrieval.top_k,
    ))
}

/// Answer a single query from the command line.
#[inline]
pub fn run_chat(config: &Config, query: &str, history: &[ConversationTurn]) -> Result<()> {
    let service = build_chat_service(config)?;
    let response = service.answer(query, history)?;

    println!("{}", response.answer);
    if !response.sources.is_empty() {
        println!();
        println!("{}", style("Sources:").bold());
        for source in &response.sources {
            println!("  - {source}");
        }
    }
    Ok(())
}

/// Report the state of each stage of the pipeline.
#[inline]
pub fn show_status(config: &Config) -> Result<()> {
    println!("{}", style("wafr-rag status").bold());
    println!("  Base directory: {}", config.base_dir.display());

    let raw_dir = config.raw_docs_dir();
    if raw_dir.is_dir() {
        let documents = ingest::discover_documents(&raw_dir)?;
        println!("  Raw documents: {}", documents.len());
    } else {
        println!("  Raw documents: directory missing ({})", raw_dir.display());
    }

    match ingest::load_chunk_records(&config.chunk_file_path()) {
        Ok(records) => println!("  Chunk file: {} records", records.len()),
        Err(e) => println!("  Chunk file: {e}"),
    }

    match VectorIndex::load(&config.embeddings_file_path()) {
        Ok(index) => println!(
            "  Vector index: {} chunks, {} dimensions",
            index.len(),
            index.dimension()
        ),
        Err(e) => println!("  Vector index: {e}"),
    }

    let generation = if config.deepseek_api_key().is_some() {
        "configured"
    } else {
        "not configured (preview answers only)"
    };
    println!("  DeepSeek generation: {generation}");

    Ok(())
}

/// Print the active configuration as TOML, with the API key redacted.
#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    let rendered = toml::to_string_pretty(&config.redacted())
        .context("Failed to render configuration")?;
    println!("# {}", config.base_dir.join("config.toml").display());
    print!("{rendered}");
    Ok(())
}

/// Write the current (or default) configuration to disk.
#[inline]
pub fn init_config(config: &Config) -> Result<()> {
    config.save()?;
    println!(
        "Wrote configuration to {}",
        config.base_dir.join("config.toml").display()
    );
    Ok(())
}
