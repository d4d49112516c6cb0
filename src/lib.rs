use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Chunk file not found: {}; run the ingestion pipeline first", .0.display())]
    NotFound(PathBuf),

    #[error("No chunks were loaded from the embeddings file")]
    EmptyIndex,

    #[error("Query vector has {actual} dimensions but the index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Query vector norm is zero; cannot normalise")]
    ZeroNormQuery,

    #[error("Query must not be empty")]
    EmptyQuery,

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chat;
pub mod chunker;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod ingest;
pub mod llm;
pub mod store;
