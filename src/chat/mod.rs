
use std::sync::Arc;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::embeddings::EmbeddingModel;
use crate::llm::GenerationBackend;
use crate::store::{RetrievedChunk, VectorIndex};
use crate::{RagError, Result};

const PROMPT_INSTRUCTIONS: &str = "You are an assistant for the AWS Well-Architected Framework. \
Answer the question using only the numbered context blocks below, citing them with their [n] \
labels. If the context does not contain enough information to answer, say so explicitly.";

const GENERATION_SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions about \
the AWS Well-Architected Framework based on retrieved documentation excerpts.";

const NOT_INITIALISED_ANSWER: &str = "The retrieval index is not initialised yet. Run the \
ingestion pipeline to generate chunk embeddings, then restart the service.";

const NO_CONTEXT_ANSWER: &str = "I could not find any relevant context for that question in the \
indexed documentation.";

const PREVIEW_NOTICE: &str = "DeepSeek API key not configured; generation is unavailable. These \
are the most relevant excerpts for your question:";

/// One prior message in the conversation, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
}

/// The orchestrator's answer for a single query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Whether a vector index was successfully loaded at startup. A missing or
/// unloadable index degrades the service to a fixed answer instead of
/// crashing the process.
pub enum IndexState {
    Ready(Arc<VectorIndex>),
    Unavailable,
}

/// Whether a generation backend is configured. Without one, answers fall back
/// to a deterministic preview of the retrieved context.
pub enum Generation {
    Configured(Arc<dyn GenerationBackend>),
    Unconfigured,
}

/// The query-time pipeline: embed the query, retrieve the top-k chunks, and
/// produce an answer, degrading gracefully when the index or the generation
/// backend is missing.
pub struct ChatService {
    embedder: Arc<dyn EmbeddingModel>,
    index: IndexState,
    generation: Generation,
    top_k: usize,
}

impl ChatService {
    #[inline]
    pub fn new(
        embedder: Arc<dyn EmbeddingModel>,
        index: IndexState,
        generation: Generation,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            generation,
            top_k,
        }
    }

    /// Answer one query, optionally continuing a conversation.
    #[inline]
    pub fn answer(&self, query: &str, history: &[ConversationTurn]) -> Result<ChatResponse> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::EmptyQuery);
        }

        let IndexState::Ready(index) = &self.index else {
            warn!("Answering without a vector index; returning degraded response");
            return Ok(respond(NOT_INITIALISED_ANSWER.to_string(), Vec::new()));
        };

        let query_vector = self.embed_query(query)?;
        let chunks = index.search(&query_vector, self.top_k)?;

        if chunks.is_empty() {
            return Ok(respond(NO_CONTEXT_ANSWER.to_string(), Vec::new()));
        }

        let sources: Vec<String> = chunks
            .iter()
            .filter_map(|chunk| chunk.source.clone())
            .unique()
            .collect();

        debug!(
            "Retrieved {} chunks ({} distinct sources) for query",
            chunks.len(),
            sources.len()
        );

        let answer = match &self.generation {
            Generation::Configured(backend) => {
                let prompt = build_prompt(query, history, &chunks);
                backend.generate(&prompt, Some(GENERATION_SYSTEM_PROMPT))?
            }
            Generation::Unconfigured => preview_answer(&chunks),
        };

        info!("Answered query with {} sources", sources.len());
        Ok(respond(answer, sources))
    }

    fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embedder.encode(&[query.to_string()])?;
        if vectors.is_empty() {
            return Err(RagError::Embedding(
                "Embedding gateway returned no vector for the query".to_string(),
            ));
        }
        Ok(vectors.swap_remove(0))
    }
}

fn respond(answer: String, sources: Vec<String>) -> ChatResponse {
    ChatResponse {
        answer,
        sources,
        created_at: Utc::now(),
    }
}

/// Assemble the grounded prompt: instructions, optional conversation history,
/// numbered context blocks, then the question.
fn build_prompt(query: &str, history: &[ConversationTurn], chunks: &[RetrievedChunk]) -> String {
    let context_blocks = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "[{}] Source: {}\n{}",
                i + 1,
                chunk.source.as_deref().unwrap_or(&chunk.chunk_id),
                chunk.text
            )
        })
        .join("\n\n");

    let mut prompt = String::from(PROMPT_INSTRUCTIONS);

    if !history.is_empty() {
        let rendered = history
            .iter()
            .map(|turn| format!("{}: {}", capitalize(&turn.role), turn.content))
            .join("\n");
        prompt.push_str("\n\nConversation so far:\n");
        prompt.push_str(&rendered);
    }

    prompt.push_str("\n\nContext:\n");
    prompt.push_str(&context_blocks);
    prompt.push_str("\n\nQuestion: ");
    prompt.push_str(query);
    prompt
}

/// Deterministic fallback answer when no generation backend is configured:
/// the ranked chunk summaries, numbered in retrieval order.
fn preview_answer(chunks: &[RetrievedChunk]) -> String {
    let listing = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let summary = chunk.summary.as_deref().unwrap_or(&chunk.chunk_id);
            match chunk.source.as_deref() {
                Some(source) => format!("{}. {} ({})", i + 1, summary, source),
                None => format!("{}. {}", i + 1, summary),
            }
        })
        .join("\n");

    format!("{PREVIEW_NOTICE}\n\n{listing}")
}

fn capitalize(role: &str) -> String {
    let mut chars = role.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
