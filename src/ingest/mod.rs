#[cfg(test)]
mod tests;

use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chunker::chunk_text;
use crate::config::Config;
use crate::embeddings::EmbeddingModel;
use crate::{RagError, Result};

/// Number of leading words copied into each record's summary field.
const SUMMARY_WORDS: usize = 18;

/// Pillar labels keyed by a substring of the document identifier. Iteration
/// order matters: the first matching keyword wins.
const PILLAR_KEYWORDS: [(&str, &str); 6] = [
    ("operational", "Operational Excellence"),
    ("security", "Security"),
    ("reliability", "Reliability"),
    ("performance", "Performance Efficiency"),
    ("cost", "Cost Optimization"),
    ("sustainability", "Sustainability"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Html,
    Pdf,
}

/// A raw document as produced by the scraper, before chunking.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub identifier: String,
    pub source: String,
    pub content: String,
    pub doc_type: DocType,
}

/// The persisted unit of retrieval. Written once during ingestion; the
/// `embedding` field is filled in by the later embedding pass and is never
/// mutated after that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub document_id: String,
    pub source: String,
    pub pillar: Option<String>,
    pub chunk_index: u32,
    pub text: String,
    pub word_count: usize,
    pub summary: String,
    pub doc_type: DocType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct RawDocPayload {
    id: Option<String>,
    #[serde(default)]
    source: String,
    #[serde(default)]
    content: String,
}

/// Classify a document into a Well-Architected pillar by identifier keyword.
#[inline]
pub fn infer_pillar(identifier: &str) -> Option<String> {
    let slug = identifier.to_lowercase();
    PILLAR_KEYWORDS
        .iter()
        .find(|(keyword, _)| slug.contains(keyword))
        .map(|(_, pillar)| (*pillar).to_string())
}

/// Discover raw documents under `input_dir`: `*.jsonl` files contain one
/// scraped HTML document per line; `*.pdf` files are listed so the skip is
/// visible, but carry no content.
#[inline]
pub fn discover_documents(input_dir: &Path) -> Result<Vec<RawDocument>> {
    let mut jsonl_paths = Vec::new();
    let mut pdf_paths = Vec::new();

    for entry in fs::read_dir(input_dir)
        .with_context(|| format!("Failed to read raw docs dir: {}", input_dir.display()))?
    {
        let path = entry?.path();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("jsonl") => jsonl_paths.push(path),
            Some("pdf") => pdf_paths.push(path),
            _ => {}
        }
    }
    jsonl_paths.sort();
    pdf_paths.sort();

    let mut documents = Vec::new();

    for path in jsonl_paths {
        let file = fs::File::open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let payload: RawDocPayload = serde_json::from_str(&line)
                .with_context(|| format!("Malformed document line in {}", path.display()))?;
            documents.push(RawDocument {
                identifier: payload.id.unwrap_or_else(|| file_stem(&path)),
                source: payload.source,
                content: payload.content,
                doc_type: DocType::Html,
            });
        }
    }

    for path in pdf_paths {
        documents.push(RawDocument {
            identifier: file_stem(&path),
            source: String::new(),
            content: String::new(),
            doc_type: DocType::Pdf,
        });
    }

    debug!("Discovered {} raw documents", documents.len());
    Ok(documents)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Build the ordered chunk records for one document. PDF documents need a
/// separate extraction step that does not exist yet, so they contribute zero
/// records.
#[inline]
pub fn build_chunk_records(
    document: &RawDocument,
    max_words: usize,
    overlap_words: usize,
) -> Result<Vec<ChunkRecord>> {
    if document.doc_type == DocType::Pdf {
        warn!("Skipping PDF document '{}'", document.identifier);
        return Ok(Vec::new());
    }

    let chunks = chunk_text(&document.content, max_words, overlap_words)?;
    let pillar = infer_pillar(&document.identifier);

    let records = chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let index = u32::try_from(i + 1).unwrap_or(u32::MAX);
            let summary = chunk
                .content
                .split_whitespace()
                .take(SUMMARY_WORDS)
                .collect::<Vec<_>>()
                .join(" ");
            ChunkRecord {
                chunk_id: format!("{}::chunk-{}", document.identifier, index),
                document_id: document.identifier.clone(),
                source: document.source.clone(),
                pillar: pillar.clone(),
                chunk_index: index,
                text: chunk.content,
                word_count: chunk.word_count,
                summary,
                doc_type: document.doc_type,
                embedding: None,
            }
        })
        .collect();

    Ok(records)
}

/// Sink for enriched chunk records.
pub trait ChunkWriter {
    fn write_records(&mut self, records: &[ChunkRecord]) -> Result<()>;
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Persists records as line-delimited JSON, one record per line.
///
/// Records go to a temporary sibling file first; `finish` renames it into
/// place, so an aborted pass leaves any previous output untouched.
pub struct FileChunkWriter {
    writer: BufWriter<fs::File>,
    tmp_path: PathBuf,
    path: PathBuf,
}

impl FileChunkWriter {
    #[inline]
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
        let tmp_path = tmp_sibling(path);
        let file = fs::File::create(&tmp_path)
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
            tmp_path,
            path: path.to_path_buf(),
        })
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

impl ChunkWriter for FileChunkWriter {
    #[inline]
    fn write_records(&mut self, records: &[ChunkRecord]) -> Result<()> {
        for record in records {
            serde_json::to_writer(&mut self.writer, record)?;
            self.writer.write_all(b"\n")?;
        }
        Ok(())
    }

    #[inline]
    fn finish(&mut self) -> Result<()> {
        self.writer
            .flush()
            .with_context(|| format!("Failed to flush {}", self.tmp_path.display()))?;
        fs::rename(&self.tmp_path, &self.path).with_context(|| {
            format!(
                "Failed to move {} into place at {}",
                self.tmp_path.display(),
                self.path.display()
            )
        })?;
        Ok(())
    }
}

/// Debug sink that prints records as JSON lines.
pub struct StdoutChunkWriter;

impl ChunkWriter for StdoutChunkWriter {
    #[inline]
    fn write_records(&mut self, records: &[ChunkRecord]) -> Result<()> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        for record in records {
            serde_json::to_writer(&mut handle, record)?;
            handle.write_all(b"\n")?;
        }
        Ok(())
    }
}

/// Chunking pass: raw documents in, chunk file out. Returns the number of
/// records written.
#[inline]
pub fn generate_chunks(config: &Config) -> Result<usize> {
    let documents = discover_documents(&config.raw_docs_dir())?;
    let output_path = config.chunk_file_path();
    let mut writer = FileChunkWriter::create(&output_path)?;

    let mut total = 0;
    for document in &documents {
        let records = build_chunk_records(
            document,
            config.chunking.max_words,
            config.chunking.overlap_words,
        )?;
        writer.write_records(&records)?;
        total += records.len();
    }
    writer.finish()?;

    info!("Generated {} chunks -> {}", total, output_path.display());
    Ok(total)
}

/// Read chunk records back from a line-delimited JSON file.
#[inline]
pub fn load_chunk_records(path: &Path) -> Result<Vec<ChunkRecord>> {
    if !path.exists() {
        return Err(RagError::NotFound(path.to_path_buf()));
    }

    let file = fs::File::open(path)?;
    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

/// Embedding pass: attach vectors to records in batches. Each batch makes one
/// gateway call; the final partial batch is flushed at the end. Records flow
/// to the writer in their original order.
#[inline]
pub fn embed_records(
    records: &[ChunkRecord],
    model: &dyn EmbeddingModel,
    batch_size: usize,
    writer: &mut dyn ChunkWriter,
) -> Result<usize> {
    if batch_size == 0 {
        return Err(RagError::InvalidParameter(
            "batch_size must be > 0".to_string(),
        ));
    }

    let total = records.len();
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} chunks embedded")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut written = 0;
    for batch in records.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|record| record.text.clone()).collect();
        let vectors = model.encode(&texts)?;

        if vectors.len() != batch.len() {
            return Err(RagError::Embedding(format!(
                "Embedding gateway returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }

        let enriched: Vec<ChunkRecord> = batch
            .iter()
            .cloned()
            .zip(vectors)
            .map(|(mut record, vector)| {
                record.embedding = Some(vector);
                record
            })
            .collect();

        writer.write_records(&enriched)?;
        written += enriched.len();
        bar.inc(enriched.len() as u64);
    }
    writer.finish()?;
    bar.finish_and_clear();

    info!("Embedded {} of {} chunk records", written, total);
    Ok(written)
}

/// Embedding pipeline against an arbitrary sink: chunk file in, enriched
/// records out through `writer`.
#[inline]
pub fn embed_chunks_with(
    config: &Config,
    model: &dyn EmbeddingModel,
    writer: &mut dyn ChunkWriter,
) -> Result<usize> {
    let records = load_chunk_records(&config.chunk_file_path())?;
    embed_records(&records, model, config.ollama.batch_size as usize, writer)
}

/// Full embedding pipeline: chunk file in, chunk+embedding file out. A failed
/// pass leaves any previously written output file intact.
#[inline]
pub fn embed_chunks(config: &Config, model: &dyn EmbeddingModel) -> Result<usize> {
    let output_path = config.embeddings_file_path();
    let mut writer = FileChunkWriter::create(&output_path)?;

    let written = embed_chunks_with(config, model, &mut writer)?;

    info!("Wrote {} embedded chunks -> {}", written, output_path.display());
    Ok(written)
}
