use super::*;
use tempfile::TempDir;

struct CountingModel {
    calls: std::sync::Mutex<Vec<usize>>,
}

impl CountingModel {
    fn new() -> Self {
        Self {
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn batch_sizes(&self) -> Vec<usize> {
        self.calls.lock().expect("lock poisoned").clone()
    }
}

impl EmbeddingModel for CountingModel {
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.lock().expect("lock poisoned").push(texts.len());
        Ok(texts.iter().map(|text| vec![text.len() as f32]).collect())
    }
}

struct FailingModel;

impl EmbeddingModel for FailingModel {
    fn encode(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(RagError::Embedding("gateway unavailable".to_string()))
    }
}

struct CollectingWriter {
    records: Vec<ChunkRecord>,
}

impl ChunkWriter for CollectingWriter {
    fn write_records(&mut self, records: &[ChunkRecord]) -> Result<()> {
        self.records.extend_from_slice(records);
        Ok(())
    }
}

fn html_document(identifier: &str, content: &str) -> RawDocument {
    RawDocument {
        identifier: identifier.to_string(),
        source: format!("https://docs.example.com/{identifier}"),
        content: content.to_string(),
        doc_type: DocType::Html,
    }
}

#[test]
fn pillar_inference_matches_keywords() {
    assert_eq!(
        infer_pillar("wafr_security_pillar"),
        Some("Security".to_string())
    );
    assert_eq!(
        infer_pillar("WAFR_Operational_Excellence"),
        Some("Operational Excellence".to_string())
    );
    assert_eq!(infer_pillar("wafr_framework_overview"), None);
}

#[test]
fn pillar_inference_first_match_wins() {
    // "operational" precedes "cost" in the keyword table.
    assert_eq!(
        infer_pillar("operational_cost_review"),
        Some("Operational Excellence".to_string())
    );
}

#[test]
fn records_carry_one_based_chunk_ids() {
    let document = html_document("wafr_reliability_pillar", "one two three four five six");
    let records = build_chunk_records(&document, 3, 0).expect("should build records");

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].chunk_id, "wafr_reliability_pillar::chunk-1");
    assert_eq!(records[0].chunk_index, 1);
    assert_eq!(records[1].chunk_id, "wafr_reliability_pillar::chunk-2");
    assert_eq!(records[1].pillar, Some("Reliability".to_string()));
    assert!(records.iter().all(|r| r.embedding.is_none()));
}

#[test]
fn summary_is_first_eighteen_words() {
    let long_text = (1..=40).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
    let document = html_document("wafr_cost_optimization", &long_text);
    let records = build_chunk_records(&document, 40, 0).expect("should build records");

    let summary_words: Vec<&str> = records[0].summary.split_whitespace().collect();
    assert_eq!(summary_words.len(), 18);
    assert_eq!(summary_words[0], "w1");
    assert_eq!(summary_words[17], "w18");
}

#[test]
fn short_chunk_summary_is_whole_text() {
    let document = html_document("wafr_sustainability", "just a few words");
    let records = build_chunk_records(&document, 220, 40).expect("should build records");

    assert_eq!(records[0].summary, "just a few words");
}

#[test]
fn pdf_documents_are_skipped() {
    let document = RawDocument {
        identifier: "aws_well_architected_framework".to_string(),
        source: String::new(),
        content: String::new(),
        doc_type: DocType::Pdf,
    };

    let records = build_chunk_records(&document, 220, 40).expect("should not error");
    assert!(records.is_empty());
}

#[test]
fn discovery_reads_jsonl_and_lists_pdfs() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        temp_dir.path().join("docs.jsonl"),
        concat!(
            r#"{"id":"wafr_security_pillar","source":"https://example.com/sec","content":"secure all the things"}"#,
            "\n\n",
            r#"{"source":"https://example.com/anon","content":"no id here"}"#,
            "\n",
        ),
    )
    .expect("should write fixture");
    std::fs::write(temp_dir.path().join("framework.pdf"), b"%PDF-1.4")
        .expect("should write fixture");

    let documents = discover_documents(temp_dir.path()).expect("should discover");

    assert_eq!(documents.len(), 3);
    assert_eq!(documents[0].identifier, "wafr_security_pillar");
    assert_eq!(documents[0].doc_type, DocType::Html);
    // Documents without an id fall back to the file stem.
    assert_eq!(documents[1].identifier, "docs");
    assert_eq!(documents[2].identifier, "framework");
    assert_eq!(documents[2].doc_type, DocType::Pdf);
}

#[test]
fn embedding_pass_batches_records() {
    let document = html_document("wafr_security_pillar", "alpha beta gamma delta epsilon");
    let records = build_chunk_records(&document, 1, 0).expect("should build records");
    assert_eq!(records.len(), 5);

    let model = CountingModel::new();
    let mut writer = CollectingWriter {
        records: Vec::new(),
    };

    let written = embed_records(&records, &model, 2, &mut writer).expect("should embed");

    assert_eq!(written, 5);
    // Two full batches and one final partial batch.
    assert_eq!(model.batch_sizes(), vec![2, 2, 1]);
    assert!(writer.records.iter().all(|r| r.embedding.is_some()));
}

#[test]
fn embedding_pass_rejects_zero_batch_size() {
    let model = CountingModel::new();
    let mut writer = CollectingWriter {
        records: Vec::new(),
    };

    let err = embed_records(&[], &model, 0, &mut writer).expect_err("should reject");
    assert!(matches!(err, RagError::InvalidParameter(_)));
}

#[test]
fn records_round_trip_through_jsonl() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("chunks.jsonl");

    let document = html_document("wafr_performance_pillar", "measure twice cut once");
    let records = build_chunk_records(&document, 220, 40).expect("should build records");

    let mut writer = FileChunkWriter::create(&path).expect("should create writer");
    writer.write_records(&records).expect("should write");
    writer.finish().expect("should flush");

    let loaded = load_chunk_records(&path).expect("should load");
    assert_eq!(loaded, records);
    // The staging file is renamed away by finish.
    assert!(!tmp_sibling(&path).exists());
}

#[test]
fn failed_embedding_pass_preserves_previous_output() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::load(temp_dir.path()).expect("should load defaults");

    let document = html_document("wafr_security_pillar", "alpha beta gamma");
    let records = build_chunk_records(&document, 220, 40).expect("should build records");
    let mut writer =
        FileChunkWriter::create(&config.chunk_file_path()).expect("should create writer");
    writer.write_records(&records).expect("should write");
    writer.finish().expect("should flush");

    let embeddings_path = config.embeddings_file_path();
    std::fs::write(&embeddings_path, "previous output\n").expect("should seed file");

    let err = embed_chunks(&config, &FailingModel).expect_err("should fail");
    assert!(matches!(err, RagError::Embedding(_)));

    let content = std::fs::read_to_string(&embeddings_path).expect("should read file");
    assert_eq!(content, "previous output\n");
}

#[test]
fn stdout_writer_accepts_records() {
    let document = html_document("wafr_security_pillar", "alpha beta gamma");
    let records = build_chunk_records(&document, 220, 40).expect("should build records");

    let mut writer = StdoutChunkWriter;
    writer.write_records(&records).expect("should write");
    writer.finish().expect("should finish");
}

#[test]
fn loading_missing_chunk_file_fails_with_not_found() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let err = load_chunk_records(&temp_dir.path().join("missing.jsonl"))
        .expect_err("should fail");
    assert!(matches!(err, RagError::NotFound(_)));
}
