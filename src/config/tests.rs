use super::*;
use tempfile::TempDir;

#[test]
fn defaults_when_config_file_absent() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let config = Config::load(temp_dir.path()).expect("should load defaults");

    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.ollama.batch_size, 32);
    assert_eq!(config.chunking.max_words, 220);
    assert_eq!(config.chunking.overlap_words, 40);
    assert_eq!(config.retrieval.top_k, 4);
    assert_eq!(config.deepseek.model, "deepseek-chat");
    assert!(config.deepseek.api_key.is_none());
    assert_eq!(config.base_dir, temp_dir.path());
}

#[test]
fn save_and_reload_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let mut config = Config::load(temp_dir.path()).expect("should load defaults");
    config.ollama.model = "all-minilm:latest".to_string();
    config.retrieval.top_k = 8;
    config.save().expect("should save config");

    let reloaded = Config::load(temp_dir.path()).expect("should reload config");
    assert_eq!(reloaded.ollama.model, "all-minilm:latest");
    assert_eq!(reloaded.retrieval.top_k, 8);
}

#[test]
fn partial_config_file_keeps_defaults_for_missing_sections() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[chunking]\nmax_words = 100\n",
    )
    .expect("should write config file");

    let config = Config::load(temp_dir.path()).expect("should load config");

    assert_eq!(config.chunking.max_words, 100);
    assert_eq!(config.chunking.overlap_words, 40);
    assert_eq!(config.ollama.host, "localhost");
}

#[test]
fn rejects_invalid_protocol() {
    let mut config = Config::load(TempDir::new().expect("temp dir").path()).expect("defaults");
    config.ollama.protocol = "ftp".to_string();

    let err = config.validate().expect_err("should reject protocol");
    assert!(matches!(err, ConfigError::InvalidProtocol(_)));
}

#[test]
fn rejects_overlap_not_smaller_than_max_words() {
    let mut config = Config::load(TempDir::new().expect("temp dir").path()).expect("defaults");
    config.chunking.max_words = 40;
    config.chunking.overlap_words = 40;

    let err = config.validate().expect_err("should reject overlap");
    assert!(matches!(err, ConfigError::InvalidOverlapWords(40, 40)));
}

#[test]
fn rejects_zero_top_k() {
    let mut config = Config::load(TempDir::new().expect("temp dir").path()).expect("defaults");
    config.retrieval.top_k = 0;

    let err = config.validate().expect_err("should reject top_k");
    assert!(matches!(err, ConfigError::InvalidTopK(0)));
}

#[test]
fn redacted_config_masks_api_key() {
    let mut config = Config::load(TempDir::new().expect("temp dir").path()).expect("defaults");
    config.deepseek.api_key = Some("sk-very-secret".to_string());

    let redacted = config.redacted();
    assert_eq!(redacted.deepseek.api_key.as_deref(), Some("<redacted>"));
    // The original is untouched.
    assert_eq!(config.deepseek.api_key.as_deref(), Some("sk-very-secret"));

    let rendered = toml::to_string_pretty(&redacted).expect("should render");
    assert!(!rendered.contains("sk-very-secret"));
}

#[test]
fn redacted_config_keeps_absent_key_absent() {
    let config = Config::load(TempDir::new().expect("temp dir").path()).expect("defaults");
    assert!(config.redacted().deepseek.api_key.is_none());
}

#[test]
fn ollama_url_is_well_formed() {
    let config = OllamaConfig::default();
    let url = config.url().expect("should build url");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn data_paths_are_under_base_dir() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::load(temp_dir.path()).expect("should load defaults");

    assert!(config.raw_docs_dir().starts_with(temp_dir.path()));
    assert!(
        config
            .embeddings_file_path()
            .ends_with("processed/wafr_chunks_with_embeddings.jsonl")
    );
}
