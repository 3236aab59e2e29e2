//! Error types for Spor.

use thiserror::Error;

/// Library-level error type for Spor operations.
#[derive(Error, Debug)]
pub enum SporError {
    #[error("Input too large: {0}")]
    InputTooLarge(String),

    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    #[error("LLM service error: {0}")]
    LlmService(String),

    #[error("Transcription service error: {0}")]
    TranscriptionService(String),

    #[error("Media extraction failed: {0}")]
    MediaExtraction(String),

    #[error("Text extraction failed: {0}")]
    TextExtraction(String),

    #[error("Site loading failed: {0}")]
    SiteLoad(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Spor operations.
pub type Result<T> = std::result::Result<T, SporError>;
