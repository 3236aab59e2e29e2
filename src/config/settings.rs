//! Configuration settings for Spor.

use crate::chunking::{SplitMode, SplitUnit, SplitterConfig};
use crate::retrieval::DistanceMetric;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub memory: MemorySettings,
    pub site: SiteSettings,
    pub media: MediaSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Root of the on-disk cache (uploaded files, embeddings, transcripts).
    pub cache_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            cache_dir: "~/.spor/cache".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Chat completion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Chat model used for every pipeline.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Per-call timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            timeout_seconds: crate::openai::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl LlmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// One splitter profile as it appears in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterSettings {
    /// Maximum units per chunk.
    pub chunk_size: usize,
    /// Units shared between neighbouring chunks.
    pub chunk_overlap: usize,
    /// Primary separator.
    pub separator: String,
    /// Splitting mode (recursive, single).
    pub mode: SplitMode,
    /// Length unit (word, char).
    pub unit: SplitUnit,
}

impl Default for SplitterSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separator: "\n\n".to_string(),
            mode: SplitMode::Recursive,
            unit: SplitUnit::Word,
        }
    }
}

impl SplitterSettings {
    pub fn to_config(&self) -> SplitterConfig {
        SplitterConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            separator: self.separator.clone(),
            mode: self.mode,
        }
    }
}

/// Splitter profiles for each pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Uploaded documents.
    pub document: SplitterSettings,
    /// Pages loaded from a sitemap.
    pub site: SplitterSettings,
    /// Meeting transcripts.
    pub transcript: SplitterSettings,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            document: SplitterSettings {
                chunk_size: 600,
                chunk_overlap: 100,
                separator: "\n".to_string(),
                mode: SplitMode::Single,
                unit: SplitUnit::Word,
            },
            site: SplitterSettings::default(),
            transcript: SplitterSettings::default(),
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Number of chunks returned per query.
    pub top_k: usize,
    /// Similarity metric for the index.
    pub distance: DistanceMetric,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 4,
            distance: DistanceMetric::Cosine,
        }
    }
}

/// Conversation memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    /// Word budget for verbatim turns before older ones are summarized.
    pub max_token_limit: usize,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self { max_token_limit: 80 }
    }
}

/// Sitemap loading and site question answering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    /// Page fetch rate limit.
    pub requests_per_second: f64,
    /// Regexes; when non-empty only matching URLs are loaded.
    pub filter_urls: Vec<String>,
    /// Concurrent per-chunk answer calls.
    pub map_concurrency: usize,
    /// Timeout for a single page request, in seconds.
    pub request_timeout_seconds: u64,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            requests_per_second: 1.0,
            filter_urls: Vec::new(),
            map_concurrency: 4,
            request_timeout_seconds: 30,
        }
    }
}

/// Meeting media settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaSettings {
    /// Length of each audio segment sent to transcription, in minutes.
    pub chunk_minutes: u32,
    /// Speech-to-text model.
    pub transcription_model: String,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            chunk_minutes: 10,
            transcription_model: "whisper-1".to_string(),
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            settings.validate()?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Reject values the pipelines cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        for (name, profile) in [
            ("document", &self.chunking.document),
            ("site", &self.chunking.site),
            ("transcript", &self.chunking.transcript),
        ] {
            profile.to_config().validate().map_err(|e| {
                crate::error::SporError::Config(format!("chunking.{}: {}", name, e))
            })?;
        }
        crate::site::request_interval(self.site.requests_per_second)?;
        if self.media.chunk_minutes == 0 {
            return Err(crate::error::SporError::Config(
                "media.chunk_minutes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Render the settings as TOML.
    pub fn to_toml(&self) -> crate::error::Result<String> {
        toml::to_string_pretty(self).map_err(|e| crate::error::SporError::Config(e.to_string()))
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("spor")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded cache directory path.
    pub fn cache_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.cache_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profiles() {
        let settings = Settings::default();
        assert_eq!(settings.chunking.document.chunk_size, 600);
        assert_eq!(settings.chunking.document.chunk_overlap, 100);
        assert_eq!(settings.chunking.document.mode, SplitMode::Single);
        assert_eq!(settings.chunking.site.chunk_size, 1000);
        assert_eq!(settings.chunking.transcript.chunk_overlap, 200);
        assert_eq!(settings.memory.max_token_limit, 80);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [llm]
            model = "gpt-4o"

            [chunking.site]
            chunk_size = 500
            mode = "single"
            "#,
        )
        .unwrap();

        assert_eq!(settings.llm.model, "gpt-4o");
        assert_eq!(settings.llm.timeout_seconds, 300);
        assert_eq!(settings.chunking.site.chunk_size, 500);
        assert_eq!(settings.chunking.site.chunk_overlap, 200);
        assert_eq!(settings.chunking.site.mode, SplitMode::Single);
        assert_eq!(settings.retrieval.distance, DistanceMetric::Cosine);
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let mut settings = Settings::default();
        settings.chunking.transcript.chunk_overlap = 1000;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_rate() {
        for rate in [f64::INFINITY, f64::NAN, 0.0] {
            let mut settings = Settings::default();
            settings.site.requests_per_second = rate;
            assert!(matches!(
                settings.validate(),
                Err(crate::error::SporError::Config(_))
            ));
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retrieval]\ntop_k = 2\ndistance = \"l2\"\n").unwrap();

        let settings = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.retrieval.top_k, 2);
        assert_eq!(settings.retrieval.distance, DistanceMetric::L2);
    }
}
