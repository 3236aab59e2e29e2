//! Configuration module for Spor.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{
    DocumentPrompts, MemoryPrompts, Prompts, QuizPrompts, SitePrompts, SummaryPrompts,
};
pub use settings::{
    ChunkingSettings, EmbeddingSettings, GeneralSettings, LlmSettings, MediaSettings,
    MemorySettings, PromptSettings, RetrievalSettings, Settings, SiteSettings, SplitterSettings,
};
