//! Spor - question answering over documents, websites and meetings
//!
//! Text is split into overlapping chunks, embedded once (vectors are cached
//! on disk) and indexed in memory. Questions retrieve the closest chunks and
//! a chat model answers only from them.
//!
//! # Overview
//!
//! Spor allows you to:
//! - Chat with a PDF, DOCX or text file, with conversation memory
//! - Ask a website a question through its sitemap and get a scored, sourced answer
//! - Transcribe a meeting recording, summarize it or chat with it
//! - Generate a multiple-choice quiz from a document
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `chunking` - Overlapping text splitting
//! - `embedding` - Embedding generation and caching
//! - `cache` - Byte caches for vectors and checkpoints
//! - `retrieval` - In-memory similarity index
//! - `llm` - Chat model abstraction
//! - `rag` - Grounded, scored map-reduce and refine answering
//! - `extract`, `site`, `media`, `transcription` - Input adapters
//! - `quiz` - Quiz generation
//! - `orchestrator` - Pipeline coordination and cache layout
//!
//! # Example
//!
//! ```rust,no_run
//! use spor::config::Settings;
//! use spor::orchestrator::Orchestrator;
//! use spor::rag::ConversationState;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let index = orchestrator.embed_file(Path::new("report.pdf")).await?;
//!     let mut state = ConversationState::new();
//!     let answer = orchestrator
//!         .ask_document(&index, "What are the key findings?", &mut state)
//!         .await?;
//!     println!("{}", answer);
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod llm;
pub mod media;
pub mod openai;
pub mod orchestrator;
pub mod quiz;
pub mod rag;
pub mod retrieval;
pub mod site;
pub mod transcription;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, SporError};
