//! Deterministic test doubles for the external capabilities.

use crate::embedding::Embedder;
use crate::error::{Result, SporError};
use crate::llm::{ChatMessage, ChatModel};
use crate::transcription::Transcriber;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Lowercased alphanumeric words of `text`.
pub fn normalized_words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Bag-of-words embedder over a fixed vocabulary.
///
/// Records how many texts reached it so cache behaviour can be asserted.
pub struct VocabEmbedder {
    vocabulary: Vec<String>,
    calls: AtomicUsize,
    texts: AtomicUsize,
}

impl VocabEmbedder {
    pub fn new(vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: vocabulary.iter().map(|w| w.to_string()).collect(),
            calls: AtomicUsize::new(0),
            texts: AtomicUsize::new(0),
        }
    }

    /// Number of embed / embed_batch invocations.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of individual texts embedded.
    pub fn texts_embedded(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let words = normalized_words(text);
        self.vocabulary
            .iter()
            .map(|v| words.iter().filter(|w| *w == v).count() as f32)
            .collect()
    }
}

#[async_trait]
impl Embedder for VocabEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(1, Ordering::SeqCst);
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.vocabulary.len()
    }

    fn model_id(&self) -> &str {
        "vocab-test"
    }
}

/// Embedder whose service is always down.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(SporError::EmbeddingService("service unavailable".to_string()))
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(SporError::EmbeddingService("service unavailable".to_string()))
    }

    fn dimensions(&self) -> usize {
        3
    }

    fn model_id(&self) -> &str {
        "failing"
    }
}

type Responder = dyn Fn(&str, &[ChatMessage]) -> Result<String> + Send + Sync;

/// Chat model answering through a closure and recording every request.
pub struct ScriptedChat {
    respond: Box<Responder>,
    requests: Mutex<Vec<(String, Vec<ChatMessage>)>>,
}

impl ScriptedChat {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&str, &[ChatMessage]) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Copy of every (system, messages) pair received so far.
    pub fn requests(&self) -> Vec<(String, Vec<ChatMessage>)> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((system.to_string(), messages.to_vec()));
        }
        (self.respond)(system, messages)
    }
}

/// Transcriber that returns the audio bytes as UTF-8 text.
pub struct EchoTranscriber {
    calls: AtomicUsize,
}

impl EchoTranscriber {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for EchoTranscriber {
    async fn transcribe(&self, audio: Vec<u8>, _file_name: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        String::from_utf8(audio).map_err(|e| SporError::TranscriptionService(e.to_string()))
    }
}

/// Last user message of a request, or an empty string.
pub fn last_user(messages: &[ChatMessage]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.role == crate::llm::Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or("")
}
