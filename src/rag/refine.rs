//! Refine summarization over an ordered chunk sequence.

use crate::cache::{content_key, ByteCache};
use crate::chunking::Chunk;
use crate::config::Prompts;
use crate::error::{Result, SporError};
use crate::llm::{ChatMessage, ChatModel};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// The summary being built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningSummary {
    pub text: String,
}

/// Progress saved after every step.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Checkpoint {
    next_index: usize,
    summary: String,
}

/// Folds chunks one at a time into a single summary.
pub struct RefineSummarizer {
    llm: Arc<dyn ChatModel>,
    prompts: Prompts,
    checkpoints: Option<Arc<dyn ByteCache>>,
}

impl RefineSummarizer {
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self {
            llm,
            prompts: Prompts::default(),
            checkpoints: None,
        }
    }

    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Persist progress so an interrupted run resumes where it stopped.
    pub fn with_checkpoints(mut self, cache: Arc<dyn ByteCache>) -> Self {
        self.checkpoints = Some(cache);
        self
    }

    /// Summarize `chunks` in the order given.
    pub async fn summarize(&self, chunks: &[Chunk]) -> Result<RunningSummary> {
        self.summarize_with_progress(chunks, &mut |_, _| {}).await
    }

    /// Like [`RefineSummarizer::summarize`], reporting `(done, total)` after each step.
    #[instrument(skip(self, chunks, on_step), fields(chunks = chunks.len()))]
    pub async fn summarize_with_progress(
        &self,
        chunks: &[Chunk],
        on_step: &mut (dyn FnMut(usize, usize) + Send),
    ) -> Result<RunningSummary> {
        let Some(first) = chunks.first() else {
            return Err(SporError::InvalidInput("Nothing to summarize".to_string()));
        };

        let key = self.checkpoint_key(chunks);
        let (mut summary, start) = match self.load_checkpoint(&key, chunks.len())? {
            Some(cp) => {
                info!("Resuming summary at chunk {} of {}", cp.next_index, chunks.len());
                (cp.summary, cp.next_index)
            }
            None => {
                let summary = self.initial(first).await?;
                self.save_checkpoint(&key, 1, &summary)?;
                (summary, 1)
            }
        };
        on_step(start, chunks.len());

        for (index, chunk) in chunks.iter().enumerate().skip(start) {
            summary = self.refine(&summary, chunk).await?;
            self.save_checkpoint(&key, index + 1, &summary)?;
            debug!("Refined summary with chunk {}", index);
            on_step(index + 1, chunks.len());
        }

        info!("Summarized {} chunks", chunks.len());
        Ok(RunningSummary { text: summary })
    }

    async fn initial(&self, chunk: &Chunk) -> Result<String> {
        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.summary.initial, &[("text", chunk.text.as_str())]);
        self.llm.complete("", &[ChatMessage::user(prompt)]).await
    }

    async fn refine(&self, existing: &str, chunk: &Chunk) -> Result<String> {
        let prompt = self.prompts.render_with_custom(
            &self.prompts.summary.refine,
            &[("existing_summary", existing), ("context", chunk.text.as_str())],
        );
        self.llm.complete("", &[ChatMessage::user(prompt)]).await
    }

    /// Fingerprint of the chunk texts and the prompts that fold them.
    fn checkpoint_key(&self, chunks: &[Chunk]) -> String {
        let mut parts: Vec<&str> = vec![
            "refine",
            self.prompts.summary.initial.as_str(),
            self.prompts.summary.refine.as_str(),
        ];
        parts.extend(chunks.iter().map(|c| c.text.as_str()));
        format!("summary-{}", content_key(&parts))
    }

    fn load_checkpoint(&self, key: &str, total: usize) -> Result<Option<Checkpoint>> {
        let Some(cache) = &self.checkpoints else {
            return Ok(None);
        };
        let Some(bytes) = cache.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_slice::<Checkpoint>(&bytes) {
            Ok(cp) if cp.next_index >= 1 && cp.next_index <= total => Ok(Some(cp)),
            Ok(cp) => {
                warn!("Ignoring checkpoint with out-of-range index {}", cp.next_index);
                Ok(None)
            }
            Err(e) => {
                warn!("Ignoring unreadable summary checkpoint: {}", e);
                Ok(None)
            }
        }
    }

    fn save_checkpoint(&self, key: &str, next_index: usize, summary: &str) -> Result<()> {
        if let Some(cache) = &self.checkpoints {
            let checkpoint = Checkpoint {
                next_index,
                summary: summary.to_string(),
            };
            cache.put(key, &serde_json::to_vec(&checkpoint)?)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryByteCache;
    use crate::testing::{last_user, ScriptedChat};

    /// Initial step wraps the text; refine steps append it.
    fn fold(messages: &[ChatMessage]) -> Result<String> {
        let prompt = last_user(messages);
        if let Some(rest) = prompt.strip_prefix("Write a concise summary of the following:\n\"") {
            let text = rest.split('"').next().unwrap_or("");
            return Ok(format!("[{}]", text));
        }
        let existing = prompt
            .split("An existing summary is provided: ")
            .nth(1)
            .and_then(|r| r.lines().next())
            .unwrap_or("");
        let context = prompt.split("------------\n").nth(1).unwrap_or("").trim();
        Ok(format!("{}+{}", existing, context))
    }

    fn folding_model() -> ScriptedChat {
        ScriptedChat::new(|_, messages| fold(messages))
    }

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk::new(*t, "transcript", i))
            .collect()
    }

    #[tokio::test]
    async fn test_refine_runs_in_order() {
        let llm = Arc::new(folding_model());
        let summarizer = RefineSummarizer::new(llm.clone());

        let summary = summarizer.summarize(&chunks(&["A", "B", "C"])).await.unwrap();
        assert_eq!(summary.text, "[A]+B+C");
        assert_eq!(llm.calls(), 3);
    }

    #[tokio::test]
    async fn test_order_changes_the_summary() {
        let summarizer = RefineSummarizer::new(Arc::new(folding_model()));

        let abc = summarizer.summarize(&chunks(&["A", "B", "C"])).await.unwrap();
        let acb = summarizer.summarize(&chunks(&["A", "C", "B"])).await.unwrap();
        assert_ne!(abc, acb);
    }

    #[tokio::test]
    async fn test_single_chunk_needs_one_call() {
        let llm = Arc::new(folding_model());
        let summary = RefineSummarizer::new(llm.clone())
            .summarize(&chunks(&["only"]))
            .await
            .unwrap();
        assert_eq!(summary.text, "[only]");
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected() {
        let summarizer = RefineSummarizer::new(Arc::new(folding_model()));
        assert!(matches!(
            summarizer.summarize(&[]).await,
            Err(SporError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_failure_resumes_from_checkpoint() {
        let cache: Arc<dyn ByteCache> = Arc::new(MemoryByteCache::new());
        let input = chunks(&["A", "B", "C"]);

        let flaky = Arc::new(ScriptedChat::new(|_, messages| {
            if last_user(messages).contains("\nC\n") {
                Err(SporError::LlmService("timeout".to_string()))
            } else {
                fold(messages)
            }
        }));
        let err = RefineSummarizer::new(flaky.clone())
            .with_checkpoints(cache.clone())
            .summarize(&input)
            .await
            .unwrap_err();
        assert!(matches!(err, SporError::LlmService(_)));
        assert_eq!(flaky.calls(), 3);

        let steady = Arc::new(folding_model());
        let summarizer = RefineSummarizer::new(steady.clone()).with_checkpoints(cache.clone());
        let summary = summarizer.summarize(&input).await.unwrap();
        assert_eq!(summary.text, "[A]+B+C");
        assert_eq!(steady.calls(), 1);

        let again = summarizer.summarize(&input).await.unwrap();
        assert_eq!(again, summary);
        assert_eq!(steady.calls(), 1);
    }
}
