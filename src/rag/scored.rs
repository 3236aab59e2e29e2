//! Scored map-reduce answering.
//!
//! Each chunk is answered on its own with a 0-5 confidence score (map), then
//! a second call sees every candidate with its source and score and composes
//! the final answer, favouring high scores (reduce).
//! A failed map call counts as a zero-score "I don't know" instead of
//! aborting the batch; every other failure is returned to the caller.

use super::context::format_candidates;
use crate::chunking::Chunk;
use crate::config::Prompts;
use crate::error::Result;
use crate::llm::{ChatMessage, ChatModel};
use futures::stream::{self, StreamExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, instrument, warn};

/// Answer text used when a chunk cannot answer the question.
pub const DONT_KNOW: &str = "I don't know";

/// Highest confidence score.
pub const MAX_SCORE: u8 = 5;

/// One candidate answer and how confident the model was in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredAnswer {
    pub question: String,
    pub answer_text: String,
    /// Source id of the chunk the answer came from.
    pub source: String,
    /// Confidence in `0..=5`.
    pub score: u8,
}

impl ScoredAnswer {
    fn unknown(question: &str, source: &str) -> Self {
        Self {
            question: question.to_string(),
            answer_text: DONT_KNOW.to_string(),
            source: source.to_string(),
            score: 0,
        }
    }
}

/// Two-stage answerer over retrieved chunks.
pub struct ScoredMapReduceAnswerer {
    llm: Arc<dyn ChatModel>,
    prompts: Prompts,
    concurrency: usize,
}

impl ScoredMapReduceAnswerer {
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self {
            llm,
            prompts: Prompts::default(),
            concurrency: 1,
        }
    }

    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Maximum map calls in flight at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Answer `query` from `chunks` and return the composed final answer.
    ///
    /// The result carries the source and score of the best candidate.
    #[instrument(skip(self, chunks), fields(chunks = chunks.len()))]
    pub async fn answer_scored(&self, query: &str, chunks: &[Chunk]) -> Result<ScoredAnswer> {
        if chunks.is_empty() {
            info!("No chunks to answer from");
            return Ok(ScoredAnswer::unknown(query, ""));
        }
        let candidates = self.map(query, chunks).await;
        self.reduce(query, &candidates).await
    }

    /// Answer `query` once per chunk. Output order matches `chunks`.
    pub async fn map(&self, query: &str, chunks: &[Chunk]) -> Vec<ScoredAnswer> {
        info!("Mapping question over {} chunks", chunks.len());
        stream::iter(chunks.iter().map(|chunk| self.map_one(query, chunk)))
            .buffered(self.concurrency)
            .collect()
            .await
    }

    async fn map_one(&self, query: &str, chunk: &Chunk) -> ScoredAnswer {
        let prompt = self.prompts.render_with_custom(
            &self.prompts.site.answer,
            &[("context", chunk.text.as_str()), ("question", query)],
        );

        match self.llm.complete("", &[ChatMessage::user(prompt)]).await {
            Ok(raw) => {
                let (answer_text, score) = parse_scored(&raw);
                debug!("Chunk {}#{} scored {}", chunk.source_id, chunk.sequence_index, score);
                ScoredAnswer {
                    question: query.to_string(),
                    answer_text,
                    source: chunk.source_id.clone(),
                    score,
                }
            }
            Err(e) => {
                warn!(
                    "Map call failed for {}#{}, scoring 0: {}",
                    chunk.source_id, chunk.sequence_index, e
                );
                ScoredAnswer::unknown(query, &chunk.source_id)
            }
        }
    }

    /// Compose a final answer from all candidates, zero scores included.
    #[instrument(skip(self, candidates), fields(candidates = candidates.len()))]
    pub async fn reduce(&self, query: &str, candidates: &[ScoredAnswer]) -> Result<ScoredAnswer> {
        let Some(best) = best_candidate(candidates) else {
            return Ok(ScoredAnswer::unknown(query, ""));
        };

        let answers = format_candidates(candidates);
        let system = self
            .prompts
            .render_with_custom(&self.prompts.site.choose, &[("answers", answers.as_str())]);
        let answer_text = self.llm.complete(&system, &[ChatMessage::user(query)]).await?;

        info!("Reduced {} candidates, best from {}", candidates.len(), best.source);
        Ok(ScoredAnswer {
            question: query.to_string(),
            answer_text,
            source: best.source.clone(),
            score: best.score,
        })
    }
}

/// Highest-scoring candidate; the earliest wins ties.
fn best_candidate(candidates: &[ScoredAnswer]) -> Option<&ScoredAnswer> {
    candidates
        .iter()
        .fold(None, |best: Option<&ScoredAnswer>, a| match best {
            Some(b) if b.score >= a.score => Some(b),
            _ => Some(a),
        })
}

fn score_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?im)^\s*score\s*:\s*(\d+)").expect("valid score pattern"))
}

fn answer_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^\s*answer\s*:\s*").expect("valid answer pattern"))
}

/// Split a map response into answer text and score.
///
/// The last `Score:` line wins and is clamped to 5; a missing score is 0.
pub fn parse_scored(raw: &str) -> (String, u8) {
    let score = score_pattern()
        .captures_iter(raw)
        .last()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().parse::<u32>().unwrap_or(u32::MAX).min(MAX_SCORE as u32) as u8)
        .unwrap_or(0);

    let body = score_pattern()
        .split(raw)
        .next()
        .unwrap_or("")
        .trim();
    let answer = answer_prefix().replace(body, "").trim().to_string();

    if answer.is_empty() {
        (DONT_KNOW.to_string(), score)
    } else {
        (answer, score)
    }
}
