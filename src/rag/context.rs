//! Prompt context formatting.

use super::ScoredAnswer;
use crate::chunking::Chunk;

/// Join chunk texts, in the order given, separated by blank lines.
pub fn format_docs(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render candidate answers for the reduce step.
pub fn format_candidates(answers: &[ScoredAnswer]) -> String {
    answers
        .iter()
        .map(|a| {
            format!(
                "Answer: {}\nSource: {}\nScore: {}\n",
                a.answer_text, a.source, a.score
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
