//! Text chunking for retrieval and summarization.
//!
//! Splits raw text into overlapping, size-bounded [`Chunk`]s. Sizes are
//! measured in units produced by a [`Tokenizer`]; consecutive chunks share
//! exactly `chunk_overlap` units.

mod tokenizer;

pub use tokenizer::{CharTokenizer, Tokenizer, WordTokenizer, DEFAULT_MAX_INPUT_UNITS};

use crate::error::{Result, SporError};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

/// A contiguous slice of source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chunk {
    /// Text content of this chunk.
    pub text: String,
    /// Document, file or page this chunk came from.
    pub source_id: String,
    /// Position of this chunk within its source.
    pub sequence_index: usize,
}

impl Chunk {
    pub fn new(text: impl Into<String>, source_id: impl Into<String>, sequence_index: usize) -> Self {
        Self {
            text: text.into(),
            source_id: source_id.into(),
            sequence_index,
        }
    }
}

/// How chunk ends are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// Prefer the separator, then blank lines, line breaks, sentence ends
    /// and finally any whitespace; cut hard when nothing fits.
    Recursive,
    /// Only cut at the separator; a chunk grows past `chunk_size` until the
    /// next separator when none falls inside the window.
    Single,
}

impl std::str::FromStr for SplitMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "recursive" => Ok(SplitMode::Recursive),
            "single" => Ok(SplitMode::Single),
            _ => Err(format!("Unknown split mode: {}", s)),
        }
    }
}

/// Unit used to measure chunk length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitUnit {
    Word,
    Char,
}

impl SplitUnit {
    /// Tokenizer that produces this unit.
    pub fn tokenizer(self) -> Arc<dyn Tokenizer> {
        match self {
            SplitUnit::Word => Arc::new(WordTokenizer::new()),
            SplitUnit::Char => Arc::new(CharTokenizer::new()),
        }
    }
}

/// Parameters for one split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitterConfig {
    /// Maximum units per chunk.
    pub chunk_size: usize,
    /// Units repeated at the start of the following chunk.
    pub chunk_overlap: usize,
    /// Primary separator. An empty separator matches every unit boundary.
    pub separator: String,
    pub mode: SplitMode,
}

impl SplitterConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize, separator: &str, mode: SplitMode) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            separator: separator.to_string(),
            mode,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(SporError::InvalidInput("chunk_size must be at least 1".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(SporError::InvalidInput(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Places a chunk may end, from most to least preferred.
#[derive(Debug, Clone)]
enum Boundary {
    Literal(String),
    Sentence,
    Whitespace,
}

/// Deterministic overlapping text splitter.
#[derive(Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
    tokenizer: Arc<dyn Tokenizer>,
}

impl TextSplitter {
    pub fn new(config: SplitterConfig, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { config, tokenizer }
    }

    /// Splitter measuring length in words.
    pub fn words(config: SplitterConfig) -> Self {
        Self::new(config, Arc::new(WordTokenizer::new()))
    }

    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Split `text` into chunks attributed to `source_id`.
    ///
    /// Whitespace-only text yields no chunks.
    pub fn split(&self, text: &str, source_id: &str) -> Result<Vec<Chunk>> {
        self.config.validate()?;

        let units = self.tokenizer.tokenize(text)?;
        let total = units.len();
        if total == 0 || text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let end = if total - start <= self.config.chunk_size {
                total
            } else {
                self.find_end(text, &units, start)
            };

            let span = units[start].start..units[end - 1].end;
            chunks.push(Chunk::new(&text[span], source_id, chunks.len()));

            if end == total {
                break;
            }
            start = end - self.config.chunk_overlap;
        }

        debug!("Split {} units from {} into {} chunks", total, source_id, chunks.len());
        Ok(chunks)
    }

    /// Pick the exclusive end unit for a chunk beginning at `start`.
    ///
    /// The result always lies past `start + chunk_overlap` so the next chunk
    /// makes progress.
    fn find_end(&self, text: &str, units: &[Range<usize>], start: usize) -> usize {
        let window_end = start + self.config.chunk_size;
        let min_end = start + self.config.chunk_overlap + 1;

        match self.config.mode {
            SplitMode::Recursive => {
                for boundary in self.boundaries() {
                    if let Some(end) = (min_end..=window_end)
                        .rev()
                        .find(|&e| is_boundary(&boundary, text, units, e))
                    {
                        return end;
                    }
                }
                window_end
            }
            SplitMode::Single => {
                let boundary = Boundary::Literal(self.config.separator.clone());
                (min_end..=window_end)
                    .rev()
                    .find(|&e| is_boundary(&boundary, text, units, e))
                    .or_else(|| {
                        (window_end + 1..units.len()).find(|&e| is_boundary(&boundary, text, units, e))
                    })
                    .unwrap_or(units.len())
            }
        }
    }

    fn boundaries(&self) -> Vec<Boundary> {
        let mut levels = vec![Boundary::Literal(self.config.separator.clone())];
        for literal in ["\n\n", "\n"] {
            if self.config.separator != literal {
                levels.push(Boundary::Literal(literal.to_string()));
            }
        }
        levels.push(Boundary::Sentence);
        levels.push(Boundary::Whitespace);
        levels
    }
}

/// Whether a chunk may end just before unit `end`.
fn is_boundary(boundary: &Boundary, text: &str, units: &[Range<usize>], end: usize) -> bool {
    if end == 0 || end >= units.len() {
        return false;
    }
    let prev = &units[end - 1];
    let next = &units[end];
    let gap = &text[prev.end..next.start];
    let head = &text[..prev.end];

    match boundary {
        Boundary::Literal(sep) if sep.is_empty() => true,
        Boundary::Literal(sep) => gap.contains(sep.as_str()) || head.ends_with(sep.as_str()),
        Boundary::Sentence => {
            head.trim_end_matches(['"', '\'', ')'])
                .ends_with(['.', '!', '?'])
                && (!gap.is_empty() || text[next.clone()].chars().all(char::is_whitespace))
        }
        Boundary::Whitespace => {
            !gap.is_empty() || text[prev.clone()].chars().all(char::is_whitespace)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> Vec<&str> {
        text.split_whitespace().collect()
    }

    fn long_text() -> String {
        (0..120)
            .map(|i| {
                if i % 7 == 6 {
                    format!("w{}.", i)
                } else if i % 23 == 22 {
                    format!("w{}\n", i)
                } else {
                    format!("w{}", i)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_overlap_units_match() {
        let text = long_text();
        for mode in [SplitMode::Recursive, SplitMode::Single] {
            let splitter = TextSplitter::words(SplitterConfig::new(15, 4, "\n", mode));
            let chunks = splitter.split(&text, "doc").unwrap();
            assert!(chunks.len() > 2);

            for pair in chunks.windows(2) {
                let left = words(&pair[0].text);
                let right = words(&pair[1].text);
                assert_eq!(&left[left.len() - 4..], &right[..4]);
            }
        }
    }

    #[test]
    fn test_recursive_respects_size_and_covers_text() {
        let text = long_text();
        let splitter = TextSplitter::words(SplitterConfig::new(10, 2, "\n\n", SplitMode::Recursive));
        let chunks = splitter.split(&text, "doc").unwrap();

        for chunk in &chunks {
            assert!(words(&chunk.text).len() <= 10);
        }
        assert_eq!(words(&chunks[0].text)[0], "w0");
        assert_eq!(*words(&chunks.last().unwrap().text).last().unwrap(), "w119");
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence_index, i);
            assert_eq!(chunk.source_id, "doc");
        }
    }

    #[test]
    fn test_split_is_deterministic() {
        let text = long_text();
        let splitter = TextSplitter::words(SplitterConfig::new(12, 3, "\n", SplitMode::Recursive));
        assert_eq!(splitter.split(&text, "a").unwrap(), splitter.split(&text, "a").unwrap());
    }

    #[test]
    fn test_recursive_prefers_sentence_end() {
        let splitter = TextSplitter::words(SplitterConfig::new(5, 0, "\n\n", SplitMode::Recursive));
        let chunks = splitter.split("The sky is blue. The grass is green.", "doc").unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "The sky is blue.");
        assert_eq!(chunks[1].text, "The grass is green.");
    }

    #[test]
    fn test_recursive_prefers_separator_over_sentence() {
        let text = "one two.\n\nthree four five. six";
        let splitter = TextSplitter::words(SplitterConfig::new(5, 0, "\n\n", SplitMode::Recursive));
        let chunks = splitter.split(text, "doc").unwrap();
        assert_eq!(chunks[0].text, "one two.");
        assert_eq!(chunks[1].text, "three four five. six");
    }

    #[test]
    fn test_single_mode_tolerates_oversized_segment() {
        let splitter = TextSplitter::words(SplitterConfig::new(2, 0, "\n", SplitMode::Single));
        let chunks = splitter.split("aaa bbb ccc ddd\neee", "doc").unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "aaa bbb ccc ddd");
        assert_eq!(chunks[1].text, "eee");
    }

    #[test]
    fn test_char_units() {
        let splitter = TextSplitter::new(
            SplitterConfig::new(6, 2, "\n", SplitMode::Recursive),
            Arc::new(CharTokenizer::new()),
        );
        let chunks = splitter.split("abcdefghij", "doc").unwrap();
        assert_eq!(chunks[0].text, "abcdef");
        assert_eq!(chunks[1].text, "efghij");
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        let splitter = TextSplitter::words(SplitterConfig::new(5, 1, "\n", SplitMode::Recursive));
        assert!(splitter.split("   \n\n ", "doc").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_overlap() {
        let splitter = TextSplitter::words(SplitterConfig::new(5, 5, "\n", SplitMode::Recursive));
        assert!(matches!(splitter.split("a b c", "doc"), Err(SporError::InvalidInput(_))));
    }

    #[test]
    fn test_tokenizer_limit_surfaces() {
        let splitter = TextSplitter::new(
            SplitterConfig::new(5, 1, "\n", SplitMode::Recursive),
            Arc::new(WordTokenizer::with_limit(3)),
        );
        assert!(matches!(
            splitter.split("a b c d e", "doc"),
            Err(SporError::InputTooLarge(_))
        ));
    }
}
