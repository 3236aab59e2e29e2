//! Length units used to measure and cut chunks.

use crate::error::{Result, SporError};
use std::ops::Range;

/// Default ceiling on units accepted in a single input.
pub const DEFAULT_MAX_INPUT_UNITS: usize = 2_000_000;

/// Splits text into measurable units.
///
/// Units are returned as byte ranges into the input, in order and
/// non-overlapping. Text between two consecutive units is a gap.
pub trait Tokenizer: Send + Sync {
    /// Locate every unit in `text`.
    fn tokenize(&self, text: &str) -> Result<Vec<Range<usize>>>;

    /// Count units without materialising them.
    fn count(&self, text: &str) -> usize;
}

/// One unit per maximal run of non-whitespace characters.
///
/// Roughly tracks BPE token counts for English prose without shipping a
/// vocabulary.
#[derive(Debug, Clone)]
pub struct WordTokenizer {
    max_input_units: usize,
}

impl WordTokenizer {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_INPUT_UNITS)
    }

    pub fn with_limit(max_input_units: usize) -> Self {
        Self { max_input_units }
    }
}

impl Default for WordTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Range<usize>>> {
        let mut units = Vec::new();
        let mut run_start: Option<usize> = None;

        for (idx, ch) in text.char_indices() {
            match (ch.is_whitespace(), run_start) {
                (true, Some(start)) => {
                    units.push(start..idx);
                    run_start = None;
                }
                (false, None) => run_start = Some(idx),
                _ => {}
            }
            if units.len() > self.max_input_units {
                return Err(too_large(self.max_input_units));
            }
        }
        if let Some(start) = run_start {
            units.push(start..text.len());
        }
        if units.len() > self.max_input_units {
            return Err(too_large(self.max_input_units));
        }

        Ok(units)
    }

    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

/// One unit per Unicode scalar value.
#[derive(Debug, Clone)]
pub struct CharTokenizer {
    max_input_units: usize,
}

impl CharTokenizer {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_INPUT_UNITS * 8)
    }

    pub fn with_limit(max_input_units: usize) -> Self {
        Self { max_input_units }
    }
}

impl Default for CharTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for CharTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Range<usize>>> {
        let count = text.chars().count();
        if count > self.max_input_units {
            return Err(too_large(self.max_input_units));
        }
        Ok(text
            .char_indices()
            .map(|(idx, ch)| idx..idx + ch.len_utf8())
            .collect())
    }

    fn count(&self, text: &str) -> usize {
        text.chars().count()
    }
}

fn too_large(limit: usize) -> SporError {
    SporError::InputTooLarge(format!("input exceeds {} units", limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_units() {
        let text = "  hello   world\nagain ";
        let units = WordTokenizer::new().tokenize(text).unwrap();
        let words: Vec<&str> = units.iter().map(|r| &text[r.clone()]).collect();
        assert_eq!(words, vec!["hello", "world", "again"]);
        assert_eq!(WordTokenizer::new().count(text), 3);
    }

    #[test]
    fn test_char_units_multibyte() {
        let text = "aé✓";
        let units = CharTokenizer::new().tokenize(text).unwrap();
        assert_eq!(units.len(), 3);
        assert_eq!(&text[units[2].clone()], "✓");
    }

    #[test]
    fn test_limit_rejects_oversized_input() {
        let err = WordTokenizer::with_limit(2).tokenize("a b c").unwrap_err();
        assert!(matches!(err, SporError::InputTooLarge(_)));

        let err = CharTokenizer::with_limit(2).tokenize("abc").unwrap_err();
        assert!(matches!(err, SporError::InputTooLarge(_)));
    }
}
