//! Prompt templates for Spor.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub document: DocumentPrompts,
    pub site: SitePrompts,
    pub summary: SummaryPrompts,
    pub memory: MemoryPrompts,
    pub quiz: QuizPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for grounded document answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentPrompts {
    pub system: String,
}

impl Default for DocumentPrompts {
    fn default() -> Self {
        Self {
            system: r#"Answer the question using ONLY the following context. If you don't know the answer just say you don't know. DON'T make anything up.

Context: {{context}}"#
                .to_string(),
        }
    }
}

/// Prompts for the scored per-chunk answers and the final choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitePrompts {
    pub answer: String,
    pub choose: String,
}

impl Default for SitePrompts {
    fn default() -> Self {
        Self {
            answer: r#"Using ONLY the following context answer the user's question. If you can't just say you don't know, don't make anything up.

Then, give a score to the answer between 0 and 5.

If the answer answers the user question the score should be high, else it should be low.

Make sure to always include the answer's score even if it's 0.

Context: {{context}}

Examples:

Question: How far away is the moon?
Answer: The moon is 384,400 km away.
Score: 5

Question: How far away is the sun?
Answer: I don't know
Score: 0

Your turn!

Question: {{question}}"#
                .to_string(),

            choose: r#"Use ONLY the following pre-existing answers to answer the user's question.

Use the answers that have the highest score (more helpful).

Cite sources and return the sources of the answers as they are, do not change them.

Answers: {{answers}}"#
                .to_string(),
        }
    }
}

/// Prompts for refine summarization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryPrompts {
    pub initial: String,
    pub refine: String,
}

impl Default for SummaryPrompts {
    fn default() -> Self {
        Self {
            initial: r#"Write a concise summary of the following:
"{{text}}"
CONCISE SUMMARY:"#
                .to_string(),

            refine: r#"Your job is to produce a final, consolidated summary.
An existing summary is provided: {{existing_summary}}
Refine the existing summary by incorporating the following new context.
------------
{{context}}
------------
Given the new context, refine the original summary. If the context isn't useful, return the original summary.
Output ONLY the refined summary, without any other text."#
                .to_string(),
        }
    }
}

/// Prompts for folding old conversation turns into a running summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryPrompts {
    pub summarize: String,
}

impl Default for MemoryPrompts {
    fn default() -> Self {
        Self {
            summarize: r#"Progressively summarize the lines of conversation provided, adding onto the previous summary and returning a new summary.

Current summary:
{{summary}}

New lines of conversation:
{{new_lines}}

New summary:"#
                .to_string(),
        }
    }
}

/// Prompts for quiz generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizPrompts {
    pub system: String,
}

impl Default for QuizPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a helpful assistant that is role playing as a teacher.

Based ONLY on the following context make {{count}} questions to test the user's knowledge about the text.

Each question should have 4 answers, three of them must be incorrect and one should be correct.

Respond with JSON only, in this shape:
{"questions": [{"question": "...", "answers": [{"answer": "...", "correct": false}]}]}

Context: {{context}}"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            if let Some(p) = read_override(&custom_path, "document.toml")? {
                prompts.document = p;
            }
            if let Some(p) = read_override(&custom_path, "site.toml")? {
                prompts.site = p;
            }
            if let Some(p) = read_override(&custom_path, "summary.toml")? {
                prompts.summary = p;
            }
            if let Some(p) = read_override(&custom_path, "memory.toml")? {
                prompts.memory = p;
            }
            if let Some(p) = read_override(&custom_path, "quiz.toml")? {
                prompts.quiz = p;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Placeholders are found in the template only; substituted values are
    /// copied verbatim. Unknown placeholders are left in place.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        placeholder_pattern()
            .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &[(&str, &str)]) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert((*key).to_string(), (*value).to_string());
        }
        Self::render(template, &merged)
    }
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("valid placeholder pattern"))
}

fn read_override<T: serde::de::DeserializeOwned>(
    dir: &std::path::Path,
    file: &str,
) -> crate::error::Result<Option<T>> {
    let path = dir.join(file);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)?;
    Ok(Some(toml::from_str(&content)?))
}
