//! Multiple-choice quizzes generated from a document.

use crate::chunking::Chunk;
use crate::config::Prompts;
use crate::error::{Result, SporError};
use crate::llm::{ChatMessage, ChatModel};
use crate::rag::format_docs;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Questions asked per quiz.
pub const DEFAULT_QUESTION_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAnswer {
    pub answer: String,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub answers: Vec<QuizAnswer>,
}

impl QuizQuestion {
    /// Position of the correct answer.
    pub fn correct_index(&self) -> Option<usize> {
        self.answers.iter().position(|a| a.correct)
    }

    pub fn is_correct(&self, choice: usize) -> bool {
        self.answers.get(choice).is_some_and(|a| a.correct)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
}

impl Quiz {
    /// Parse a model reply, tolerating markdown code fences around the JSON.
    pub fn parse(raw: &str) -> Result<Self> {
        let json = strip_fences(raw);
        let quiz: Quiz = serde_json::from_str(json)
            .map_err(|e| SporError::LlmService(format!("Quiz reply is not valid JSON: {}", e)))?;
        quiz.validate()?;
        Ok(quiz)
    }

    /// Every question needs text and exactly one correct answer.
    pub fn validate(&self) -> Result<()> {
        if self.questions.is_empty() {
            return Err(SporError::LlmService("Quiz has no questions".to_string()));
        }
        for (i, q) in self.questions.iter().enumerate() {
            if q.question.trim().is_empty() {
                return Err(SporError::LlmService(format!("Question {} is empty", i + 1)));
            }
            let correct = q.answers.iter().filter(|a| a.correct).count();
            if correct != 1 {
                return Err(SporError::LlmService(format!(
                    "Question {} has {} correct answers, expected exactly one",
                    i + 1,
                    correct
                )));
            }
        }
        Ok(())
    }

    /// Number of `choices` that pick the correct answer.
    pub fn grade(&self, choices: &[usize]) -> usize {
        self.questions
            .iter()
            .zip(choices)
            .filter(|(q, c)| q.is_correct(**c))
            .count()
    }
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Asks the model for a quiz over a document.
pub struct QuizGenerator {
    llm: Arc<dyn ChatModel>,
    prompts: Prompts,
    question_count: usize,
}

impl QuizGenerator {
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self {
            llm,
            prompts: Prompts::default(),
            question_count: DEFAULT_QUESTION_COUNT,
        }
    }

    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_question_count(mut self, count: usize) -> Self {
        self.question_count = count.max(1);
        self
    }

    #[instrument(skip(self, chunks), fields(chunks = chunks.len()))]
    pub async fn generate(&self, chunks: &[Chunk]) -> Result<Quiz> {
        if chunks.is_empty() {
            return Err(SporError::InvalidInput("Nothing to make a quiz from".to_string()));
        }

        let count = self.question_count.to_string();
        let context = format_docs(chunks);
        let system = self.prompts.render_with_custom(
            &self.prompts.quiz.system,
            &[("count", count.as_str()), ("context", context.as_str())],
        );

        let raw = self
            .llm
            .complete(&system, &[ChatMessage::user("Make the quiz.")])
            .await?;
        let quiz = Quiz::parse(&raw)?;

        if quiz.questions.len() != self.question_count {
            warn!(
                "Asked for {} questions, got {}",
                self.question_count,
                quiz.questions.len()
            );
        }
        info!("Generated quiz with {} questions", quiz.questions.len());
        Ok(quiz)
    }
}
