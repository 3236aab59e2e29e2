//! Conversation memory with a rolling summary.
//!
//! Recent turns are kept verbatim while they fit a unit budget; older turns
//! are folded into a running summary instead of being dropped.

use crate::chunking::Tokenizer;
use crate::config::Prompts;
use crate::error::Result;
use crate::llm::{ChatMessage, ChatModel};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

/// State of one chat session. Owned by the caller and passed explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    turns: Vec<ChatMessage>,
    summary: Option<String>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verbatim turns, oldest first.
    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    /// Summary of turns no longer kept verbatim.
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty() && self.summary.is_none()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.summary = None;
    }

    /// Record a completed question/answer exchange.
    pub fn push_exchange(&mut self, question: &str, answer: &str) {
        self.turns.push(ChatMessage::user(question));
        self.turns.push(ChatMessage::assistant(answer));
    }

    /// History as prompt messages: the summary first, then verbatim turns.
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.turns.len() + 1);
        if let Some(summary) = &self.summary {
            messages.push(ChatMessage::system(summary.clone()));
        }
        messages.extend(self.turns.iter().cloned());
        messages
    }

    /// Units used by the verbatim turns.
    pub fn buffer_units(&self, tokenizer: &dyn Tokenizer) -> usize {
        self.turns.iter().map(|t| tokenizer.count(&t.content)).sum()
    }
}

/// Keeps a [`ConversationState`] within its unit budget.
pub struct ConversationMemory {
    llm: Arc<dyn ChatModel>,
    prompts: Prompts,
    tokenizer: Arc<dyn Tokenizer>,
    max_token_limit: usize,
}

impl ConversationMemory {
    pub fn new(
        llm: Arc<dyn ChatModel>,
        prompts: Prompts,
        tokenizer: Arc<dyn Tokenizer>,
        max_token_limit: usize,
    ) -> Self {
        Self {
            llm,
            prompts,
            tokenizer,
            max_token_limit,
        }
    }

    pub fn max_token_limit(&self) -> usize {
        self.max_token_limit
    }

    /// Fold the oldest turns into the summary until the rest fit the budget.
    ///
    /// The state is only changed once the summary call succeeds.
    #[instrument(skip_all)]
    pub async fn fold_overflow(&self, state: &mut ConversationState) -> Result<()> {
        let mut used = state.buffer_units(self.tokenizer.as_ref());
        if used <= self.max_token_limit {
            return Ok(());
        }

        let mut split = 0;
        while used > self.max_token_limit && split < state.turns.len() {
            used -= self.tokenizer.count(&state.turns[split].content);
            split += 1;
        }

        let new_lines = state.turns[..split]
            .iter()
            .map(|t| format!("{}: {}", t.role, t.content))
            .collect::<Vec<_>>()
            .join("\n");
        let summary = state.summary.clone().unwrap_or_default();

        let prompt = self.prompts.render_with_custom(
            &self.prompts.memory.summarize,
            &[("summary", summary.as_str()), ("new_lines", new_lines.as_str())],
        );
        let folded = self.llm.complete("", &[ChatMessage::user(prompt)]).await?;

        debug!("Folded {} turns into conversation summary", split);
        state.turns.drain(..split);
        state.summary = Some(folded.trim().to_string());
        Ok(())
    }
}

impl std::fmt::Debug for ConversationMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationMemory")
            .field("max_token_limit", &self.max_token_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::WordTokenizer;
    use crate::error::SporError;
    use crate::llm::Role;
    use crate::testing::{last_user, ScriptedChat};

    fn memory(llm: Arc<ScriptedChat>, limit: usize) -> ConversationMemory {
        ConversationMemory::new(llm, Prompts::default(), Arc::new(WordTokenizer::new()), limit)
    }

    #[tokio::test]
    async fn test_within_budget_is_untouched() {
        let llm = Arc::new(ScriptedChat::new(|_, _| Ok("unused".to_string())));
        let mut state = ConversationState::new();
        state.push_exchange("what color is the sky", "blue");

        memory(llm.clone(), 80).fold_overflow(&mut state).await.unwrap();
        assert_eq!(state.turns().len(), 2);
        assert!(state.summary().is_none());
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_overflow_folds_oldest_turns() {
        let llm = Arc::new(ScriptedChat::new(|_, messages| {
            let prompt = last_user(messages);
            assert!(prompt.contains("Human: one two three four"));
            Ok("The human counted.".to_string())
        }));
        let mut state = ConversationState::new();
        state.push_exchange("one two three four", "five six");
        state.push_exchange("seven", "eight");

        memory(llm.clone(), 3).fold_overflow(&mut state).await.unwrap();

        assert_eq!(llm.calls(), 1);
        assert_eq!(state.summary(), Some("The human counted."));
        assert_eq!(state.buffer_units(&WordTokenizer::new()), 2);
        assert_eq!(state.turns()[0], ChatMessage::user("seven"));

        let messages = state.messages();
        assert_eq!(messages[0], ChatMessage::system("The human counted."));
        assert_eq!(messages.len(), 3);
        assert!(messages[1..].iter().all(|m| m.role != Role::System));
    }

    #[tokio::test]
    async fn test_failed_fold_leaves_state_unchanged() {
        let llm = Arc::new(ScriptedChat::new(|_, _| Err(SporError::LlmService("down".to_string()))));
        let mut state = ConversationState::new();
        state.push_exchange("a b c d e", "f g h");
        let before = state.clone();

        let err = memory(llm, 2).fold_overflow(&mut state).await.unwrap_err();
        assert!(matches!(err, SporError::LlmService(_)));
        assert_eq!(state, before);
    }
}
