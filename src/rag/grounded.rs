//! Context-grounded answers with conversation memory.

use super::context::format_docs;
use super::memory::{ConversationMemory, ConversationState};
use crate::chunking::{Chunk, Tokenizer, WordTokenizer};
use crate::config::Prompts;
use crate::error::Result;
use crate::llm::{complete_streaming, ChatMessage, ChatModel};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Default unit budget for verbatim conversation turns.
pub const DEFAULT_MEMORY_LIMIT: usize = 80;

/// Answers questions using only the supplied chunks.
pub struct GroundedAnswerer {
    llm: Arc<dyn ChatModel>,
    prompts: Prompts,
    memory: ConversationMemory,
}

impl GroundedAnswerer {
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self::with_prompts(llm, Prompts::default())
    }

    pub fn with_prompts(llm: Arc<dyn ChatModel>, prompts: Prompts) -> Self {
        let memory = ConversationMemory::new(
            llm.clone(),
            prompts.clone(),
            Arc::new(WordTokenizer::new()),
            DEFAULT_MEMORY_LIMIT,
        );
        Self {
            llm,
            prompts,
            memory,
        }
    }

    /// Override the memory budget and how it is measured.
    pub fn with_memory(mut self, tokenizer: Arc<dyn Tokenizer>, max_token_limit: usize) -> Self {
        self.memory = ConversationMemory::new(
            self.llm.clone(),
            self.prompts.clone(),
            tokenizer,
            max_token_limit,
        );
        self
    }

    /// Answer `question` from `context_chunks` and record the exchange.
    ///
    /// `state` is only updated once the answer arrives; on error it is left
    /// exactly as it was, even if older turns were already summarized.
    #[instrument(skip(self, context_chunks, state), fields(chunks = context_chunks.len()))]
    pub async fn answer(
        &self,
        context_chunks: &[Chunk],
        question: &str,
        state: &mut ConversationState,
    ) -> Result<String> {
        let (working, system, messages) = self.prepare(context_chunks, question, state).await?;
        let answer = self.llm.complete(&system, &messages).await?;
        commit(state, working, question, &answer);
        Ok(answer)
    }

    /// Like [`GroundedAnswerer::answer`], passing text to `on_token` as it arrives.
    #[instrument(skip(self, context_chunks, state, on_token), fields(chunks = context_chunks.len()))]
    pub async fn answer_streaming(
        &self,
        context_chunks: &[Chunk],
        question: &str,
        state: &mut ConversationState,
        on_token: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String> {
        let (working, system, messages) = self.prepare(context_chunks, question, state).await?;
        let answer = complete_streaming(self.llm.as_ref(), &system, &messages, on_token).await?;
        commit(state, working, question, &answer);
        Ok(answer)
    }

    /// Fold a copy of `state` and build the request from it.
    async fn prepare(
        &self,
        context_chunks: &[Chunk],
        question: &str,
        state: &ConversationState,
    ) -> Result<(ConversationState, String, Vec<ChatMessage>)> {
        let mut working = state.clone();
        self.memory.fold_overflow(&mut working).await?;

        let context = format_docs(context_chunks);
        let system = self
            .prompts
            .render_with_custom(&self.prompts.document.system, &[("context", context.as_str())]);

        let mut messages = working.messages();
        messages.push(ChatMessage::user(question));

        info!("Answering from {} context chunks", context_chunks.len());
        debug!("Prompt carries {} history messages", messages.len() - 1);
        Ok((working, system, messages))
    }
}

fn commit(state: &mut ConversationState, mut working: ConversationState, question: &str, answer: &str) {
    working.push_exchange(question, answer);
    *state = working;
}
