//! Chat completion capability.
//!
//! Pipelines talk to the model through [`ChatModel`]. Output may arrive as a
//! stream of text fragments; [`collect_stream`] concatenates them so the
//! result is identical to a single-shot completion.

mod openai;

pub use openai::OpenAIChatModel;

use crate::error::{Result, SporError};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "System"),
            Role::User => write!(f, "Human"),
            Role::Assistant => write!(f, "AI"),
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A finite stream of completion fragments.
pub type TextStream = BoxStream<'static, Result<String>>;

/// Trait for chat completion providers.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete a conversation. An empty `system` sends no system message.
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String>;

    /// Complete a conversation, yielding text as it is produced.
    ///
    /// The default yields the whole completion as one fragment.
    async fn stream(&self, system: &str, messages: &[ChatMessage]) -> Result<TextStream> {
        let text = self.complete(system, messages).await?;
        Ok(stream::iter(vec![Ok(text)]).boxed())
    }
}

/// Drain a completion stream, passing every fragment to `on_token`.
///
/// A stream that produced no text fails like an empty completion.
pub async fn collect_stream(
    mut stream: TextStream,
    on_token: &mut (dyn FnMut(&str) + Send),
) -> Result<String> {
    let mut text = String::new();
    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        on_token(&fragment);
        text.push_str(&fragment);
    }
    if text.is_empty() {
        return Err(empty_response());
    }
    Ok(text)
}

/// Complete a conversation through the streaming path.
pub async fn complete_streaming(
    model: &dyn ChatModel,
    system: &str,
    messages: &[ChatMessage],
    on_token: &mut (dyn FnMut(&str) + Send),
) -> Result<String> {
    let stream = model.stream(system, messages).await?;
    collect_stream(stream, on_token).await
}

/// Error for a response that carried no text.
pub(crate) fn empty_response() -> SporError {
    SporError::LlmService("Empty response from LLM".to_string())
}
