//! OpenAI chat completions implementation.

use super::{empty_response, ChatMessage, ChatModel, Role, TextStream};
use crate::error::{Result, SporError};
use crate::openai::create_client_with_timeout;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, instrument};

/// OpenAI-based chat model.
pub struct OpenAIChatModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAIChatModel {
    /// Create a chat model. `timeout` bounds every request.
    pub fn new(model: &str, temperature: f32, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: create_client_with_timeout(timeout)?,
            model: model.to_string(),
            temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(
        &self,
        system: &str,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<CreateChatCompletionRequest> {
        let mut request_messages: Vec<ChatCompletionRequestMessage> =
            Vec::with_capacity(messages.len() + 1);

        if !system.is_empty() {
            request_messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()
                    .map_err(|e| SporError::LlmService(e.to_string()))?
                    .into(),
            );
        }

        for message in messages {
            let converted: ChatCompletionRequestMessage = match message.role {
                Role::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(message.content.clone())
                    .build()
                    .map_err(|e| SporError::LlmService(e.to_string()))?
                    .into(),
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(message.content.clone())
                    .build()
                    .map_err(|e| SporError::LlmService(e.to_string()))?
                    .into(),
                Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(message.content.clone())
                    .build()
                    .map_err(|e| SporError::LlmService(e.to_string()))?
                    .into(),
            };
            request_messages.push(converted);
        }

        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(request_messages)
            .temperature(self.temperature)
            .stream(stream)
            .build()
            .map_err(|e| SporError::LlmService(e.to_string()))
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    #[instrument(skip_all, fields(model = %self.model, messages = messages.len()))]
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        let request = self.build_request(system, messages, false)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            SporError::LlmService(format!("Failed to generate response: {}", e))
        })?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|text| !text.is_empty())
            .ok_or_else(empty_response)?;

        debug!("Completion returned {} chars", content.len());
        Ok(content)
    }

    #[instrument(skip_all, fields(model = %self.model, messages = messages.len()))]
    async fn stream(&self, system: &str, messages: &[ChatMessage]) -> Result<TextStream> {
        let request = self.build_request(system, messages, true)?;

        let stream = self.client.chat().create_stream(request).await.map_err(|e| {
            SporError::LlmService(format!("Failed to start stream: {}", e))
        })?;

        let fragments = stream.filter_map(|item| async move {
            match item {
                Ok(chunk) => chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    .filter(|text| !text.is_empty())
                    .map(Ok),
                Err(e) => Some(Err(SporError::LlmService(format!("Stream interrupted: {}", e)))),
            }
        });

        Ok(fragments.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_skips_empty_system() {
        let model = OpenAIChatModel::new("gpt-4o-mini", 0.1, Duration::from_secs(5)).unwrap();

        let request = model
            .build_request("", &[ChatMessage::user("hi")], false)
            .unwrap();
        assert_eq!(request.messages.len(), 1);

        let request = model
            .build_request(
                "be brief",
                &[ChatMessage::user("hi"), ChatMessage::assistant("hello")],
                true,
            )
            .unwrap();
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.stream, Some(true));
        assert_eq!(request.model, "gpt-4o-mini");
    }
}
