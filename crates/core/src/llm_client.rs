use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Who authored a conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One turn of a conversation that is replayed to the text-generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Failure of the external text-generation service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("text generation provider failed: {0}")]
    Provider(String),
    #[error("text generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("text generation returned an empty response")]
    EmptyResponse,
}

impl From<OpenAIError> for GenerationError {
    fn from(err: OpenAIError) -> Self {
        Self::Provider(err.to_string())
    }
}

/// The opaque text-generation collaborator every mode delegates content to.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produces a single completion for `prompt` under the given system instructions.
    async fn generate(&self, prompt: &str, instructions: &str) -> Result<String, GenerationError>;

    /// Continues a conversation: replays `history`, then sends `message`.
    async fn chat(
        &self,
        history: &[ChatMessage],
        message: &str,
        instructions: &str,
    ) -> Result<String, GenerationError>;
}

/// An implementation of `TextGenerator` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The model identifier to use for chat completions (e.g., "gemini-2.0-flash").
    /// * `timeout` - Upper bound on a single completion call.
    pub fn new(config: OpenAIConfig, model: String, timeout: Duration) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            timeout,
        }
    }

    async fn complete(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<String, GenerationError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .build()?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| {
                warn!(model = %self.model, timeout = ?self.timeout, "Completion timed out");
                GenerationError::Timeout(self.timeout)
            })??;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}

fn system_message(instructions: &str) -> Result<ChatCompletionRequestMessage, GenerationError> {
    Ok(ChatCompletionRequestSystemMessageArgs::default()
        .content(instructions)
        .build()?
        .into())
}

fn user_message(content: &str) -> Result<ChatCompletionRequestMessage, GenerationError> {
    Ok(ChatCompletionRequestUserMessageArgs::default()
        .content(content)
        .build()?
        .into())
}

#[async_trait]
impl TextGenerator for OpenAICompatibleClient {
    async fn generate(&self, prompt: &str, instructions: &str) -> Result<String, GenerationError> {
        let mut messages = Vec::with_capacity(2);
        if !instructions.is_empty() {
            messages.push(system_message(instructions)?);
        }
        messages.push(user_message(prompt)?);
        self.complete(messages).await
    }

    async fn chat(
        &self,
        history: &[ChatMessage],
        message: &str,
        instructions: &str,
    ) -> Result<String, GenerationError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        if !instructions.is_empty() {
            messages.push(system_message(instructions)?);
        }
        for turn in history {
            match turn.role {
                ChatRole::User => messages.push(user_message(&turn.content)?),
                ChatRole::Assistant => messages.push(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(turn.content.clone())
                        .build()?
                        .into(),
                ),
            }
        }
        messages.push(user_message(message)?);
        self.complete(messages).await
    }
}
