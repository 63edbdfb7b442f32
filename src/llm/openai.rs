//! OpenAI-compatible chat completions backend.

use crate::error::BackendError;
use crate::llm::{CompletionOptions, LanguageModel, Prompt};
use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::debug;

/// Chat completions over an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    model: String,
    name: String,
}

impl OpenAiBackend {
    /// Creates a backend for `model`. `base_url` overrides the endpoint;
    /// local servers usually accept any key.
    #[must_use]
    pub fn new(model: &str, base_url: Option<&str>, api_key: Option<&str>) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key.unwrap_or("unused"));
        if let Some(base) = base_url {
            config = config.with_api_base(base);
        }
        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            name: format!("openai:{model}"),
        }
    }

    fn request_error(&self, e: &OpenAIError) -> BackendError {
        BackendError::Request {
            backend: self.name.clone(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        prompt: &Prompt,
        options: &CompletionOptions,
    ) -> Result<String, BackendError> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(prompt.system.as_str())
            .build()
            .map_err(|e| self.request_error(&e))?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt.user.as_str())
            .build()
            .map_err(|e| self.request_error(&e))?;
        let messages: Vec<ChatCompletionRequestMessage> = vec![system.into(), user.into()];
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_completion_tokens(options.max_tokens)
            .temperature(options.temperature)
            .messages(messages)
            .build()
            .map_err(|e| self.request_error(&e))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| self.request_error(&e))?;
        debug!(backend = %self.name, usage = ?response.usage, "completion received");

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| BackendError::EmptyCompletion {
                backend: self.name.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_includes_model() {
        let backend = OpenAiBackend::new("gpt-4o-mini", None, Some("sk-test"));
        assert_eq!(backend.name(), "openai:gpt-4o-mini");
    }
}
