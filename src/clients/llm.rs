use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Prompt, ProviderError, TextGenerator};
use crate::util::text::truncate_for_log;

/// OpenAI 互換の chat completions API クライアント。
#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    client: Client,
    base_url: Url,
    api_key: String,
    model: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionClient {
    /// # Errors
    /// HTTP クライアントの構築、またはベースURLのパースに失敗した場合はエラーを返す。
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build chat completion client")?;

        let base_url = Url::parse(&base_url.into()).context("invalid LLM base URL")?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
            model: model.into(),
            timeout,
        })
    }

    fn transport_error(&self, error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            ProviderError::Timeout(self.timeout)
        } else {
            ProviderError::Transport(error)
        }
    }

    fn completions_url(&self) -> Result<Url, ProviderError> {
        self.base_url
            .join("v1/chat/completions")
            .map_err(|error| ProviderError::Unavailable(format!("invalid completions URL: {error}")))
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let url = self.completions_url()?;
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: 0.7,
        };

        debug!(
            model = %self.model,
            prompt_chars = prompt.user.chars().count(),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| self.transport_error(error))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status,
                body: truncate_for_log(&body),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|error| ProviderError::Decode(error.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(content)
    }
}
