pub mod llm;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use llm::ChatCompletionClient;

/// ロール構造化プロンプト（system 指示 + user 本文）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    #[must_use]
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned error status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider returned an empty response")]
    EmptyResponse,
    #[error("provider response could not be decoded: {0}")]
    Decode(String),
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// 生成AIテキストプロバイダ。具体的なプロバイダに依存せず `(prompt) -> text` として扱う。
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError>;
}
