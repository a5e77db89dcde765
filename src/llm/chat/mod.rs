pub mod gemini;
pub mod retry;

use async_trait::async_trait;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;
use super::LlmConfig;
use self::gemini::GeminiChatClient;

pub use self::retry::{ complete_with_retry, RetryPolicy };

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionResponse {
    /// Generated text. `None` when the provider answered without any text part.
    pub text: Option<String>,
}

impl CompletionResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()) }
    }

    pub fn empty() -> Self {
        Self { text: None }
    }
}

/// Failure reported by a chat provider, already classified by the client
/// that talked to it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider rejected the caller's region: {0}")]
    RegionRestricted(String),

    #[error("provider precondition failed: {0}")]
    FailedPrecondition(String),

    #[error("provider rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("provider server error ({status}): {message}")]
    Server {
        status: u16,
        message: String,
    },

    #[error("provider request timed out: {0}")]
    Timeout(String),

    #[error("provider connection failed: {0}")]
    Connection(String),

    #[error("provider API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
    },

    #[error("failed to decode provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Whether another attempt could succeed without changing the request.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited(_) |
                ProviderError::Server { .. } |
                ProviderError::Timeout(_) |
                ProviderError::Connection(_)
        )
    }
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Sends the prompt fragments as one user turn and returns the reply.
    async fn complete(&self, contents: &[String]) -> Result<CompletionResponse, ProviderError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn ChatClient>, Box<dyn StdError + Send + Sync>> {
    let client: Arc<dyn ChatClient> = Arc::new(GeminiChatClient::from_config(config)?);
    Ok(client)
}
