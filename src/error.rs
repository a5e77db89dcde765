use thiserror::Error;
use crate::history::HistoryError;
use crate::llm::chat::ProviderError;

pub const REGION_RESTRICTED_DETAIL: &str =
    "The Gemini API is not available in your region. Please try using a VPN or contact support for assistance.";
pub const PRECONDITION_DETAIL: &str =
    "Unable to process the request. Please check your API key and try again.";
pub const NO_RESPONSE_DETAIL: &str = "No response generated from Gemini API";
pub const UNKNOWN_DETAIL: &str =
    "An error occurred while processing your request. Please try again later.";

/// Errors surfaced by the chat endpoint. `detail()` is the client-facing text;
/// `Display` keeps the underlying cause for logs.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("region restricted: {0}")]
    RegionRestricted(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("no response generated")]
    Generation,

    #[error("{0}")]
    Unknown(String),
}

impl ChatError {
    pub fn detail(&self) -> String {
        match self {
            ChatError::Validation(msg) => msg.clone(),
            ChatError::RegionRestricted(_) => REGION_RESTRICTED_DETAIL.to_string(),
            ChatError::Precondition(_) => PRECONDITION_DETAIL.to_string(),
            ChatError::Generation => NO_RESPONSE_DETAIL.to_string(),
            ChatError::Unknown(_) => UNKNOWN_DETAIL.to_string(),
        }
    }
}

impl From<ProviderError> for ChatError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::RegionRestricted(msg) => ChatError::RegionRestricted(msg),
            ProviderError::FailedPrecondition(msg) => ChatError::Precondition(msg),
            other => ChatError::Unknown(other.to_string()),
        }
    }
}

impl From<HistoryError> for ChatError {
    fn from(err: HistoryError) -> Self {
        ChatError::Unknown(err.to_string())
    }
}
