use async_trait::async_trait;
use std::error::Error as StdError;
use serde::{ Deserialize, Serialize };
use reqwest::StatusCode;
use log::{ debug, info };

use super::{ ChatClient, CompletionResponse, ProviderError };
use crate::llm::{ LlmConfig, DEFAULT_CHAT_MODEL, DEFAULT_GEMINI_BASE_URL };

const REGION_UNSUPPORTED: &str = "User location is not supported";
const FAILED_PRECONDITION: &str = "FAILED_PRECONDITION";

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Deserialize, Default)]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
}

#[derive(Deserialize)]
struct GoogleCandidate {
    #[serde(default)]
    content: Option<GoogleContent>,
}

#[derive(Deserialize)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Deserialize)]
struct GooglePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleError,
}

#[derive(Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Joins the text parts of the first candidate. Empty text counts as no text.
fn extract_text(body: &str) -> Result<Option<String>, ProviderError> {
    let parsed: GoogleResponse = serde_json
        ::from_str(body)
        .map_err(|e| ProviderError::Decode(e.to_string()))?;

    let text = parsed.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<String>()
        })
        .filter(|t| !t.is_empty());

    Ok(text)
}

/// Maps a non-success reply to a typed error. Region restrictions are also
/// reported as FAILED_PRECONDITION by the API, so the region check runs first.
fn classify_error(status: StatusCode, body: &str) -> ProviderError {
    let (message, api_status) = match serde_json::from_str::<GoogleErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.status),
        Err(_) => (body.trim().to_string(), String::new()),
    };

    if message.contains(REGION_UNSUPPORTED) {
        return ProviderError::RegionRestricted(message);
    }
    if api_status == FAILED_PRECONDITION || message.contains(FAILED_PRECONDITION) {
        return ProviderError::FailedPrecondition(message);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ProviderError::RateLimited(message);
    }
    if status.is_server_error() {
        return ProviderError::Server { status: status.as_u16(), message };
    }
    ProviderError::Api { status: status.as_u16(), message }
}

fn classify_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else if e.is_decode() {
        ProviderError::Decode(e.to_string())
    } else {
        ProviderError::Connection(e.to_string())
    }
}

pub struct GeminiChatClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        timeout: std::time::Duration
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        if api_key.trim().is_empty() {
            return Err("GEMINI_API_KEY environment variable is not set".into());
        }
        let chat_model = model.unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string());
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            api_key,
            model: chat_model,
            base_url,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| "GEMINI_API_KEY environment variable is not set".to_string())?;

        Self::new(
            api_key,
            config.completion_model.clone(),
            config.base_url.clone(),
            config.timeout
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl ChatClient for GeminiChatClient {
    async fn complete(&self, contents: &[String]) -> Result<CompletionResponse, ProviderError> {
        let payload = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: contents
                    .iter()
                    .map(|text| GeminiPart { text: text.as_str() })
                    .collect(),
            }],
        };

        info!(
            "GeminiChatClient::complete() → model={} parts={}",
            self.model,
            contents.len()
        );

        let resp = self.http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send().await
            .map_err(classify_transport_error)?;

        let status = resp.status();
        let body = resp.text().await.map_err(classify_transport_error)?;
        debug!("Gemini replied with status {} ({} bytes)", status, body.len());

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }

        Ok(CompletionResponse { text: extract_text(&body)? })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
