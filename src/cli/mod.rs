use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// API key for the Gemini API. The server refuses to start without it.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: String,

    /// Model name for chat completion (e.g., gemini-2.0-flash, gemini-1.5-pro)
    #[arg(long, env = "CHAT_MODEL", default_value = "gemini-2.0-flash")]
    pub chat_model: String,

    /// Base URL for the Gemini API (e.g., https://generativelanguage.googleapis.com/v1beta)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, the client falls back to the public endpoint
    pub chat_base_url: Option<String>,

    /// Timeout in seconds for a single provider attempt. Requests on the same
    /// conversation wait for the one in flight, including its retries.
    #[arg(long, env = "CHAT_TIMEOUT_SECS", default_value = "60")]
    pub chat_timeout_secs: u64,

    /// Retries after a transient provider failure (timeouts, 429, 5xx). 0 disables retrying.
    #[arg(long, env = "CHAT_MAX_RETRIES", default_value = "2")]
    pub chat_max_retries: u32,

    /// Delay before the first retry in milliseconds. Doubles on every further retry.
    #[arg(long, env = "CHAT_RETRY_BACKOFF_MS", default_value = "500")]
    pub chat_retry_backoff_ms: u64,

    // --- History Args ---
    /// Messages kept per conversation, oldest exchanges dropped first. 0 keeps everything.
    /// Odd caps round down to whole user/assistant exchanges, so the smallest cap is 2.
    #[arg(long, env = "HISTORY_MAX_MESSAGES", default_value = "0", value_parser = parse_message_cap)]
    pub history_max_messages: usize,

    /// Conversations kept in memory, least recently updated dropped first. 0 keeps everything.
    #[arg(long, env = "HISTORY_MAX_CONVERSATIONS", default_value = "0")]
    pub history_max_conversations: usize,

    // --- Server Args ---
    /// Host address for the HTTP server to listen on.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port for the HTTP server to listen on.
    #[arg(long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Origins allowed to call the API with credentials (comma separated).
    #[arg(
        long,
        env = "ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_values = [
            "http://localhost:5173",
            "https://renderhostingtestfrontend.onrender.com",
            "http://renderhostingtestfrontend.onrender.com",
        ]
    )]
    pub allowed_origins: Vec<String>,

    /// Optional path to the TLS certificate file (PEM format) for enabling HTTPS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling HTTPS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

fn parse_message_cap(value: &str) -> Result<usize, String> {
    let cap: usize = value.parse().map_err(|e| format!("'{}' is not a message count: {}", value, e))?;
    if cap == 1 {
        return Err("a cap of 1 cannot hold a single exchange; use 0 (unbounded) or at least 2".into());
    }
    Ok(cap)
}

impl Args {
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
