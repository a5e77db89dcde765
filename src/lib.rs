pub mod agent;
pub mod models;
pub mod server;
pub mod config;
pub mod error;
pub mod llm;
pub mod cli;
pub mod history;

use agent::AIAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr());
    info!("Chat Model: {}", args.chat_model);
    info!("Chat Base URL: {}", args.chat_base_url.as_deref().unwrap_or("provider default"));
    info!("Gemini API Key: {}", if args.gemini_api_key.trim().is_empty() { "<missing>" } else { "<set>" });
    info!("Provider Timeout: {}s", args.chat_timeout_secs);
    info!("Provider Retries: {}", args.chat_max_retries);
    info!("History Max Messages: {}", args.history_max_messages);
    info!("History Max Conversations: {}", args.history_max_conversations);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let agent = Arc::new(AIAgent::new(args.clone()).await?);
    let addr = args.server_addr();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, agent, args);
    server.run().await?;

    Ok(())
}
