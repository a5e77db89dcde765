mod memory;

use async_trait::async_trait;
use log::info;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;
use crate::cli::Args;
use crate::models::chat::{ Conversation, Message };

pub use memory::InMemoryHistoryStore;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, HistoryError>;

    /// Records a user turn and the assistant reply to it as one unit.
    async fn append_exchange(
        &self,
        conversation_id: &str,
        user: Message,
        assistant: Message
    ) -> Result<(), HistoryError>;

    async fn message_count(&self, conversation_id: &str) -> Result<usize, HistoryError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryLimits {
    /// Per-conversation message cap. 0 means unbounded. Whole exchanges are
    /// dropped, so an odd cap rounds down and a cap of 1 keeps nothing.
    pub max_messages: usize,
    /// Number of conversations kept. 0 means unbounded.
    pub max_conversations: usize,
}

impl HistoryLimits {
    pub fn from_args(args: &Args) -> Self {
        Self {
            max_messages: args.history_max_messages,
            max_conversations: args.history_max_conversations,
        }
    }
}

pub fn initialize_history_store(args: &Args) -> Arc<dyn HistoryStore> {
    let limits = HistoryLimits::from_args(args);
    info!(
        "Chat history kept in memory (max messages per conversation: {}, max conversations: {})",
        describe_limit(limits.max_messages),
        describe_limit(limits.max_conversations)
    );
    Arc::new(InMemoryHistoryStore::new(limits))
}

fn describe_limit(limit: usize) -> String {
    if limit == 0 { "unbounded".to_string() } else { limit.to_string() }
}

/// Renders the conversation as a bracketed list of `role: "content"` entries.
/// Content is JSON-quoted so a message cannot pass itself off as another turn.
pub fn format_history_for_prompt(conversation: &Conversation) -> String {
    let entries = conversation.messages
        .iter()
        .map(|msg| format!("{}: {}", msg.role, JsonValue::String(msg.content.clone())))
        .collect::<Vec<_>>()
        .join(", ");

    format!("[{}]", entries)
}
