use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{ HistoryError, HistoryLimits, HistoryStore };
use crate::models::chat::{ Conversation, Message };

/// Process-local history. Lost on restart.
pub struct InMemoryHistoryStore {
    conversations: RwLock<HashMap<String, Conversation>>,
    limits: HistoryLimits,
}

impl InMemoryHistoryStore {
    pub fn new(limits: HistoryLimits) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            limits,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(HistoryLimits::default())
    }

    pub async fn conversation_count(&self) -> usize {
        self.conversations.read().await.len()
    }

    fn evict_least_recent(&self, conversations: &mut HashMap<String, Conversation>, keep: &str) {
        let max = self.limits.max_conversations;
        while max > 0 && conversations.len() > max {
            let oldest = conversations
                .values()
                .filter(|c| c.id != keep)
                .min_by_key(|c| c.updated_at)
                .map(|c| c.id.clone());
            match oldest {
                Some(id) => {
                    debug!("Evicting conversation '{}'", id);
                    conversations.remove(&id);
                }
                None => {
                    break;
                }
            }
        }
    }
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, HistoryError> {
        let conversations = self.conversations.read().await;
        Ok(
            conversations
                .get(conversation_id)
                .cloned()
                .unwrap_or_else(|| Conversation::empty(conversation_id))
        )
    }

    async fn append_exchange(
        &self,
        conversation_id: &str,
        user: Message,
        assistant: Message
    ) -> Result<(), HistoryError> {
        let mut conversations = self.conversations.write().await;
        let conversation = conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| Conversation::empty(conversation_id));

        conversation.messages.push(user);
        conversation.messages.push(assistant);
        conversation.updated_at = Utc::now().timestamp_micros();

        let max = self.limits.max_messages;
        if max > 0 && conversation.messages.len() > max {
            // Drop whole exchanges so the history never starts with a reply.
            let excess = conversation.messages.len() - max;
            let drop = (excess + 1) & !1;
            conversation.messages.drain(..drop.min(conversation.messages.len()));
        }

        self.evict_least_recent(&mut conversations, conversation_id);
        Ok(())
    }

    async fn message_count(&self, conversation_id: &str) -> Result<usize, HistoryError> {
        let conversations = self.conversations.read().await;
        Ok(conversations.get(conversation_id).map_or(0, |c| c.messages.len()))
    }
}
