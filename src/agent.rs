use crate::history::{ initialize_history_store, HistoryStore };
use crate::cli::Args;
use crate::config::prompt::build_chat_contents;
use crate::error::ChatError;
use crate::llm::LlmConfig;
use crate::llm::chat::{ complete_with_retry, new_client as new_chat_client, ChatClient, RetryPolicy };
use crate::models::chat::{ ChatRequest, ChatResponse, Message };

use log::{ info, error };
use std::collections::HashMap;
use std::error::Error;
use std::sync::{ Arc, Mutex as StdMutex, PoisonError, Weak };
use tokio::sync::Mutex;
use uuid::Uuid;

type ConversationLock = Arc<Mutex<()>>;

/// Answers chat requests: validates the request, builds the prompt from the
/// conversation history, calls the provider and records the exchange.
///
/// A conversation handles one turn at a time. The turn lock is held across the
/// provider call and its retries, so a queued request on the same conversation
/// (every client of `default` when none is named) can wait several provider
/// timeouts plus backoff before its own call starts.
pub struct AIAgent {
    chat_client: Arc<dyn ChatClient>,
    history_store: Arc<dyn HistoryStore>,
    retry_policy: RetryPolicy,
    conversation_locks: StdMutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl AIAgent {
    pub async fn new(args: Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let chat_config = LlmConfig::from_args(&args);
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Model={}, BaseURL={:?}, Timeout={:?}",
            chat_client.get_model(),
            chat_client.get_base_url(),
            chat_config.timeout
        );

        let retry_policy = RetryPolicy::from_args(&args);
        info!(
            "Provider retries: max={}, initial backoff={:?}",
            retry_policy.max_retries,
            retry_policy.initial_backoff
        );

        let history_store = initialize_history_store(&args);

        Ok(Self::with_clients(chat_client, history_store, retry_policy))
    }

    pub fn with_clients(
        chat_client: Arc<dyn ChatClient>,
        history_store: Arc<dyn HistoryStore>,
        retry_policy: RetryPolicy
    ) -> Self {
        Self {
            chat_client,
            history_store,
            retry_policy,
            conversation_locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn history_store(&self) -> Arc<dyn HistoryStore> {
        Arc::clone(&self.history_store)
    }

    /// Lock serializing the read-generate-append cycle of one conversation.
    fn conversation_lock(&self, conversation_id: &str) -> ConversationLock {
        let mut locks = self.conversation_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| lock.strong_count() > 0);

        if let Some(lock) = locks.get(conversation_id).and_then(Weak::upgrade) {
            return lock;
        }
        let lock = Arc::new(Mutex::new(()));
        locks.insert(conversation_id.to_string(), Arc::downgrade(&lock));
        lock
    }

    pub async fn process_chat(&self, request: ChatRequest) -> Result<ChatResponse, ChatError> {
        let request_id = Uuid::new_v4();
        self.execute_chat(&request, request_id).await.map_err(|e| {
            error!("[{}] Error in chat endpoint: {}", request_id, e);
            e
        })
    }

    async fn execute_chat(
        &self,
        request: &ChatRequest,
        request_id: Uuid
    ) -> Result<ChatResponse, ChatError> {
        let last_message = request.messages
            .last()
            .ok_or_else(|| ChatError::Validation("Messages must not be empty".into()))?;
        if !last_message.is_user() {
            return Err(ChatError::Validation("Last message must be from user".into()));
        }

        let conversation_id = request.conversation_id();
        info!(
            "[{}] Chat request for conversation '{}' ({} chars)",
            request_id,
            conversation_id,
            last_message.content.len()
        );

        let _turn = self.conversation_lock(conversation_id).lock_owned().await;

        let history = self.history_store.get_conversation(conversation_id).await?;
        let contents = build_chat_contents(&history, &last_message.content);
        let completion = complete_with_retry(
            self.chat_client.as_ref(),
            &contents,
            &self.retry_policy
        ).await?;

        let text = completion.text.filter(|t| !t.is_empty()).ok_or(ChatError::Generation)?;

        self.history_store.append_exchange(
            conversation_id,
            last_message.clone(),
            Message::assistant(text.clone())
        ).await?;

        info!("[{}] Replied with {} chars", request_id, text.len());
        Ok(ChatResponse { response: text })
    }
}
