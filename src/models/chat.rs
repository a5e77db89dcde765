use serde::{ Serialize, Deserialize };

pub const USER_ROLE: &str = "user";
pub const ASSISTANT_ROLE: &str = "assistant";
pub const DEFAULT_CONVERSATION_ID: &str = "default";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self { role: role.into(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(USER_ROLE, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ASSISTANT_ROLE, content)
    }

    pub fn is_user(&self) -> bool {
        self.role == USER_ROLE
    }
}

/// Body of `POST /api/chat`. Only the last message is consulted; the server
/// keeps its own history for the conversation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl ChatRequest {
    /// Conversation this request belongs to. Requests without an id share
    /// the `default` conversation.
    pub fn conversation_id(&self) -> &str {
        match self.conversation_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => DEFAULT_CONVERSATION_ID,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub messages: Vec<Message>,
    pub updated_at: i64,
}

impl Conversation {
    pub fn empty(id: &str) -> Self {
        Self { id: id.to_string(), messages: Vec::new(), updated_at: 0 }
    }
}
