use crate::history::format_history_for_prompt;
use crate::models::chat::Conversation;

pub const SYSTEM_INSTRUCTION: &str =
    "You are a friendly assistant, given the message history and user message, your task is to reply the user message";

/// Prompt fragments sent to the provider, in order: instruction, history, current message.
pub fn build_chat_contents(history: &Conversation, user_message: &str) -> Vec<String> {
    vec![
        SYSTEM_INSTRUCTION.to_string(),
        format!("message_history: {}", format_history_for_prompt(history)),
        format!("user_message: {}", user_message)
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Message;

    #[test]
    fn first_turn_has_empty_history() {
        let contents = build_chat_contents(&Conversation::empty("default"), "hi");
        assert_eq!(
            contents,
            vec![
                SYSTEM_INSTRUCTION.to_string(),
                "message_history: []".to_string(),
                "user_message: hi".to_string()
            ]
        );
    }

    #[test]
    fn later_turns_carry_previous_exchanges() {
        let history = Conversation {
            id: "default".into(),
            messages: vec![Message::user("hi"), Message::assistant("hello")],
            updated_at: 1,
        };
        let contents = build_chat_contents(&history, "how are you?");
        assert_eq!(contents[1], r#"message_history: [user: "hi", assistant: "hello"]"#);
        assert_eq!(contents[2], "user_message: how are you?");
    }
}
