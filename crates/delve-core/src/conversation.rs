use serde::{Deserialize, Serialize};

use crate::message::Message;

/// One entry of the conversation history list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub title: String,
    pub updated_at: Option<String>,
    pub message_count: Option<u64>,
}

/// A conversation with its full message log
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationDetail {
    pub conversation_id: String,
    pub title: Option<String>,
    pub messages: Vec<Message>,
}
