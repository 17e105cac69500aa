use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MessageType {
    Prompt,
    Response,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Response => "response",
        }
    }
}

/// A structured tool invocation attached to a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub message_type: MessageType,
    pub content: String,
    pub character_count: i64,
    pub timestamp: DateTime<Utc>,
    pub tool_calls: Vec<ToolCall>,
    /// Milliseconds
    pub execution_time: Option<i64>,
}

/// Input for appending a turn to a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub message_type: MessageType,
    pub content: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub tool_calls: Vec<ToolCall>,
    pub execution_time: Option<i64>,
}

impl NewMessage {
    pub fn prompt(content: impl Into<String>) -> Self {
        Self {
            message_type: MessageType::Prompt,
            content: content.into(),
            timestamp: None,
            tool_calls: Vec::new(),
            execution_time: None,
        }
    }

    pub fn response(content: impl Into<String>) -> Self {
        Self {
            message_type: MessageType::Response,
            ..Self::prompt(content)
        }
    }

    pub fn character_count(&self) -> i64 {
        self.content.chars().count() as i64
    }
}
