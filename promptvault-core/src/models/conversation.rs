use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::Message;

/// A recorded assistant session. `messages` is only populated when the
/// conversation is read as an aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub session_id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub prompt_count: i64,
    pub total_characters: i64,
    pub working_directory: Option<String>,
    pub transcript_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub session_id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub prompt_count: i64,
    pub total_characters: i64,
    pub working_directory: Option<String>,
    pub transcript_path: Option<String>,
}

impl Conversation {
    pub fn to_summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id,
            session_id: self.session_id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            prompt_count: self.prompt_count,
            total_characters: self.total_characters,
            working_directory: self.working_directory.clone(),
            transcript_path: self.transcript_path.clone(),
        }
    }
}
