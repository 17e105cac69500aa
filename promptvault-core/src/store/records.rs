//! Row shapes as stored. Nullable columns stay `Option`, tool calls stay
//! an encoded blob; `crate::convert` turns these into API models.

use chrono::{DateTime, Utc};

use crate::error::{Result, VaultError};
use crate::models::{MessageType, RatingTarget};

pub(crate) const CONVERSATION_COLUMNS: &str = "id, session_id, title, created_at, updated_at, \
     prompt_count, total_characters, working_directory, transcript_path";

pub(crate) const MESSAGE_COLUMNS: &str = "id, conversation_id, message_type, content, \
     character_count, timestamp, tool_calls, execution_time";

pub(crate) const RATING_COLUMNS: &str =
    "id, conversation_id, message_id, rating, comment, created_at, updated_at";

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ConversationRecord {
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

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct MessageRecord {
    pub id: i64,
    pub conversation_id: i64,
    pub message_type: MessageType,
    pub content: String,
    pub character_count: i64,
    pub timestamp: DateTime<Utc>,
    pub tool_calls: Option<String>,
    pub execution_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationWithMessages {
    pub conversation: ConversationRecord,
    pub messages: Vec<MessageRecord>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RatingRecord {
    pub id: i64,
    pub conversation_id: Option<i64>,
    pub message_id: Option<i64>,
    pub rating: i64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RatingRecord {
    /// The row's target. A row with both or neither column set is corrupt.
    pub fn target(&self) -> Result<RatingTarget> {
        RatingTarget::from_columns(self.conversation_id, self.message_id)
            .map_err(|e| VaultError::Internal(format!("rating {}: {e}", self.id)))
    }
}
