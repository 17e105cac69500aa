//! Storage record -> API model mapping
//!
//! Everything here is total. The one fallible step, decoding the stored
//! tool-call blob, degrades to an empty list instead of failing the read.

use crate::error::{Result, VaultError};
use crate::models::{Conversation, ConversationSummary, Message, Rating, ToolCall};
use crate::store::{ConversationRecord, ConversationWithMessages, MessageRecord, RatingRecord};

pub fn conversation(record: &ConversationRecord) -> Conversation {
    Conversation {
        id: record.id,
        session_id: record.session_id.clone(),
        title: record.title.clone(),
        created_at: record.created_at,
        updated_at: record.updated_at,
        prompt_count: record.prompt_count,
        total_characters: record.total_characters,
        working_directory: record.working_directory.clone(),
        transcript_path: record.transcript_path.clone(),
        messages: None,
    }
}

pub fn conversation_with_messages(record: &ConversationWithMessages) -> Conversation {
    Conversation {
        messages: Some(record.messages.iter().map(message).collect()),
        ..conversation(&record.conversation)
    }
}

pub fn summaries(records: &[ConversationRecord]) -> Vec<ConversationSummary> {
    records.iter().map(|r| conversation(r).to_summary()).collect()
}

pub fn message(record: &MessageRecord) -> Message {
    Message {
        id: record.id,
        conversation_id: record.conversation_id,
        message_type: record.message_type,
        content: record.content.clone(),
        character_count: record.character_count,
        timestamp: record.timestamp,
        tool_calls: decode_tool_calls(record.tool_calls.as_deref()),
        execution_time: record.execution_time,
    }
}

pub fn rating(record: &RatingRecord) -> Rating {
    Rating {
        id: record.id,
        conversation_id: record.conversation_id,
        message_id: record.message_id,
        rating: record.rating,
        comment: record.comment.clone(),
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

pub fn ratings(records: &[RatingRecord]) -> Vec<Rating> {
    records.iter().map(rating).collect()
}

/// `None` for an empty list so the column stays NULL.
pub fn encode_tool_calls(calls: &[ToolCall]) -> Result<Option<String>> {
    if calls.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(calls)
        .map(Some)
        .map_err(|e| VaultError::Internal(format!("failed to encode tool calls: {e}")))
}

pub fn decode_tool_calls(blob: Option<&str>) -> Vec<ToolCall> {
    let Some(blob) = blob.filter(|b| !b.trim().is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str(blob) {
        Ok(calls) => calls,
        Err(e) => {
            tracing::debug!(error = %e, "Discarding undecodable tool_calls blob");
            Vec::new()
        }
    }
}
