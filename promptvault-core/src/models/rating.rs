use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, VaultError};

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// What a rating is attached to. Exactly one target per rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingTarget {
    Conversation(i64),
    Message(i64),
}

impl RatingTarget {
    /// Rebuild from the nullable `(conversation_id, message_id)` column pair.
    /// Both or neither set is an integrity violation.
    pub fn from_columns(conversation_id: Option<i64>, message_id: Option<i64>) -> Result<Self> {
        match (conversation_id, message_id) {
            (Some(id), None) => Ok(Self::Conversation(id)),
            (None, Some(id)) => Ok(Self::Message(id)),
            (Some(_), Some(_)) => Err(VaultError::validation(
                "rating must target either a conversation or a message, not both",
            )),
            (None, None) => Err(VaultError::validation(
                "rating must target a conversation or a message",
            )),
        }
    }

    pub fn columns(&self) -> (Option<i64>, Option<i64>) {
        match *self {
            Self::Conversation(id) => (Some(id), None),
            Self::Message(id) => (None, Some(id)),
        }
    }
}

pub fn validate_rating(value: i64) -> Result<()> {
    if (MIN_RATING..=MAX_RATING).contains(&value) {
        Ok(())
    } else {
        Err(VaultError::validation(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}"
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub id: i64,
    pub conversation_id: Option<i64>,
    pub message_id: Option<i64>,
    pub rating: i64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingStats {
    pub total_ratings: i64,
    pub average_rating: f64,
    /// Count per score; every score from 1 to 5 is always present.
    pub distribution: BTreeMap<i64, i64>,
    pub rated_conversations: i64,
    pub rated_messages: i64,
}

impl Default for RatingStats {
    fn default() -> Self {
        Self {
            total_ratings: 0,
            average_rating: 0.0,
            distribution: (MIN_RATING..=MAX_RATING).map(|r| (r, 0)).collect(),
            rated_conversations: 0,
            rated_messages: 0,
        }
    }
}
