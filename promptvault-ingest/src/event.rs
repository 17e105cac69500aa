//! Hook events as written to the queue, one JSON object per line

use chrono::{DateTime, Utc};
use promptvault_core::models::ToolCall;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::IngestError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookEvent {
    pub event: String,
    /// RFC3339; anything unparseable falls back to ingestion time.
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    SessionStart,
    Prompt,
    Response,
    SessionEnd,
    Unknown(String),
}

impl EventKind {
    pub fn parse(name: &str) -> Self {
        match name {
            "SessionStart" => Self::SessionStart,
            "UserPromptSubmit" => Self::Prompt,
            "PostToolUse" | "AssistantResponse" => Self::Response,
            "Stop" | "SessionEnd" => Self::SessionEnd,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl HookEvent {
    pub fn from_line(line: &str) -> Result<Self, IngestError> {
        Ok(serde_json::from_str(line)?)
    }

    pub fn kind(&self) -> EventKind {
        EventKind::parse(&self.event)
    }

    pub fn session_id(&self) -> Result<&str, IngestError> {
        self.session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(IngestError::MissingSessionId)
    }

    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    /// Non-empty string value under `key`, if any.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Required string payload. Missing and non-string values are distinct errors.
    pub fn required_str(&self, field: &'static str) -> Result<&str, IngestError> {
        match self.data.get(field) {
            None | Some(Value::Null) => Err(IngestError::MissingField {
                event: self.event.clone(),
                field,
            }),
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(IngestError::NotAString { field }),
        }
    }

    /// Tool calls are advisory; malformed entries are dropped.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        let Some(Value::Array(items)) = self.data.get("tool_calls") else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect()
    }

    pub fn execution_time(&self) -> Option<i64> {
        self.data.get("execution_time").and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_f64().map(|f| f.round() as i64))
        })
    }
}
