//! Uniform `{success, data?, error?, meta?}` response wrapper

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use promptvault_core::{ErrorKind, VaultError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Envelope {
    pub fn data(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// A status plus an optional envelope body. `204` replies carry no body.
#[derive(Debug)]
pub struct ApiReply {
    pub status: StatusCode,
    pub body: Option<Envelope>,
}

impl ApiReply {
    pub fn ok<T: Serialize>(data: &T) -> Self {
        Self::with_status(StatusCode::OK, data)
    }

    pub fn created<T: Serialize>(data: &T) -> Self {
        Self::with_status(StatusCode::CREATED, data)
    }

    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            body: None,
        }
    }

    pub fn with_status<T: Serialize>(status: StatusCode, data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self {
                status,
                body: Some(Envelope::data(value)),
            },
            Err(e) => Self::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode response: {e}"),
            ),
        }
    }

    pub fn error(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            body: Some(Envelope::error(msg)),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::error(StatusCode::BAD_REQUEST, msg)
    }

    /// Map an engine failure onto the HTTP taxonomy. `action` describes what
    /// was attempted and prefixes unexpected failures.
    pub fn from_error(err: &VaultError, action: &str) -> Self {
        match err.kind() {
            ErrorKind::Validation => Self::bad_request(err.to_string()),
            ErrorKind::NotFound => Self::error(StatusCode::NOT_FOUND, err.to_string()),
            ErrorKind::Unavailable | ErrorKind::Internal => {
                tracing::error!(error = %err, "Failed to {}", action);
                Self::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to {action}: {err}"),
                )
            }
        }
    }

    pub fn meta(mut self, meta: Meta) -> Self {
        self.body = self.body.map(|b| b.with_meta(meta));
        self
    }
}

impl IntoResponse for ApiReply {
    fn into_response(self) -> Response {
        match self.body {
            Some(body) => (self.status, Json(body)).into_response(),
            None => self.status.into_response(),
        }
    }
}
