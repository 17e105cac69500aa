use promptvault_core::VaultError;
use thiserror::Error;

/// Why a single queued line was rejected.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Invalid hook event: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("session_id is required")]
    MissingSessionId,

    #[error("{event} event has no {field} data")]
    MissingField {
        event: String,
        field: &'static str,
    },

    #[error("{field} data must be a string")]
    NotAString { field: &'static str },

    #[error(transparent)]
    Store(#[from] VaultError),
}
