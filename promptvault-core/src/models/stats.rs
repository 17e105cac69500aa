use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub conversations: i64,
    pub messages: i64,
    pub ratings: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_size_bytes: Option<u64>,
}

/// Rows removed by a conversation delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub messages_deleted: u64,
    pub ratings_deleted: u64,
}

/// Rolling counters before and after a recount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterReconciliation {
    pub conversation_id: i64,
    pub before: (i64, i64),
    pub after: (i64, i64),
}

impl CounterReconciliation {
    pub fn drifted(&self) -> bool {
        self.before != self.after
    }
}
