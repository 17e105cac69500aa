//! Message appends and the rolling conversation counters.
//!
//! `prompt_count` and `total_characters` on a conversation are hints kept in
//! step with message inserts (same transaction). They are never recomputed
//! on read; `recount_*` exists to repair drift.

use chrono::Utc;

use super::records::{MessageRecord, MESSAGE_COLUMNS};
use super::Store;
use crate::convert::encode_tool_calls;
use crate::error::{Result, VaultError};
use crate::models::{CounterReconciliation, MessageType, NewMessage};

impl Store {
    /// Insert a message and bump the owning conversation's counters.
    pub async fn append_message(
        &self,
        conversation_id: i64,
        message: NewMessage,
    ) -> Result<MessageRecord> {
        let character_count = message.character_count();
        let prompt_increment = i64::from(message.message_type == MessageType::Prompt);
        let timestamp = message.timestamp.unwrap_or_else(Utc::now);
        let tool_calls = encode_tool_calls(&message.tool_calls)?;

        let mut tx = self.pool.begin().await?;

        let bumped = sqlx::query(
            r#"
            UPDATE conversations
            SET prompt_count = prompt_count + ?1,
                total_characters = total_characters + ?2,
                updated_at = ?3
            WHERE id = ?4
            "#,
        )
        .bind(prompt_increment)
        .bind(character_count)
        .bind(Utc::now())
        .bind(conversation_id)
        .execute(&mut *tx)
        .await?;

        if bumped.rows_affected() == 0 {
            return Err(VaultError::not_found("Conversation", conversation_id));
        }

        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            r#"
            INSERT INTO messages
                (conversation_id, message_type, content, character_count, timestamp,
                 tool_calls, execution_time)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(conversation_id)
        .bind(message.message_type)
        .bind(&message.content)
        .bind(character_count)
        .bind(timestamp)
        .bind(tool_calls)
        .bind(message.execution_time)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            conversation_id,
            message_id = record.id,
            message_type = message.message_type.as_str(),
            "Appended message"
        );
        Ok(record)
    }

    pub async fn get_message(&self, id: i64) -> Result<MessageRecord> {
        sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| VaultError::not_found("Message", id))
    }

    pub async fn list_messages(&self, conversation_id: i64) -> Result<Vec<MessageRecord>> {
        Ok(self
            .get_conversation_with_messages(conversation_id)
            .await?
            .messages)
    }

    /// Recompute one conversation's counters from its message rows.
    pub async fn recount_conversation(&self, id: i64) -> Result<CounterReconciliation> {
        let mut tx = self.pool.begin().await?;

        let before: Option<(i64, i64)> = sqlx::query_as(
            "SELECT prompt_count, total_characters FROM conversations WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(before) = before else {
            return Err(VaultError::not_found("Conversation", id));
        };

        let after: (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN message_type = 'prompt' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(character_count), 0)
            FROM messages WHERE conversation_id = ?1
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if after != before {
            sqlx::query(
                "UPDATE conversations SET prompt_count = ?1, total_characters = ?2 WHERE id = ?3",
            )
            .bind(after.0)
            .bind(after.1)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let reconciliation = CounterReconciliation {
            conversation_id: id,
            before,
            after,
        };
        if reconciliation.drifted() {
            tracing::warn!(
                conversation_id = id,
                before = ?before,
                after = ?after,
                "Repaired drifted conversation counters"
            );
        }
        Ok(reconciliation)
    }

    /// Recount every conversation; returns only the ones that had drifted.
    pub async fn recount_all(&self) -> Result<Vec<CounterReconciliation>> {
        let ids: Vec<(i64,)> = sqlx::query_as("SELECT id FROM conversations ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        let mut drifted = Vec::new();
        for (id,) in ids {
            let reconciliation = self.recount_conversation(id).await?;
            if reconciliation.drifted() {
                drifted.push(reconciliation);
            }
        }
        Ok(drifted)
    }
}
