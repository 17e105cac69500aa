use chrono::Utc;

use super::records::{
    ConversationRecord, ConversationWithMessages, MessageRecord, CONVERSATION_COLUMNS,
    MESSAGE_COLUMNS,
};
use super::Store;
use crate::error::{Result, VaultError};
use crate::models::CascadeReport;

impl Store {
    pub async fn create_conversation(
        &self,
        session_id: &str,
        title: Option<&str>,
        working_directory: Option<&str>,
        transcript_path: Option<&str>,
    ) -> Result<ConversationRecord> {
        if session_id.trim().is_empty() {
            return Err(VaultError::validation("session_id is required"));
        }

        let now = Utc::now();
        let record = sqlx::query_as::<_, ConversationRecord>(&format!(
            r#"
            INSERT INTO conversations
                (session_id, title, created_at, updated_at, prompt_count, total_characters,
                 working_directory, transcript_path)
            VALUES (?1, ?2, ?3, ?3, 0, 0, ?4, ?5)
            RETURNING {CONVERSATION_COLUMNS}
            "#
        ))
        .bind(session_id)
        .bind(title)
        .bind(now)
        .bind(working_directory)
        .bind(transcript_path)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(conversation_id = record.id, session_id, "Created conversation");
        Ok(record)
    }

    pub async fn get_conversation(&self, id: i64) -> Result<ConversationRecord> {
        sqlx::query_as::<_, ConversationRecord>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| VaultError::not_found("Conversation", id))
    }

    /// The conversation plus its messages in timestamp order.
    pub async fn get_conversation_with_messages(&self, id: i64) -> Result<ConversationWithMessages> {
        let conversation = self.get_conversation(id).await?;
        let messages = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ?1 \
             ORDER BY timestamp ASC, id ASC"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ConversationWithMessages {
            conversation,
            messages,
        })
    }

    /// Most recently updated first; ties broken by newest id.
    pub async fn list_conversations(&self, limit: i64, offset: i64) -> Result<Vec<ConversationRecord>> {
        if limit < 0 || offset < 0 {
            return Err(VaultError::validation("limit and offset must be non-negative"));
        }

        let rows = sqlx::query_as::<_, ConversationRecord>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations \
             ORDER BY updated_at DESC, id DESC LIMIT ?1 OFFSET ?2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn count_conversations(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversations")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Latest conversation opened for an external session token.
    pub async fn find_latest_conversation_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<ConversationRecord>> {
        let record = sqlx::query_as::<_, ConversationRecord>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE session_id = ?1 \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn update_conversation_title(&self, id: i64, title: &str) -> Result<()> {
        if title.trim().is_empty() {
            return Err(VaultError::validation("title is required"));
        }

        let result = sqlx::query("UPDATE conversations SET title = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(title)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(VaultError::not_found("Conversation", id));
        }
        tracing::debug!(conversation_id = id, "Updated conversation title");
        Ok(())
    }

    /// Delete a conversation and everything that hangs off it.
    ///
    /// Ownership graph, walked leaves first in one transaction:
    /// ratings on its messages, ratings on the conversation, messages,
    /// then the conversation row itself.
    pub async fn delete_conversation(&self, id: i64) -> Result<CascadeReport> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM conversations WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(VaultError::not_found("Conversation", id));
        }

        let message_ratings = sqlx::query(
            "DELETE FROM ratings WHERE message_id IN \
             (SELECT id FROM messages WHERE conversation_id = ?1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let conversation_ratings = sqlx::query("DELETE FROM ratings WHERE conversation_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let messages_deleted = sqlx::query("DELETE FROM messages WHERE conversation_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM conversations WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let report = CascadeReport {
            messages_deleted,
            ratings_deleted: message_ratings + conversation_ratings,
        };
        tracing::debug!(
            conversation_id = id,
            messages = report.messages_deleted,
            ratings = report.ratings_deleted,
            "Deleted conversation"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::error::ErrorKind;
    use crate::models::{NewMessage, RatingTarget};
    use crate::store::test_support::store;

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let store = store().await;
        let created = store
            .create_conversation("sess-1", Some("Refactor"), Some("/work"), Some("/t.md"))
            .await
            .unwrap();

        let fetched = store.get_conversation(created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.session_id, "sess-1");
        assert_eq!(fetched.title.as_deref(), Some("Refactor"));
        assert_eq!(fetched.working_directory.as_deref(), Some("/work"));
        assert_eq!(fetched.transcript_path.as_deref(), Some("/t.md"));
        assert_eq!(fetched.prompt_count, 0);
        assert_eq!(fetched.total_characters, 0);
    }

    #[tokio::test]
    async fn test_create_requires_session_id() {
        let store = store().await;
        let err = store.create_conversation("", None, None, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_ids_are_monotonic_and_sessions_not_unique() {
        let store = store().await;
        let a = store.create_conversation("same", None, None, None).await.unwrap();
        let b = store.create_conversation("same", None, None, None).await.unwrap();
        assert!(b.id > a.id);

        let latest = store.find_latest_conversation_by_session("same").await.unwrap();
        assert_eq!(latest.unwrap().id, b.id);
        assert!(store
            .find_latest_conversation_by_session("other")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = store().await;
        assert_eq!(store.get_conversation(42).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            store.get_conversation_with_messages(42).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_pages_do_not_overlap() {
        let store = store().await;
        let mut all = BTreeSet::new();
        for i in 0..5 {
            let c = store
                .create_conversation(&format!("s{i}"), None, None, None)
                .await
                .unwrap();
            all.insert(c.id);
        }

        let first = store.list_conversations(2, 0).await.unwrap();
        let second = store.list_conversations(2, 2).await.unwrap();
        let third = store.list_conversations(2, 4).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(third.len(), 1);

        let first_ids: BTreeSet<i64> = first.iter().map(|c| c.id).collect();
        let second_ids: BTreeSet<i64> = second.iter().map(|c| c.id).collect();
        assert!(first_ids.is_disjoint(&second_ids));

        let union: BTreeSet<i64> = first_ids
            .into_iter()
            .chain(second_ids)
            .chain(third.iter().map(|c| c.id))
            .collect();
        assert_eq!(union, all);
        assert_eq!(store.count_conversations().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_list_orders_by_recent_update() {
        let store = store().await;
        let older = store.create_conversation("a", None, None, None).await.unwrap();
        let newer = store.create_conversation("b", None, None, None).await.unwrap();

        let listed = store.list_conversations(10, 0).await.unwrap();
        assert_eq!(listed[0].id, newer.id);

        store.update_conversation_title(older.id, "bumped").await.unwrap();
        let listed = store.list_conversations(10, 0).await.unwrap();
        assert_eq!(listed[0].id, older.id);
    }

    #[tokio::test]
    async fn test_update_title_contract() {
        let store = store().await;
        let c = store.create_conversation("s", None, None, None).await.unwrap();

        store.update_conversation_title(c.id, "New title").await.unwrap();
        let updated = store.get_conversation(c.id).await.unwrap();
        assert_eq!(updated.title.as_deref(), Some("New title"));
        assert!(updated.updated_at >= c.updated_at);

        assert_eq!(
            store.update_conversation_title(c.id, "").await.unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            store.update_conversation_title(999, "x").await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_delete_cascades_messages_and_ratings() {
        let store = store().await;
        let keep = store.create_conversation("keep", None, None, None).await.unwrap();
        let doomed = store.create_conversation("doomed", None, None, None).await.unwrap();

        let m1 = store
            .append_message(doomed.id, NewMessage::prompt("hello"))
            .await
            .unwrap();
        store
            .append_message(doomed.id, NewMessage::response("hi there"))
            .await
            .unwrap();
        store
            .append_message(doomed.id, NewMessage::prompt("bye"))
            .await
            .unwrap();
        store
            .append_message(keep.id, NewMessage::prompt("stay"))
            .await
            .unwrap();

        store
            .create_rating(RatingTarget::Conversation(doomed.id), 4, None)
            .await
            .unwrap();
        store
            .create_rating(RatingTarget::Message(m1.id), 2, Some("meh"))
            .await
            .unwrap();
        store
            .create_rating(RatingTarget::Conversation(keep.id), 5, None)
            .await
            .unwrap();

        let report = store.delete_conversation(doomed.id).await.unwrap();
        assert_eq!(report.messages_deleted, 3);
        assert_eq!(report.ratings_deleted, 2);

        assert_eq!(
            store.get_conversation(doomed.id).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.conversations, 1);
        assert_eq!(stats.messages, 1);
        assert_eq!(stats.ratings, 1);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = store().await;
        assert_eq!(
            store.delete_conversation(7).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        // The aborted transaction must not wedge the single connection.
        store.health().await.unwrap();
    }
}
