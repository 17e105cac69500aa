use chrono::Utc;

use super::records::{RatingRecord, RATING_COLUMNS};
use super::Store;
use crate::error::{Result, VaultError};
use crate::models::rating::validate_rating;
use crate::models::{RatingStats, RatingTarget};

impl Store {
    pub async fn create_rating(
        &self,
        target: RatingTarget,
        rating: i64,
        comment: Option<&str>,
    ) -> Result<RatingRecord> {
        validate_rating(rating)?;

        // Target check and insert share one transaction.
        let mut tx = self.pool.begin().await?;

        let (entity, id, sql) = match target {
            RatingTarget::Conversation(id) => {
                ("Conversation", id, "SELECT id FROM conversations WHERE id = ?1")
            }
            RatingTarget::Message(id) => ("Message", id, "SELECT id FROM messages WHERE id = ?1"),
        };
        let exists: Option<(i64,)> = sqlx::query_as(sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(VaultError::not_found(entity, id));
        }

        let (conversation_id, message_id) = target.columns();
        let now = Utc::now();
        let record = sqlx::query_as::<_, RatingRecord>(&format!(
            r#"
            INSERT INTO ratings (conversation_id, message_id, rating, comment, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            RETURNING {RATING_COLUMNS}
            "#
        ))
        .bind(conversation_id)
        .bind(message_id)
        .bind(rating)
        .bind(comment)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(rating_id = record.id, ?target, rating, "Created rating");
        Ok(record)
    }

    pub async fn create_conversation_rating(
        &self,
        conversation_id: i64,
        rating: i64,
        comment: Option<&str>,
    ) -> Result<RatingRecord> {
        self.create_rating(RatingTarget::Conversation(conversation_id), rating, comment)
            .await
    }

    pub async fn create_message_rating(
        &self,
        message_id: i64,
        rating: i64,
        comment: Option<&str>,
    ) -> Result<RatingRecord> {
        self.create_rating(RatingTarget::Message(message_id), rating, comment)
            .await
    }

    pub async fn get_conversation_ratings(&self, conversation_id: i64) -> Result<Vec<RatingRecord>> {
        self.get_conversation(conversation_id).await?;
        let rows = sqlx::query_as::<_, RatingRecord>(&format!(
            "SELECT {RATING_COLUMNS} FROM ratings WHERE conversation_id = ?1 \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;
        checked(rows)
    }

    pub async fn get_message_ratings(&self, message_id: i64) -> Result<Vec<RatingRecord>> {
        self.get_message(message_id).await?;
        let rows = sqlx::query_as::<_, RatingRecord>(&format!(
            "SELECT {RATING_COLUMNS} FROM ratings WHERE message_id = ?1 \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;
        checked(rows)
    }

    pub async fn get_rating(&self, id: i64) -> Result<RatingRecord> {
        let record = sqlx::query_as::<_, RatingRecord>(&format!(
            "SELECT {RATING_COLUMNS} FROM ratings WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| VaultError::not_found("Rating", id))?;
        record.target()?;
        Ok(record)
    }

    /// Replace score and comment; a `None` comment clears it.
    pub async fn update_rating(&self, id: i64, rating: i64, comment: Option<&str>) -> Result<()> {
        validate_rating(rating)?;

        let result = sqlx::query(
            "UPDATE ratings SET rating = ?1, comment = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(rating)
        .bind(comment)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(VaultError::not_found("Rating", id));
        }
        tracing::debug!(rating_id = id, rating, "Updated rating");
        Ok(())
    }

    pub async fn delete_rating(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM ratings WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(VaultError::not_found("Rating", id));
        }
        tracing::debug!(rating_id = id, "Deleted rating");
        Ok(())
    }

    /// Count, mean and per-score histogram over every rating.
    pub async fn get_rating_stats(&self) -> Result<RatingStats> {
        let (total_ratings, average, rated_conversations, rated_messages): (
            i64,
            Option<f64>,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                AVG(rating),
                COUNT(DISTINCT conversation_id),
                COUNT(DISTINCT message_id)
            FROM ratings
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let buckets: Vec<(i64, i64)> =
            sqlx::query_as("SELECT rating, COUNT(*) FROM ratings GROUP BY rating")
                .fetch_all(&self.pool)
                .await?;

        let mut stats = RatingStats {
            total_ratings,
            average_rating: average.unwrap_or(0.0),
            rated_conversations,
            rated_messages,
            ..RatingStats::default()
        };
        for (score, count) in buckets {
            stats.distribution.insert(score, count);
        }
        Ok(stats)
    }
}

fn checked(rows: Vec<RatingRecord>) -> Result<Vec<RatingRecord>> {
    for row in &rows {
        row.target()?;
    }
    Ok(rows)
}
