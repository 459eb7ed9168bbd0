use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{pagination, parse_datetime, parse_json_or_default, parse_uuid, Database};
use crate::errors::{FlashcardsError, Result};
use crate::models::*;
use crate::{log_db_operation, log_scheduler_event};

impl Database {
    /// Store a review and merge `state_changes` into the owning deck's state as one unit.
    ///
    /// The changes are applied as a JSON merge patch against the stored state,
    /// so keys written by someone else since the caller last read the deck are
    /// kept. Returns the review and the state as stored after the merge. If the
    /// deck row is gone the transaction is rolled back and `NotFound` is returned.
    pub async fn record_review(
        &self,
        deck_id: Uuid,
        card_id: Uuid,
        result: Value,
        algorithm: &str,
        state_changes: &DeckState,
    ) -> Result<(Review, DeckState)> {
        let review = Review {
            id: Uuid::new_v4(),
            card_id: Some(card_id),
            result,
            algorithm: algorithm.to_string(),
            datetime: Utc::now(),
        };
        let patch = serde_json::to_string(state_changes)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO reviews (id, card_id, result, algorithm, datetime) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(review.id.to_string())
        .bind(card_id.to_string())
        .bind(serde_json::to_string(&review.result)?)
        .bind(&review.algorithm)
        .bind(review.datetime.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        let updated = sqlx::query(
            "UPDATE decks SET state = json_patch(CASE WHEN json_valid(state) THEN state ELSE '{}' END, ?1) WHERE id = ?2",
        )
        .bind(patch)
        .bind(deck_id.to_string())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            log_scheduler_event!(warn, algorithm, deck_id = deck_id, "deck vanished, review discarded");
            return Err(FlashcardsError::not_found("Deck", deck_id));
        }

        let row = sqlx::query("SELECT state FROM decks WHERE id = ?1")
            .bind(deck_id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        let state: DeckState = parse_json_or_default(&row, "state", deck_id);

        tx.commit().await?;

        log_db_operation!(debug, "record_review", card_id = card_id);
        Ok((review, state))
    }

    pub async fn get_review(&self, id: Uuid) -> Result<Option<Review>> {
        let row = sqlx::query("SELECT * FROM reviews WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_review(&row)).transpose()
    }

    pub async fn get_all_reviews(&self, offset: i64, limit: i64) -> Result<Vec<Review>> {
        let (offset, limit) = pagination(offset, limit);
        let rows = sqlx::query("SELECT * FROM reviews ORDER BY datetime, rowid LIMIT ?1 OFFSET ?2")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_review).collect()
    }

    /// Reviews of the card in the order they were recorded
    pub async fn get_reviews_for_card(&self, card_id: Uuid) -> Result<Vec<Review>> {
        let rows = sqlx::query("SELECT * FROM reviews WHERE card_id = ?1 ORDER BY datetime, rowid")
            .bind(card_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_review).collect()
    }

    pub async fn count_reviews_for_card(&self, card_id: Uuid) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM reviews WHERE card_id = ?1")
            .bind(card_id.to_string())
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("total"))
    }

    pub async fn delete_review(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(FlashcardsError::not_found("Review", id));
        }
        Ok(())
    }
}

fn row_to_review(row: &SqliteRow) -> Result<Review> {
    let card_id = row
        .get::<Option<String>, _>("card_id")
        .map(|id| Uuid::parse_str(&id))
        .transpose()?;

    Ok(Review {
        id: parse_uuid(row, "id")?,
        card_id,
        result: serde_json::from_str(&row.get::<String, _>("result"))?,
        algorithm: row.get("algorithm"),
        datetime: parse_datetime(row, "datetime")?,
    })
}
