use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::facts::row_to_fact;
use super::{pagination, parse_uuid, Database};
use crate::errors::{FlashcardsError, Result};
use crate::log_db_operation;
use crate::models::*;

impl Database {
    // Card operations
    pub async fn create_card(&self, request: CreateCardRequest) -> Result<Card> {
        self.ensure_card_references(request.deck_id, request.question_id, request.answer_id)
            .await?;

        let card = Card {
            id: Uuid::new_v4(),
            deck_id: request.deck_id,
            question_id: request.question_id,
            answer_id: request.answer_id,
        };

        sqlx::query(
            "INSERT INTO cards (id, deck_id, question_id, answer_id) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(card.id.to_string())
        .bind(card.deck_id.to_string())
        .bind(card.question_id.to_string())
        .bind(card.answer_id.to_string())
        .execute(&self.pool)
        .await?;

        log_db_operation!(debug, "create_card", card_id = card.id);
        Ok(card)
    }

    pub async fn get_card(&self, id: Uuid) -> Result<Option<Card>> {
        let row = sqlx::query("SELECT * FROM cards WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_card(&row)).transpose()
    }

    pub async fn get_all_cards(&self, offset: i64, limit: i64) -> Result<Vec<Card>> {
        let (offset, limit) = pagination(offset, limit);
        let rows = sqlx::query("SELECT * FROM cards ORDER BY rowid LIMIT ?1 OFFSET ?2")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_card).collect()
    }

    pub async fn update_card(&self, id: Uuid, request: UpdateCardRequest) -> Result<Card> {
        let mut card = self
            .get_card(id)
            .await?
            .ok_or_else(|| FlashcardsError::not_found("Card", id))?;

        if let Some(deck_id) = request.deck_id {
            card.deck_id = deck_id;
        }
        if let Some(question_id) = request.question_id {
            card.question_id = question_id;
        }
        if let Some(answer_id) = request.answer_id {
            card.answer_id = answer_id;
        }

        self.ensure_card_references(card.deck_id, card.question_id, card.answer_id)
            .await?;

        sqlx::query("UPDATE cards SET deck_id = ?1, question_id = ?2, answer_id = ?3 WHERE id = ?4")
            .bind(card.deck_id.to_string())
            .bind(card.question_id.to_string())
            .bind(card.answer_id.to_string())
            .bind(card.id.to_string())
            .execute(&self.pool)
            .await?;

        log_db_operation!(debug, "update_card", card_id = card.id);
        Ok(card)
    }

    /// Deletes the card together with its reviews and association rows
    pub async fn delete_card(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM cards WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(FlashcardsError::not_found("Card", id));
        }

        log_db_operation!(debug, "delete_card", card_id = id);
        Ok(())
    }

    async fn ensure_card_references(
        &self,
        deck_id: Uuid,
        question_id: Uuid,
        answer_id: Uuid,
    ) -> Result<()> {
        if !self.exists("decks", deck_id).await? {
            return Err(FlashcardsError::ValidationError(format!(
                "Deck '{}' does not exist",
                deck_id
            )));
        }
        for (role, fact_id) in [("Question", question_id), ("Answer", answer_id)] {
            if !self.exists("facts", fact_id).await? {
                return Err(FlashcardsError::ValidationError(format!(
                    "{} fact '{}' does not exist",
                    role, fact_id
                )));
            }
        }
        Ok(())
    }

    // Deck traversal
    pub async fn get_cards_for_deck(&self, deck_id: Uuid) -> Result<Vec<Card>> {
        let rows = sqlx::query("SELECT * FROM cards WHERE deck_id = ?1 ORDER BY rowid")
            .bind(deck_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        let cards = rows.iter().map(row_to_card).collect::<Result<Vec<_>>>()?;
        log_db_operation!(debug, "get_cards_for_deck", count = cards.len());
        Ok(cards)
    }

    /// Cards of the deck that have no reviews at all
    pub async fn get_unseen_cards_for_deck(&self, deck_id: Uuid) -> Result<Vec<Card>> {
        let rows = sqlx::query(
            r#"
            SELECT c.* FROM cards c
            WHERE c.deck_id = ?1
              AND NOT EXISTS (SELECT 1 FROM reviews r WHERE r.card_id = c.id)
            ORDER BY c.rowid
            "#,
        )
        .bind(deck_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let cards = rows.iter().map(row_to_card).collect::<Result<Vec<_>>>()?;
        log_db_operation!(debug, "get_unseen_cards_for_deck", count = cards.len());
        Ok(cards)
    }

    pub async fn count_cards_for_deck(&self, deck_id: Uuid) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM cards WHERE deck_id = ?1")
            .bind(deck_id.to_string())
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("total"))
    }

    pub async fn count_unseen_cards(&self, deck_id: Uuid) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total FROM cards c
            WHERE c.deck_id = ?1
              AND NOT EXISTS (SELECT 1 FROM reviews r WHERE r.card_id = c.id)
            "#,
        )
        .bind(deck_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("total"))
    }

    // Card traversal; `None` marks a broken reference
    pub async fn card_deck(&self, card: &Card) -> Result<Option<Deck>> {
        self.get_deck(card.deck_id).await
    }

    pub async fn card_question(&self, card: &Card) -> Result<Option<Fact>> {
        self.get_fact(card.question_id).await
    }

    pub async fn card_answer(&self, card: &Card) -> Result<Option<Fact>> {
        self.get_fact(card.answer_id).await
    }

    // Context facts
    pub async fn assign_context(
        &self,
        card_id: Uuid,
        fact_id: Uuid,
        side: ContextSide,
    ) -> Result<CardContext> {
        sqlx::query(&format!(
            "INSERT INTO {} (card_id, fact_id) VALUES (?1, ?2)",
            side.link_table()
        ))
        .bind(card_id.to_string())
        .bind(fact_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(CardContext {
            card_id,
            fact_id,
            side,
        })
    }

    pub async fn remove_context(&self, card_id: Uuid, fact_id: Uuid, side: ContextSide) -> Result<()> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE card_id = ?1 AND fact_id = ?2",
            side.link_table()
        ))
        .bind(card_id.to_string())
        .bind(fact_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(FlashcardsError::NotFound(format!(
                "Fact '{}' is not a {:?} context of card '{}'",
                fact_id, side, card_id
            )));
        }
        Ok(())
    }

    pub async fn get_card_context_facts(&self, card_id: Uuid, side: ContextSide) -> Result<Vec<Fact>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT f.* FROM facts f
            JOIN {} ctx ON ctx.fact_id = f.id
            WHERE ctx.card_id = ?1
            ORDER BY ctx.rowid
            "#,
            side.link_table()
        ))
        .bind(card_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_fact).collect()
    }

    // Related cards
    pub async fn relate_cards(
        &self,
        original_card_id: Uuid,
        related_card_id: Uuid,
        relationship: &str,
    ) -> Result<CardRelation> {
        sqlx::query(
            "INSERT INTO related_cards (original_id, related_id, relationship) VALUES (?1, ?2, ?3)",
        )
        .bind(original_card_id.to_string())
        .bind(related_card_id.to_string())
        .bind(relationship)
        .execute(&self.pool)
        .await?;

        Ok(CardRelation {
            original_card_id,
            related_card_id,
            relationship: relationship.to_string(),
        })
    }

    pub async fn unrelate_cards(&self, original_card_id: Uuid, related_card_id: Uuid) -> Result<()> {
        let result =
            sqlx::query("DELETE FROM related_cards WHERE original_id = ?1 AND related_id = ?2")
                .bind(original_card_id.to_string())
                .bind(related_card_id.to_string())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(FlashcardsError::NotFound(format!(
                "No relation from card '{}' to card '{}'",
                original_card_id, related_card_id
            )));
        }
        Ok(())
    }

    pub async fn get_related_cards(&self, card_id: Uuid) -> Result<Vec<CardRelation>> {
        let rows = sqlx::query(
            r#"
            SELECT original_id, related_id, relationship FROM related_cards
            WHERE original_id = ?1 OR related_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(card_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(CardRelation {
                    original_card_id: parse_uuid(row, "original_id")?,
                    related_card_id: parse_uuid(row, "related_id")?,
                    relationship: row.get("relationship"),
                })
            })
            .collect()
    }
}

pub(super) fn row_to_card(row: &SqliteRow) -> Result<Card> {
    Ok(Card {
        id: parse_uuid(row, "id")?,
        deck_id: parse_uuid(row, "deck_id")?,
        question_id: parse_uuid(row, "question_id")?,
        answer_id: parse_uuid(row, "answer_id")?,
    })
}
