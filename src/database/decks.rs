use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{pagination, parse_json_or_default, parse_uuid, Database};
use crate::errors::{FlashcardsError, Result};
use crate::log_db_operation;
use crate::models::*;

impl Database {
    // Deck operations
    pub async fn create_deck(&self, request: CreateDeckRequest) -> Result<Deck> {
        if request.name.trim().is_empty() {
            return Err(FlashcardsError::ValidationError(
                "Deck name cannot be empty".to_string(),
            ));
        }

        let deck = Deck {
            id: Uuid::new_v4(),
            name: request.name,
            description: request.description,
            algorithm: request.algorithm,
            parameters: request.parameters,
            state: request.state,
        };

        sqlx::query(
            r#"
            INSERT INTO decks (id, name, description, algorithm, parameters, state)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(deck.id.to_string())
        .bind(&deck.name)
        .bind(&deck.description)
        .bind(&deck.algorithm)
        .bind(serde_json::to_string(&deck.parameters)?)
        .bind(serde_json::to_string(&deck.state)?)
        .execute(&self.pool)
        .await?;

        log_db_operation!(debug, "create_deck", deck_id = deck.id);
        Ok(deck)
    }

    pub async fn get_deck(&self, id: Uuid) -> Result<Option<Deck>> {
        let row = sqlx::query("SELECT * FROM decks WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_deck(&row)).transpose()
    }

    pub async fn get_deck_by_name(&self, name: &str) -> Result<Option<Deck>> {
        let row = sqlx::query("SELECT * FROM decks WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_deck(&row)).transpose()
    }

    pub async fn get_all_decks(&self, offset: i64, limit: i64) -> Result<Vec<Deck>> {
        let (offset, limit) = pagination(offset, limit);
        let rows = sqlx::query("SELECT * FROM decks ORDER BY rowid LIMIT ?1 OFFSET ?2")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let decks = rows.iter().map(row_to_deck).collect::<Result<Vec<_>>>()?;
        log_db_operation!(debug, "get_all_decks", count = decks.len());
        Ok(decks)
    }

    pub async fn update_deck(&self, id: Uuid, request: UpdateDeckRequest) -> Result<Deck> {
        let mut deck = self
            .get_deck(id)
            .await?
            .ok_or_else(|| FlashcardsError::not_found("Deck", id))?;

        if let Some(name) = request.name {
            if name.trim().is_empty() {
                return Err(FlashcardsError::ValidationError(
                    "Deck name cannot be empty".to_string(),
                ));
            }
            deck.name = name;
        }
        if let Some(description) = request.description {
            deck.description = description;
        }
        if let Some(algorithm) = request.algorithm {
            deck.algorithm = algorithm;
        }
        if let Some(parameters) = request.parameters {
            deck.parameters = parameters;
        }
        if let Some(state) = request.state {
            deck.state = state;
        }

        let result = sqlx::query(
            r#"
            UPDATE decks
            SET name = ?1, description = ?2, algorithm = ?3, parameters = ?4, state = ?5
            WHERE id = ?6
            "#,
        )
        .bind(&deck.name)
        .bind(&deck.description)
        .bind(&deck.algorithm)
        .bind(serde_json::to_string(&deck.parameters)?)
        .bind(serde_json::to_string(&deck.state)?)
        .bind(deck.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(FlashcardsError::not_found("Deck", id));
        }

        log_db_operation!(debug, "update_deck", deck_id = deck.id);
        Ok(deck)
    }

    /// Deletes the deck together with its cards, their reviews and all association rows
    pub async fn delete_deck(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM decks WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(FlashcardsError::not_found("Deck", id));
        }

        log_db_operation!(debug, "delete_deck", deck_id = id);
        Ok(())
    }
}

fn row_to_deck(row: &SqliteRow) -> Result<Deck> {
    let id = parse_uuid(row, "id")?;
    Ok(Deck {
        id,
        name: row.get("name"),
        description: row.get("description"),
        algorithm: row.get("algorithm"),
        parameters: parse_json_or_default(row, "parameters", id),
        state: parse_json_or_default(row, "state", id),
    })
}
