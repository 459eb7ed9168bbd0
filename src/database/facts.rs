use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{pagination, parse_uuid, Database};
use crate::errors::{FlashcardsError, Result};
use crate::log_db_operation;
use crate::models::*;

impl Database {
    // Fact operations
    pub async fn create_fact(&self, request: CreateFactRequest) -> Result<Fact> {
        let fact = Fact {
            id: Uuid::new_v4(),
            value: request.value,
            format: request.format,
        };

        sqlx::query("INSERT INTO facts (id, value, format) VALUES (?1, ?2, ?3)")
            .bind(fact.id.to_string())
            .bind(&fact.value)
            .bind(&fact.format)
            .execute(&self.pool)
            .await?;

        log_db_operation!(debug, "create_fact", id = fact.id);
        Ok(fact)
    }

    pub async fn get_fact(&self, id: Uuid) -> Result<Option<Fact>> {
        let row = sqlx::query("SELECT * FROM facts WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_fact(&row)).transpose()
    }

    pub async fn get_all_facts(&self, offset: i64, limit: i64) -> Result<Vec<Fact>> {
        let (offset, limit) = pagination(offset, limit);
        let rows = sqlx::query("SELECT * FROM facts ORDER BY rowid LIMIT ?1 OFFSET ?2")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_fact).collect()
    }

    pub async fn update_fact(&self, id: Uuid, request: UpdateFactRequest) -> Result<Fact> {
        let mut fact = self
            .get_fact(id)
            .await?
            .ok_or_else(|| FlashcardsError::not_found("Fact", id))?;

        if let Some(value) = request.value {
            fact.value = value;
        }
        if let Some(format) = request.format {
            fact.format = format;
        }

        sqlx::query("UPDATE facts SET value = ?1, format = ?2 WHERE id = ?3")
            .bind(&fact.value)
            .bind(&fact.format)
            .bind(fact.id.to_string())
            .execute(&self.pool)
            .await?;

        log_db_operation!(debug, "update_fact", id = fact.id);
        Ok(fact)
    }

    /// Cards using this fact as question or answer keep a broken reference,
    /// see [`Database::card_question`].
    pub async fn delete_fact(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM facts WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(FlashcardsError::not_found("Fact", id));
        }

        log_db_operation!(debug, "delete_fact", id = id);
        Ok(())
    }

    // Related facts
    pub async fn relate_facts(
        &self,
        original_fact_id: Uuid,
        related_fact_id: Uuid,
        relationship: &str,
    ) -> Result<FactRelation> {
        sqlx::query(
            "INSERT INTO related_facts (original_id, related_id, relationship) VALUES (?1, ?2, ?3)",
        )
        .bind(original_fact_id.to_string())
        .bind(related_fact_id.to_string())
        .bind(relationship)
        .execute(&self.pool)
        .await?;

        Ok(FactRelation {
            original_fact_id,
            related_fact_id,
            relationship: relationship.to_string(),
        })
    }

    pub async fn unrelate_facts(&self, original_fact_id: Uuid, related_fact_id: Uuid) -> Result<()> {
        let result =
            sqlx::query("DELETE FROM related_facts WHERE original_id = ?1 AND related_id = ?2")
                .bind(original_fact_id.to_string())
                .bind(related_fact_id.to_string())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(FlashcardsError::NotFound(format!(
                "No relation from fact '{}' to fact '{}'",
                original_fact_id, related_fact_id
            )));
        }
        Ok(())
    }

    /// Relations where the fact appears on either side
    pub async fn get_related_facts(&self, fact_id: Uuid) -> Result<Vec<FactRelation>> {
        let rows = sqlx::query(
            r#"
            SELECT original_id, related_id, relationship FROM related_facts
            WHERE original_id = ?1 OR related_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(fact_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(FactRelation {
                    original_fact_id: parse_uuid(row, "original_id")?,
                    related_fact_id: parse_uuid(row, "related_id")?,
                    relationship: row.get("relationship"),
                })
            })
            .collect()
    }
}

pub(super) fn row_to_fact(row: &SqliteRow) -> Result<Fact> {
    Ok(Fact {
        id: parse_uuid(row, "id")?,
        value: row.get("value"),
        format: row.get("format"),
    })
}
