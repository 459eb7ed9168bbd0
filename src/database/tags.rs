use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{pagination, parse_uuid, Database};
use crate::errors::{FlashcardsError, Result};
use crate::log_db_operation;
use crate::models::*;

impl Database {
    // Tag operations
    pub async fn create_tag(&self, name: &str) -> Result<Tag> {
        if name.trim().is_empty() {
            return Err(FlashcardsError::ValidationError(
                "Tag name cannot be empty".to_string(),
            ));
        }

        let tag = Tag {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };

        sqlx::query("INSERT INTO tags (id, name) VALUES (?1, ?2)")
            .bind(tag.id.to_string())
            .bind(&tag.name)
            .execute(&self.pool)
            .await?;

        log_db_operation!(debug, "create_tag", id = tag.id);
        Ok(tag)
    }

    pub async fn get_tag(&self, id: Uuid) -> Result<Option<Tag>> {
        let row = sqlx::query("SELECT * FROM tags WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_tag(&row)).transpose()
    }

    pub async fn get_tag_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let row = sqlx::query("SELECT * FROM tags WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_tag(&row)).transpose()
    }

    pub async fn get_all_tags(&self, offset: i64, limit: i64) -> Result<Vec<Tag>> {
        let (offset, limit) = pagination(offset, limit);
        let rows = sqlx::query("SELECT * FROM tags ORDER BY rowid LIMIT ?1 OFFSET ?2")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_tag).collect()
    }

    pub async fn update_tag(&self, id: Uuid, name: &str) -> Result<Tag> {
        if name.trim().is_empty() {
            return Err(FlashcardsError::ValidationError(
                "Tag name cannot be empty".to_string(),
            ));
        }

        let result = sqlx::query("UPDATE tags SET name = ?1 WHERE id = ?2")
            .bind(name)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(FlashcardsError::not_found("Tag", id));
        }

        Ok(Tag {
            id,
            name: name.to_string(),
        })
    }

    /// Deleting a tag detaches it from every deck, card and fact
    pub async fn delete_tag(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM tags WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(FlashcardsError::not_found("Tag", id));
        }

        log_db_operation!(debug, "delete_tag", id = id);
        Ok(())
    }

    // Tag links
    pub async fn assign_tag(&self, entity: Taggable, entity_id: Uuid, tag_id: Uuid) -> Result<TagLink> {
        sqlx::query(&format!(
            "INSERT INTO {} ({}, tag_id) VALUES (?1, ?2)",
            entity.link_table(),
            entity.entity_column()
        ))
        .bind(entity_id.to_string())
        .bind(tag_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(TagLink {
            entity,
            entity_id,
            tag_id,
        })
    }

    pub async fn remove_tag(&self, entity: Taggable, entity_id: Uuid, tag_id: Uuid) -> Result<()> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE {} = ?1 AND tag_id = ?2",
            entity.link_table(),
            entity.entity_column()
        ))
        .bind(entity_id.to_string())
        .bind(tag_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(FlashcardsError::NotFound(format!(
                "Tag '{}' is not assigned to {:?} '{}'",
                tag_id, entity, entity_id
            )));
        }
        Ok(())
    }

    pub async fn get_tags_for(&self, entity: Taggable, entity_id: Uuid) -> Result<Vec<Tag>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT t.* FROM tags t
            JOIN {} link ON link.tag_id = t.id
            WHERE link.{} = ?1
            ORDER BY t.name
            "#,
            entity.link_table(),
            entity.entity_column()
        ))
        .bind(entity_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_tag).collect()
    }

    /// Ids of the entities of one kind carrying the tag
    pub async fn get_tagged(&self, entity: Taggable, tag_id: Uuid) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT link.{column} AS entity_id FROM {link} link
            JOIN {table} e ON e.id = link.{column}
            WHERE link.tag_id = ?1
            ORDER BY e.rowid
            "#,
            column = entity.entity_column(),
            link = entity.link_table(),
            table = entity.entity_table(),
        ))
        .bind(tag_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| parse_uuid(row, "entity_id")).collect()
    }
}

fn row_to_tag(row: &SqliteRow) -> Result<Tag> {
    Ok(Tag {
        id: parse_uuid(row, "id")?,
        name: row.get("name"),
    })
}
