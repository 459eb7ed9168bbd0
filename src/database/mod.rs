use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::errors::Result;
use crate::log_db_operation;

mod cards;
mod decks;
mod facts;
mod reviews;
mod tags;

/// Handle on the flashcard store. Cheap to clone: clones share the pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every in-memory connection would see its own empty database
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;
        let db = Database { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS decks (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE CHECK (length(name) > 0),
                description TEXT,
                algorithm TEXT NOT NULL,
                parameters TEXT NOT NULL DEFAULT '{}',
                state TEXT NOT NULL DEFAULT '{}'
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS facts (
                id TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                format TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Fact references are not foreign keys: deleting a fact leaves a
        // broken reference that readers report as missing.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cards (
                id TEXT PRIMARY KEY,
                deck_id TEXT NOT NULL,
                question_id TEXT NOT NULL,
                answer_id TEXT NOT NULL,
                FOREIGN KEY (deck_id) REFERENCES decks(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_cards_deck_id ON cards(deck_id);")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reviews (
                id TEXT PRIMARY KEY,
                card_id TEXT,
                result TEXT NOT NULL,
                algorithm TEXT NOT NULL,
                datetime TEXT NOT NULL,
                FOREIGN KEY (card_id) REFERENCES cards(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_reviews_card_id ON reviews(card_id);")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tags (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE CHECK (length(name) > 0)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        for (table, column, parent) in [
            ("deck_tags", "deck_id", "decks"),
            ("card_tags", "card_id", "cards"),
            ("fact_tags", "fact_id", "facts"),
        ] {
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    {column} TEXT NOT NULL,
                    tag_id TEXT NOT NULL,
                    PRIMARY KEY ({column}, tag_id),
                    FOREIGN KEY ({column}) REFERENCES {parent}(id) ON DELETE CASCADE,
                    FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
                );
                "#
            ))
            .execute(&self.pool)
            .await?;
        }

        for table in ["card_question_contexts", "card_answer_contexts"] {
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    card_id TEXT NOT NULL,
                    fact_id TEXT NOT NULL,
                    PRIMARY KEY (card_id, fact_id),
                    FOREIGN KEY (card_id) REFERENCES cards(id) ON DELETE CASCADE,
                    FOREIGN KEY (fact_id) REFERENCES facts(id) ON DELETE CASCADE
                );
                "#
            ))
            .execute(&self.pool)
            .await?;
        }

        for (table, parent) in [("related_facts", "facts"), ("related_cards", "cards")] {
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    original_id TEXT NOT NULL,
                    related_id TEXT NOT NULL,
                    relationship TEXT NOT NULL,
                    PRIMARY KEY (original_id, related_id),
                    CHECK (original_id <> related_id),
                    FOREIGN KEY (original_id) REFERENCES {parent}(id) ON DELETE CASCADE,
                    FOREIGN KEY (related_id) REFERENCES {parent}(id) ON DELETE CASCADE
                );
                "#
            ))
            .execute(&self.pool)
            .await?;
        }

        log_db_operation!(info, "migrate", "schema is up to date");
        Ok(())
    }

    /// Whether a row with this id exists in one of our own tables
    async fn exists(&self, table: &'static str, id: Uuid) -> Result<bool> {
        let row = sqlx::query(&format!("SELECT 1 FROM {} WHERE id = ?1", table))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }
}

fn parse_uuid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(&row.get::<String, _>(column))?)
}

fn parse_datetime(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(&row.get::<String, _>(column))?.with_timezone(&Utc))
}

/// Decode a JSON column, falling back to the default value when it is unreadable
fn parse_json_or_default<T>(row: &SqliteRow, column: &str, owner: Uuid) -> T
where
    T: DeserializeOwned + Default,
{
    let raw: String = row.get(column);
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            log_db_operation!(
                warn,
                column,
                id = owner,
                format!("unreadable JSON ({}), using defaults", e)
            );
            T::default()
        }
    }
}

fn pagination(offset: i64, limit: i64) -> (i64, i64) {
    (offset.max(0), limit.max(0))
}
