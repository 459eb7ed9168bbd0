use tracing::{error, info, warn};
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, FlashcardsError>;

/// Centralized error types shared by the store, the schedulers and study sessions
#[derive(Debug, thiserror::Error)]
pub enum FlashcardsError {
    #[error("Cannot study from an empty deck ({0})")]
    EmptyDeck(Uuid),

    #[error("Card {card_id} belongs to deck {card_deck_id}, not to deck {deck_id}")]
    CardNotInDeck {
        card_id: Uuid,
        card_deck_id: Uuid,
        deck_id: Uuid,
    },

    #[error("No schedulers found for algorithm '{algorithm}' (available schedulers: {available:?})")]
    UnknownAlgorithm {
        algorithm: String,
        available: Vec<String>,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal consistency error: {0}")]
    InternalConsistency(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] anyhow::Error),
}

/// Error context for structured logging
#[derive(Debug)]
pub struct ErrorContext {
    pub operation: String,
    pub resource_id: Option<String>,
    pub resource_type: String,
}

impl ErrorContext {
    pub fn new(operation: &str, resource_type: &str) -> Self {
        Self {
            operation: operation.to_string(),
            resource_id: None,
            resource_type: resource_type.to_string(),
        }
    }

    pub fn with_id(mut self, id: impl std::fmt::Display) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }
}

impl FlashcardsError {
    /// Log the error at the level matching its kind and hand it back for propagation
    pub fn log_with_context(self, context: ErrorContext) -> Self {
        match &self {
            FlashcardsError::NotFound(_) | FlashcardsError::EmptyDeck(_) => {
                info!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Resource not available"
                );
            }
            FlashcardsError::ValidationError(_)
            | FlashcardsError::CardNotInDeck { .. }
            | FlashcardsError::UnknownAlgorithm { .. } => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Rejected request"
                );
            }
            FlashcardsError::InternalConsistency(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Internal consistency error"
                );
            }
            FlashcardsError::DatabaseError(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Database error"
                );
            }
        }
        self
    }

    pub fn not_found(resource_type: &str, id: impl std::fmt::Display) -> Self {
        FlashcardsError::NotFound(format!("{} with id '{}' not found", resource_type, id))
    }
}

impl From<sqlx::Error> for FlashcardsError {
    fn from(err: sqlx::Error) -> Self {
        classify_database_error(err)
    }
}

impl From<uuid::Error> for FlashcardsError {
    fn from(err: uuid::Error) -> Self {
        FlashcardsError::DatabaseError(anyhow::Error::from(err))
    }
}

impl From<chrono::ParseError> for FlashcardsError {
    fn from(err: chrono::ParseError) -> Self {
        FlashcardsError::DatabaseError(anyhow::Error::from(err))
    }
}

impl From<serde_json::Error> for FlashcardsError {
    fn from(err: serde_json::Error) -> Self {
        FlashcardsError::DatabaseError(anyhow::Error::from(err))
    }
}

/// Map constraint violations reported by SQLite onto caller-facing errors
pub fn classify_database_error(err: sqlx::Error) -> FlashcardsError {
    match err {
        sqlx::Error::RowNotFound => FlashcardsError::NotFound("No rows returned".to_string()),
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_string();
            let lowered = message.to_lowercase();

            if lowered.contains("unique constraint") || lowered.contains("already exists") {
                FlashcardsError::ValidationError(format!("Duplicate value: {}", message))
            } else if lowered.contains("not null constraint") {
                FlashcardsError::ValidationError(format!("Required field is missing: {}", message))
            } else if lowered.contains("foreign key constraint") {
                FlashcardsError::ValidationError(format!(
                    "Referenced resource does not exist: {}",
                    message
                ))
            } else if lowered.contains("check constraint") {
                FlashcardsError::ValidationError(format!("Invalid value: {}", message))
            } else {
                FlashcardsError::DatabaseError(anyhow::anyhow!("{}", message))
            }
        }
        other => FlashcardsError::DatabaseError(anyhow::Error::from(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_creation() {
        let id = Uuid::new_v4();
        let context = ErrorContext::new("next_card", "deck").with_id(id);

        assert_eq!(context.operation, "next_card");
        assert_eq!(context.resource_type, "deck");
        assert_eq!(context.resource_id, Some(id.to_string()));
    }

    #[test]
    fn test_row_not_found_classification() {
        let classified = classify_database_error(sqlx::Error::RowNotFound);
        assert!(matches!(classified, FlashcardsError::NotFound(_)));
    }

    #[test]
    fn test_other_errors_stay_database_errors() {
        let classified = classify_database_error(sqlx::Error::PoolTimedOut);
        assert!(matches!(classified, FlashcardsError::DatabaseError(_)));
    }

    #[test]
    fn test_unknown_algorithm_message_lists_schedulers() {
        let error = FlashcardsError::UnknownAlgorithm {
            algorithm: "sm2".to_string(),
            available: vec!["random".to_string()],
        };
        let message = error.to_string();
        assert!(message.contains("'sm2'"));
        assert!(message.contains("\"random\""));
    }

    #[test]
    fn test_log_with_context_returns_same_error() {
        let deck_id = Uuid::new_v4();
        let error = FlashcardsError::EmptyDeck(deck_id)
            .log_with_context(ErrorContext::new("next_card", "deck").with_id(deck_id));
        assert!(matches!(error, FlashcardsError::EmptyDeck(id) if id == deck_id));
    }

    #[test]
    fn test_not_found_helper() {
        let error = FlashcardsError::not_found("Card", "abc");
        assert_eq!(error.to_string(), "Resource not found: Card with id 'abc' not found");
    }
}
