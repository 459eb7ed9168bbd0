use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Standardized logging macros for consistent field names and message patterns across the crate
///
/// These macros ensure:
/// - Consistent field naming conventions (`component`, `operation`, `deck_id`, `card_id`)
/// - Appropriate logging levels for different scenarios
/// - Structured logging with context

// ============================================================================
// Database Operation Logging Macros
// ============================================================================

/// Log database operation results
#[macro_export]
macro_rules! log_db_operation {
    (debug, $operation:expr, deck_id = $deck_id:expr) => {
        tracing::debug!(
            component = "database",
            operation = $operation,
            deck_id = %$deck_id,
            "Database operation completed"
        );
    };
    (debug, $operation:expr, card_id = $card_id:expr) => {
        tracing::debug!(
            component = "database",
            operation = $operation,
            card_id = %$card_id,
            "Database operation completed"
        );
    };
    (debug, $operation:expr, id = $id:expr) => {
        tracing::debug!(
            component = "database",
            operation = $operation,
            id = %$id,
            "Database operation completed"
        );
    };
    (debug, $operation:expr, count = $count:expr) => {
        tracing::debug!(
            component = "database",
            operation = $operation,
            result_count = $count,
            "Database operation completed"
        );
    };
    (info, $operation:expr, $msg:expr) => {
        tracing::info!(
            component = "database",
            operation = $operation,
            "Database operation: {}", $msg
        );
    };
    (warn, $operation:expr, id = $id:expr, $msg:expr) => {
        tracing::warn!(
            component = "database",
            operation = $operation,
            id = %$id,
            "Database operation warning: {}", $msg
        );
    };
    (error, $operation:expr, error = $error:expr) => {
        tracing::error!(
            component = "database",
            operation = $operation,
            error = %$error,
            "Database operation failed"
        );
    };
}

// ============================================================================
// Scheduler Logging Macros
// ============================================================================

/// Log scheduler decisions with algorithm and deck context
#[macro_export]
macro_rules! log_scheduler_event {
    (pick, $algorithm:expr, deck_id = $deck_id:expr, card_id = $card_id:expr, $msg:expr) => {
        tracing::debug!(
            component = "scheduler",
            algorithm = $algorithm,
            deck_id = %$deck_id,
            card_id = %$card_id,
            "Scheduler picked card: {}", $msg
        );
    };
    (review, $algorithm:expr, deck_id = $deck_id:expr, card_id = $card_id:expr, result = $result:expr) => {
        tracing::debug!(
            component = "scheduler",
            algorithm = $algorithm,
            deck_id = %$deck_id,
            card_id = %$card_id,
            result = %$result,
            "Scheduler recorded review"
        );
    };
    (debug, $algorithm:expr, deck_id = $deck_id:expr, $msg:expr) => {
        tracing::debug!(
            component = "scheduler",
            algorithm = $algorithm,
            deck_id = %$deck_id,
            "Scheduler: {}", $msg
        );
    };
    (warn, $algorithm:expr, deck_id = $deck_id:expr, $msg:expr) => {
        tracing::warn!(
            component = "scheduler",
            algorithm = $algorithm,
            deck_id = %$deck_id,
            "Scheduler warning: {}", $msg
        );
    };
}

// ============================================================================
// Study Session Logging Macros
// ============================================================================

/// Log study session progress
#[macro_export]
macro_rules! log_study_event {
    (start, deck_id = $deck_id:expr, algorithm = $algorithm:expr) => {
        tracing::info!(
            component = "study_session",
            deck_id = %$deck_id,
            algorithm = %$algorithm,
            "Study session started"
        );
    };
    (advance, deck_id = $deck_id:expr, studied = $studied:expr, next = $next:expr) => {
        tracing::debug!(
            component = "study_session",
            deck_id = %$deck_id,
            studied_card = ?$studied,
            next_card = %$next,
            "Study session advanced"
        );
    };
}

// ============================================================================
// System Event Logging Macros
// ============================================================================

/// Log system startup and configuration events
#[macro_export]
macro_rules! log_system_event {
    (startup, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "startup",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (config, $msg:expr) => {
        tracing::info!(event_type = "configuration", "System event: {}", $msg);
    };
}

// ============================================================================
// Validation Logging Macros
// ============================================================================

/// Log validation results consistently
#[macro_export]
macro_rules! log_validation {
    (success, $component:expr, $msg:expr) => {
        tracing::debug!(
            event_type = "validation",
            component = $component,
            result = "success",
            "Validation completed: {}", $msg
        );
    };
    (failure, $component:expr, error = $error:expr) => {
        tracing::warn!(
            event_type = "validation",
            component = $component,
            result = "failure",
            error = %$error,
            "Validation failed"
        );
    };
}

/// Install the global subscriber: env filter, optional console output and an
/// optional daily-rotated log file. Keep the returned guard alive for as long
/// as file logging should flush.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_new(&config.level)
        .unwrap_or_else(|_| EnvFilter::new("info,flashcards_core=debug"));

    let console_layer = config.console_enabled.then(|| {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(true)
            .boxed()
    });

    let (file_layer, guard) = if config.file_enabled {
        std::fs::create_dir_all(&config.log_directory)?;
        let file_appender =
            tracing_appender::rolling::daily(&config.log_directory, "flashcards-core.log");
        let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

        // No ANSI colors in files
        let layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_writer(non_blocking_file)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    log_system_event!(
        startup,
        component = "logging",
        format!(
            "logging initialized (console: {}, file: {})",
            config.console_enabled, config.file_enabled
        )
    );

    Ok(guard)
}
