use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use tracing::{info, warn};

use crate::schedulers::SchedulerOptions;

// Import logging macros
use crate::{log_system_event, log_validation};

/// Default cap on never-repeat resampling before a scheduler gives up
pub const DEFAULT_MAX_RESAMPLE_ATTEMPTS: usize = 1000;

/// Complete configuration loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

/// Database connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Scheduler construction settings
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    pub seed: Option<u64>,
    pub max_resample_attempts: usize,
}

/// Logging system configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        log_system_event!(config, "Loading configuration from environment variables");

        let config = Config {
            database: DatabaseConfig::from_env()?,
            scheduler: SchedulerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        };

        log_system_event!(config, "Configuration loaded successfully");
        config.log_configuration_summary();

        Ok(config)
    }

    /// Log a summary of loaded configuration (without sensitive data)
    fn log_configuration_summary(&self) {
        info!(
            database_url_masked = %mask_sensitive_data(&self.database.url),
            scheduler_seeded = self.scheduler.seed.is_some(),
            max_resample_attempts = self.scheduler.max_resample_attempts,
            log_level = %self.logging.level,
            "Configuration summary"
        );
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.database.url.starts_with("sqlite:") {
            return Err(anyhow!("DATABASE_URL must start with 'sqlite:'"));
        }

        if self.scheduler.max_resample_attempts == 0 {
            return Err(anyhow!("SCHEDULER_MAX_RESAMPLE_ATTEMPTS must be greater than 0"));
        }

        let level = self.logging.level.to_lowercase();
        let base_level = level.split(',').next().unwrap_or_default();
        if !["trace", "debug", "info", "warn", "error"].contains(&base_level) {
            warn!("Unrecognized log level '{}', filter may fall back to defaults", self.logging.level);
        }

        log_validation!(success, "configuration", "Configuration validation completed successfully");
        Ok(())
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:flashcards.db".to_string());

        Ok(DatabaseConfig { url })
    }
}

impl SchedulerConfig {
    fn from_env() -> Result<Self> {
        let seed = match env::var("SCHEDULER_SEED") {
            Ok(seed_str) => Some(seed_str.parse::<u64>().map_err(|_| {
                anyhow!("Invalid SCHEDULER_SEED value: '{}'. Must be an unsigned integer", seed_str)
            })?),
            Err(_) => None,
        };

        let attempts_str = env::var("SCHEDULER_MAX_RESAMPLE_ATTEMPTS")
            .unwrap_or_else(|_| DEFAULT_MAX_RESAMPLE_ATTEMPTS.to_string());

        let max_resample_attempts = attempts_str
            .parse::<usize>()
            .ok()
            .filter(|attempts| *attempts > 0)
            .ok_or_else(|| {
                anyhow!(
                    "Invalid SCHEDULER_MAX_RESAMPLE_ATTEMPTS value: '{}'. Must be a positive number",
                    attempts_str
                )
            })?;

        Ok(SchedulerConfig {
            seed,
            max_resample_attempts,
        })
    }

    pub fn options(&self) -> SchedulerOptions {
        SchedulerOptions {
            seed: self.seed,
            max_resample_attempts: self.max_resample_attempts,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            seed: None,
            max_resample_attempts: DEFAULT_MAX_RESAMPLE_ATTEMPTS,
        }
    }
}

impl LoggingConfig {
    fn from_env() -> Result<Self> {
        let level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info,flashcards_core=debug".to_string());

        let file_enabled = env::var("LOG_FILE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let console_enabled = env::var("LOG_CONSOLE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let log_directory = env::var("LOG_DIRECTORY")
            .unwrap_or_else(|_| "logs".to_string());

        Ok(LoggingConfig {
            level,
            file_enabled,
            console_enabled,
            log_directory,
        })
    }
}

/// Mask sensitive data in configuration for safe logging
fn mask_sensitive_data(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}***{}", head, tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn test_config() -> Config {
        Config {
            database: DatabaseConfig {
                url: "sqlite:test.db".to_string(),
            },
            scheduler: SchedulerConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file_enabled: false,
                console_enabled: true,
                log_directory: "logs".to_string(),
            },
        }
    }

    #[test]
    fn test_mask_sensitive_data() {
        assert_eq!(mask_sensitive_data("short"), "*****");
        assert_eq!(mask_sensitive_data("sqlite:flashcards.db"), "sqli***s.db");
    }

    #[test]
    fn test_database_config_defaults() {
        unsafe { env::remove_var("DATABASE_URL"); }

        let config = DatabaseConfig::from_env().unwrap();
        assert_eq!(config.url, "sqlite:flashcards.db");
    }

    #[test]
    fn test_scheduler_config_parsing() {
        unsafe {
            env::remove_var("SCHEDULER_SEED");
            env::remove_var("SCHEDULER_MAX_RESAMPLE_ATTEMPTS");
        }
        let config = SchedulerConfig::from_env().unwrap();
        assert_eq!(config.seed, None);
        assert_eq!(config.max_resample_attempts, DEFAULT_MAX_RESAMPLE_ATTEMPTS);

        unsafe {
            env::set_var("SCHEDULER_SEED", "12345");
            env::set_var("SCHEDULER_MAX_RESAMPLE_ATTEMPTS", "50");
        }
        let config = SchedulerConfig::from_env().unwrap();
        assert_eq!(config.seed, Some(12345));
        assert_eq!(config.max_resample_attempts, 50);

        let options = config.options();
        assert_eq!(options.seed, Some(12345));
        assert_eq!(options.max_resample_attempts, 50);

        unsafe { env::set_var("SCHEDULER_SEED", "not-a-number"); }
        assert!(SchedulerConfig::from_env().is_err());

        unsafe {
            env::remove_var("SCHEDULER_SEED");
            env::set_var("SCHEDULER_MAX_RESAMPLE_ATTEMPTS", "0");
        }
        assert!(SchedulerConfig::from_env().is_err());

        unsafe { env::remove_var("SCHEDULER_MAX_RESAMPLE_ATTEMPTS"); }
    }

    #[test]
    fn test_config_validation() {
        let config = test_config();
        assert!(config.validate().is_ok());

        let mut invalid_url = config.clone();
        invalid_url.database.url = "postgres://localhost/flashcards".to_string();
        assert!(invalid_url.validate().is_err());

        let mut invalid_attempts = config.clone();
        invalid_attempts.scheduler.max_resample_attempts = 0;
        assert!(invalid_attempts.validate().is_err());

        // Unknown levels only warn
        let mut odd_level = config;
        odd_level.logging.level = "verbose".to_string();
        assert!(odd_level.validate().is_ok());
    }
}
