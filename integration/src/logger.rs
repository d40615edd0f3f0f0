/// Process-wide logging setup

use bookmark_manager_core::SystemError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Fallback filter when `RUST_LOG` is unset (e.g. `info`, `page_scraper=debug`)
    pub level: String,

    /// Include thread IDs
    pub include_thread_ids: bool,

    /// Include target module paths
    pub include_targets: bool,

    /// Colored output
    pub ansi: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            include_thread_ids: false,
            include_targets: true,
            ansi: true,
        }
    }
}

impl LoggerConfig {
    pub fn with_level(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Self::default()
        }
    }
}

/// Installs the global tracing subscriber
pub struct UnifiedLogger;

impl UnifiedLogger {
    /// Initialize the global logger
    ///
    /// Fails when the filter does not parse or a subscriber is already
    /// installed.
    pub fn init(config: LoggerConfig) -> Result<(), SystemError> {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.level))
            .map_err(|e| SystemError::Configuration {
                details: format!("Invalid log filter '{}': {}", config.level, e),
            })?;

        let console_layer = fmt::layer()
            .with_target(config.include_targets)
            .with_thread_ids(config.include_thread_ids)
            .with_ansi(config.ansi);

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(console_layer);

        tracing::subscriber::set_global_default(subscriber).map_err(|e| SystemError::Configuration {
            details: format!("Logger already initialized: {}", e),
        })?;

        tracing::info!("Logging initialized with level: {}", config.level);
        Ok(())
    }

    /// Initialize with default configuration
    pub fn init_default() -> Result<(), SystemError> {
        Self::init(LoggerConfig::default())
    }
}
