//! Data Access Layer for the bookmark manager
//!
//! This module provides bookmark persistence on SQLite, the on-disk static
//! area that holds downloaded icons and recycle snapshots, and the bounded
//! caches shared by the scraping and tagging engines.

pub mod cache;
pub mod schema;
pub mod repository;
pub mod static_area;

pub use cache::*;
pub use repository::*;
pub use static_area::*;

use bookmark_manager_core::*;
use std::path::Path;
use tokio_rusqlite::Connection;
use std::sync::Arc;
use tracing::info;

/// Database manager for handling SQLite connections
pub struct DatabaseManager {
    connection: Arc<Connection>,
}

impl DatabaseManager {
    /// Create a new database manager with the specified path
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();

        let connection = Connection::open(path)
            .await
            .map_err(|e| BookmarkManagerError::System {
                source: SystemError::Configuration {
                    details: format!("Failed to open database: {}", e),
                },
            })?;

        let manager = Self {
            connection: Arc::new(connection),
        };
        manager.initialize_schema().await?;

        Ok(manager)
    }

    /// Create an in-memory database (for testing)
    pub async fn in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory()
            .await
            .map_err(|e| BookmarkManagerError::System {
                source: SystemError::Configuration {
                    details: format!("Failed to create in-memory database: {}", e),
                },
            })?;

        let manager = Self {
            connection: Arc::new(connection),
        };
        manager.initialize_schema().await?;

        Ok(manager)
    }

    /// Apply every migration not yet recorded in `schema_migrations`
    async fn initialize_schema(&self) -> Result<()> {
        let applied = self
            .connection
            .call(|conn| {
                conn.execute_batch(
                    "CREATE TABLE IF NOT EXISTS schema_migrations (
                        version INTEGER PRIMARY KEY,
                        applied_at INTEGER NOT NULL,
                        description TEXT
                    );",
                )?;
                let current: u32 = conn.query_row(
                    "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
                    [],
                    |row| row.get(0),
                )?;

                let mut applied = Vec::new();
                for version in (current + 1)..=schema::SCHEMA_VERSION {
                    let Some(migration) = schema::get_migration(version) else {
                        continue;
                    };
                    let tx = conn.transaction()?;
                    tx.execute_batch(migration.sql)?;
                    tx.execute(
                        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?1, ?2, ?3)",
                        rusqlite::params![migration.version, Utc::now().timestamp(), migration.description],
                    )?;
                    tx.commit()?;
                    applied.push(version);
                }
                Ok(applied)
            })
            .await
            .map_err(|e| BookmarkManagerError::System {
                source: SystemError::Configuration {
                    details: format!("Failed to initialize schema: {}", e),
                },
            })?;

        if !applied.is_empty() {
            info!("Applied database migrations: {:?}", applied);
        }

        Ok(())
    }

    /// Highest migration version recorded in the database
    pub async fn schema_version(&self) -> Result<u32> {
        self.connection
            .call(|conn| {
                let version: u32 = conn.query_row(
                    "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
                    [],
                    |row| row.get(0),
                )?;
                Ok(version)
            })
            .await
            .map_err(|e| BookmarkManagerError::Storage {
                source: StorageError::Database {
                    details: format!("Failed to read schema version: {}", e),
                },
            })
    }

    /// Get the connection for repository operations
    pub fn connection(&self) -> Arc<Connection> {
        Arc::clone(&self.connection)
    }
}
