/// Integration module for the bookmark manager
///
/// Wires storage, the metadata pipeline and the organizer into one
/// application context and exposes the bookmark lifecycle service.

use bookmark_manager_core::*;
use data_access::{BookmarkRepository, DatabaseManager, SqliteBookmarkRepository, StaticArea};
use organizer::{Categorizer, TagSuggester, TagSuggesterConfig, TagVocabulary};
use page_scraper::{
    HeadlessFetcher, IconAcquirer, IconAcquirerConfig, MetadataFetcher, MetadataFetcherConfig,
    NetworkClassifier,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

pub mod application;
pub mod logger;
pub mod service;

pub use application::Application;
pub use logger::{LoggerConfig, UnifiedLogger};
pub use service::BookmarkService;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Database path; in-memory when unset
    pub database_path: Option<PathBuf>,

    /// Root of the static area (icons, recycle bins, default favicon)
    pub static_dir: PathBuf,

    /// User tag vocabulary file; kept in memory only when unset
    pub vocabulary_path: Option<PathBuf>,

    /// Log level
    pub log_level: String,

    /// Memoized metadata results
    pub metadata_cache_capacity: usize,

    /// Memoized tag suggestions
    pub tag_cache_capacity: usize,

    /// Keep the headless browser as the last extraction strategy
    pub enable_headless: bool,

    /// Favicon service URL template with a `{domain}` placeholder
    pub favicon_service: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            static_dir: PathBuf::from("static"),
            vocabulary_path: Some(PathBuf::from("tag_vocabulary.json")),
            log_level: "info".to_string(),
            metadata_cache_capacity: 1000,
            tag_cache_capacity: 1000,
            enable_headless: true,
            favicon_service: IconAcquirerConfig::default().favicon_service,
        }
    }
}

impl AppConfig {
    /// Load from a JSON file; missing keys take their defaults
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }
}

/// Application context that holds all initialized components
pub struct AppContext {
    pub database: Arc<DatabaseManager>,
    pub static_area: StaticArea,
    pub fetcher: Arc<MetadataFetcher>,
    pub suggester: Arc<TagSuggester>,
    pub service: Arc<BookmarkService>,
    pub config: Arc<RwLock<AppConfig>>,
}

impl AppContext {
    /// Create a new application context with all components initialized
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("Initializing application context");

        let database = Arc::new(match &config.database_path {
            Some(path) => DatabaseManager::new(path).await?,
            None => DatabaseManager::in_memory().await?,
        });
        let repository: Arc<dyn BookmarkRepository> =
            Arc::new(SqliteBookmarkRepository::new(database.connection()));
        info!("Database initialized");

        let static_area = StaticArea::new(&config.static_dir);
        if let Err(e) = static_area.ensure_default_favicon().await {
            warn!("Default favicon unavailable: {}", e);
        }

        let icons = Arc::new(IconAcquirer::with_config(
            static_area.clone(),
            IconAcquirerConfig {
                favicon_service: config.favicon_service.clone(),
                ..Default::default()
            },
        ));
        let mut fetcher_config = MetadataFetcherConfig {
            cache_capacity: config.metadata_cache_capacity,
            ..Default::default()
        };
        if !config.enable_headless {
            fetcher_config.chain.retain(|s| !s.is_headless());
        }
        let fetcher = Arc::new(MetadataFetcher::with_config(icons, HeadlessFetcher::new(), fetcher_config));
        info!("Metadata pipeline initialized");

        let vocabulary = Arc::new(match &config.vocabulary_path {
            Some(path) => TagVocabulary::load(path).await,
            None => TagVocabulary::in_memory(
                organizer::DEFAULT_USER_VOCABULARY.iter().map(|w| w.to_string()).collect(),
            ),
        });
        let classifier = Arc::new(NetworkClassifier::new());
        let suggester = Arc::new(TagSuggester::with_config(
            vocabulary,
            classifier,
            TagSuggesterConfig {
                cache_capacity: config.tag_cache_capacity,
                ..Default::default()
            },
        ));
        let categorizer = Arc::new(Categorizer::new(Arc::clone(&suggester)));
        info!("Organizer initialized");

        let service = Arc::new(BookmarkService::new(
            repository,
            static_area.clone(),
            Arc::clone(&fetcher),
            Arc::clone(&suggester),
            categorizer,
        ));

        info!("Application context initialized successfully");

        Ok(Self {
            database,
            static_area,
            fetcher,
            suggester,
            service,
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// Shutdown all components gracefully
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down application context");
        let stats = self.get_stats().await?;
        info!(
            "Final state: {} bookmarks, {} cached pages, {} user tags",
            stats.total_bookmarks, stats.cached_metadata, stats.user_tags
        );
        info!("Application context shutdown complete");
        Ok(())
    }

    /// Get application statistics
    pub async fn get_stats(&self) -> Result<AppStatistics> {
        Ok(AppStatistics {
            total_bookmarks: self.service.repository().count().await?,
            cached_metadata: self.fetcher.cache_stats().await.len,
            cached_suggestions: self.suggester.cache_stats().await.len,
            user_tags: self.suggester.vocabulary().user_words().await.len(),
            schema_version: self.database.schema_version().await?,
        })
    }
}

/// Application statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppStatistics {
    pub total_bookmarks: usize,
    pub cached_metadata: usize,
    pub cached_suggestions: usize,
    pub user_tags: usize,
    pub schema_version: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) fn test_config(dir: &TempDir) -> AppConfig {
        AppConfig {
            database_path: None,
            static_dir: dir.path().join("static"),
            vocabulary_path: Some(dir.path().join("tag_vocabulary.json")),
            log_level: "warn".to_string(),
            enable_headless: false,
            favicon_service: "http://127.0.0.1:9/{domain}.ico".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_app_context_creation() {
        let dir = TempDir::new().unwrap();
        let context = AppContext::new(test_config(&dir)).await.unwrap();

        assert!(dir.path().join("static").join("favicon.ico").exists());
        assert!(context.fetcher.config().chain.iter().all(|s| !s.is_headless()));

        let stats = context.get_stats().await.unwrap();
        assert_eq!(stats.total_bookmarks, 0);
        assert!(stats.schema_version >= 1);
    }

    #[tokio::test]
    async fn test_app_context_shutdown() {
        let dir = TempDir::new().unwrap();
        let context = AppContext::new(test_config(&dir)).await.unwrap();
        assert!(context.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_config_from_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, r#"{"static_dir": "/srv/static", "enable_headless": false}"#)
            .await
            .unwrap();

        let config = AppConfig::from_file(&path).await.unwrap();

        assert_eq!(config.static_dir, PathBuf::from("/srv/static"));
        assert!(!config.enable_headless);
        assert_eq!(config.metadata_cache_capacity, 1000);
        assert_eq!(config.log_level, "info");
    }

    #[tokio::test]
    async fn test_config_from_bad_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        assert!(matches!(
            AppConfig::from_file(&path).await,
            Err(BookmarkManagerError::System { .. })
        ));
        assert!(AppConfig::from_file(dir.path().join("missing.json")).await.is_err());
    }
}
