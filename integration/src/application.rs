/// Main application module
///
/// Provides high-level Application API

use crate::{AppConfig, AppContext, AppStatistics, BookmarkService, LoggerConfig, UnifiedLogger};
use bookmark_manager_core::*;
use std::sync::Arc;
use tracing::{info, warn};

/// Main application
pub struct Application {
    /// Application context
    context: Arc<AppContext>,
}

impl Application {
    /// Create and initialize a new application
    ///
    /// An already installed logger is kept.
    pub async fn new(config: AppConfig) -> Result<Self> {
        if let Err(e) = UnifiedLogger::init(LoggerConfig::with_level(config.log_level.clone())) {
            warn!("Keeping existing logger: {}", e);
        }

        info!("Starting bookmark manager");
        let context = Arc::new(AppContext::new(config).await?);
        info!("Application initialized successfully");

        Ok(Self { context })
    }

    /// Shutdown the application
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down application");
        self.context.shutdown().await?;
        info!("Application shutdown complete");
        Ok(())
    }

    /// Get application context
    pub fn context(&self) -> &Arc<AppContext> {
        &self.context
    }

    pub fn bookmarks(&self) -> &BookmarkService {
        &self.context.service
    }

    // High-level API methods

    pub async fn fetch_metadata(&self, url: &str) -> PageMetadata {
        self.context.service.metadata_for_url(url).await
    }

    pub async fn suggest_tags(&self, title: &str, description: &str, url: &str) -> Vec<String> {
        self.context.service.suggest_tags(title, description, url).await
    }

    pub async fn categorize(&self) -> Result<Vec<BookmarkGroup>> {
        self.context.service.categorize().await
    }

    pub async fn classify_network(&self, url: &str) -> NetworkClassification {
        self.context.service.classify_network(url).await
    }

    pub async fn acquire_icon(&self, candidate_url: &str, referer: &str) -> Option<String> {
        self.context.fetcher.icons().acquire_icon(candidate_url, referer).await
    }

    /// Get application statistics
    pub async fn get_stats(&self) -> Result<AppStatistics> {
        self.context.get_stats().await
    }
}
