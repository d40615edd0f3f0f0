//! Metadata fetch orchestrator
//!
//! Runs the strategy chain for a URL, keeps the first valid result and
//! memoizes every outcome per URL in a bounded cache.

use bookmark_manager_core::*;
use data_access::{CacheStats, SharedCache};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::headless::HeadlessFetcher;
use crate::http::parse_page_url;
use crate::icon::IconAcquirer;
use crate::strategy::{Extractor, Strategy};

/// Error marker of the exhaustion fallback
pub const EXHAUSTED_ERROR: &str = "All metadata extraction attempts failed";

/// Configuration for the metadata orchestrator
#[derive(Debug, Clone)]
pub struct MetadataFetcherConfig {
    /// Memoized URLs kept before the oldest is evicted
    pub cache_capacity: usize,
    /// Strategies in fallback order
    pub chain: Vec<Strategy>,
    /// Hosts (and their subdomains) that try the headless strategy first
    pub js_heavy_hosts: Vec<String>,
    /// Lower-case title fragments that mark an anti-bot interstitial
    pub interstitial_phrases: Vec<String>,
}

impl Default for MetadataFetcherConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1000,
            chain: Strategy::default_chain(),
            js_heavy_hosts: [
                "youtube.com",
                "twitter.com",
                "x.com",
                "instagram.com",
                "facebook.com",
                "tiktok.com",
                "linkedin.com",
                "reddit.com",
                "medium.com",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            interstitial_phrases: [
                "update your browser",
                "javascript required",
                "enable javascript",
                "javascript is disabled",
                "just a moment",
                "attention required",
                "checking your browser",
                "access denied",
                "are you a robot",
                "unsupported browser",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Fetches page metadata through the strategy chain
pub struct MetadataFetcher {
    extractor: Arc<Extractor>,
    cache: SharedCache<String, PageMetadata>,
    config: MetadataFetcherConfig,
}

impl MetadataFetcher {
    pub fn new(icons: Arc<IconAcquirer>, headless: HeadlessFetcher) -> Self {
        Self::with_config(icons, headless, MetadataFetcherConfig::default())
    }

    pub fn with_config(icons: Arc<IconAcquirer>, headless: HeadlessFetcher, config: MetadataFetcherConfig) -> Self {
        Self {
            extractor: Arc::new(Extractor::new(icons, headless)),
            cache: SharedCache::new(config.cache_capacity),
            config,
        }
    }

    pub fn config(&self) -> &MetadataFetcherConfig {
        &self.config
    }

    pub fn icons(&self) -> &IconAcquirer {
        self.extractor.icons()
    }

    /// Metadata for `url`; never fails
    ///
    /// Repeated calls for the same URL return the memoized result until it
    /// is evicted or [`invalidate`](Self::invalidate)d.
    pub async fn fetch_metadata(&self, url: &str) -> PageMetadata {
        let key = url.to_string();
        if let Some(cached) = self.cache.get(&key).await {
            debug!("Metadata cache hit for {}", url);
            return cached;
        }

        let result = if let Err(e) = parse_page_url(url) {
            warn!("Not fetching {}: {}", url, e);
            PageMetadata::exhausted(e.to_string())
        } else {
            let chain = self.strategy_order(url);
            run_chain(
                &chain,
                url,
                |strategy| {
                    let extractor = Arc::clone(&self.extractor);
                    let strategy = strategy.clone();
                    async move {
                        let metadata = extractor.extract(&strategy, url).await;
                        match self.rejection(url, &metadata) {
                            Some(reason) => PageMetadata::failed(reason.to_string()),
                            None => metadata,
                        }
                    }
                },
                |metadata| !metadata.is_error(),
            )
            .await
        };

        self.cache.insert(key, result.clone()).await;
        result
    }

    /// Drop the memoized result for `url`
    pub async fn invalidate(&self, url: &str) {
        self.cache.invalidate(&url.to_string()).await;
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Configured chain, with headless moved first for JS-heavy hosts
    pub fn strategy_order(&self, url: &str) -> Vec<Strategy> {
        let mut chain = self.config.chain.clone();
        if self.is_js_heavy(url) {
            if let Some(pos) = chain.iter().position(Strategy::is_headless) {
                let headless = chain.remove(pos);
                chain.insert(0, headless);
            }
        }
        chain
    }

    pub fn is_js_heavy(&self, url: &str) -> bool {
        let Some(host) = host_of(url) else {
            return false;
        };
        self.config
            .js_heavy_hosts
            .iter()
            .any(|h| host == *h || host.ends_with(&format!(".{}", h)))
    }

    /// Validity predicate applied to each strategy result
    pub fn is_valid(&self, url: &str, metadata: &PageMetadata) -> bool {
        !metadata.is_error() && self.rejection(url, metadata).is_none()
    }

    /// Why an error-free result is still unusable
    pub fn rejection(&self, url: &str, metadata: &PageMetadata) -> Option<ScrapeError> {
        if metadata.is_error() {
            return None;
        }

        let title = metadata.title.to_lowercase();
        if self.config.interstitial_phrases.iter().any(|p| title.contains(p.as_str())) {
            debug!("Rejecting interstitial title: {}", metadata.title);
            return Some(ScrapeError::Interstitial { title: metadata.title.clone() });
        }

        let has_extra = metadata.extra_metadata.values().any(|v| match v {
            serde_json::Value::Null => false,
            serde_json::Value::String(s) => !s.trim().is_empty(),
            serde_json::Value::Array(a) => !a.is_empty(),
            serde_json::Value::Object(o) => !o.is_empty(),
            _ => true,
        });

        let populated = !metadata.title.trim().is_empty()
            || !metadata.description.trim().is_empty()
            || metadata.has_custom_icon()
            || has_extra;
        if populated {
            None
        } else {
            Some(ScrapeError::EmptyPage { url: url.to_string() })
        }
    }
}

/// Try strategies in order; first result accepted by `is_valid` wins
///
/// When nothing is accepted the exhaustion fallback is returned.
pub async fn run_chain<F, Fut, V>(strategies: &[Strategy], url: &str, mut extract: F, is_valid: V) -> PageMetadata
where
    F: FnMut(&Strategy) -> Fut,
    Fut: Future<Output = PageMetadata>,
    V: Fn(&PageMetadata) -> bool,
{
    for strategy in strategies {
        let metadata = extract(strategy).await;
        if is_valid(&metadata) {
            info!("{} succeeded for {}", strategy.name(), url);
            return metadata;
        }
        warn!(
            "{} failed or returned empty metadata for {}: {}",
            strategy.name(),
            url,
            metadata.error.as_deref().unwrap_or("no usable fields")
        );
    }

    error!("All metadata extraction attempts failed for {}", url);
    PageMetadata::exhausted(EXHAUSTED_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessConfig;
    use crate::icon::IconAcquirerConfig;
    use crate::strategy::IconPolicy;
    use crate::http::ClientProfile;
    use crate::test_support::{FixtureServer, Route};
    use data_access::StaticArea;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn fetcher(dir: &tempfile::TempDir, config: MetadataFetcherConfig) -> MetadataFetcher {
        let icons = IconAcquirer::with_config(
            StaticArea::new(dir.path().join("static")),
            IconAcquirerConfig {
                favicon_service: "http://127.0.0.1:9/{domain}.ico".to_string(),
                timeout_secs: 5,
                ..Default::default()
            },
        );
        MetadataFetcher::with_config(Arc::new(icons), HeadlessFetcher::with_config(HeadlessConfig::default()), config)
    }

    fn static_only() -> MetadataFetcherConfig {
        MetadataFetcherConfig {
            chain: vec![
                Strategy::Static {
                    profile: ClientProfile::Chrome,
                    warm_up: false,
                    icons: IconPolicy::FirstWorking,
                    timeout: Duration::from_secs(5),
                },
                Strategy::Static {
                    profile: ClientProfile::Firefox,
                    warm_up: true,
                    icons: IconPolicy::FirstWorking,
                    timeout: Duration::from_secs(5),
                },
            ],
            ..Default::default()
        }
    }

    fn with_title(title: &str) -> PageMetadata {
        PageMetadata { title: title.to_string(), ..PageMetadata::empty() }
    }

    #[test]
    fn test_validity_predicate() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&dir, static_only());

        assert!(fetcher.is_valid("https://example.com", &with_title("Rust")));
        assert!(!fetcher.is_valid("https://example.com", &PageMetadata::empty()));
        assert!(!fetcher.is_valid("https://example.com", &PageMetadata::failed("boom")));
        assert!(!fetcher.is_valid("https://example.com", &with_title("Please update your browser")));
        assert!(!fetcher.is_valid("https://example.com", &with_title("Just a moment...")));

        let icon_only = PageMetadata {
            webicon: "/static/icons/example_com/favicon.ico".to_string(),
            ..PageMetadata::empty()
        };
        assert!(fetcher.is_valid("https://example.com", &icon_only));

        let mut extra_only = PageMetadata::empty();
        extra_only.extra_metadata.insert("og:site_name".to_string(), serde_json::json!("Site"));
        assert!(fetcher.is_valid("https://example.com", &extra_only));

        let mut blank_extra = PageMetadata::empty();
        blank_extra.extra_metadata.insert("og:site_name".to_string(), serde_json::json!(""));
        assert!(!fetcher.is_valid("https://example.com", &blank_extra));
    }

    #[test]
    fn test_rejection_reasons() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&dir, static_only());

        assert!(matches!(
            fetcher.rejection("https://example.com", &with_title("Attention Required! | Cloudflare")),
            Some(ScrapeError::Interstitial { .. })
        ));
        assert!(matches!(
            fetcher.rejection("https://example.com", &PageMetadata::empty()),
            Some(ScrapeError::EmptyPage { url }) if url == "https://example.com"
        ));
        assert!(fetcher.rejection("https://example.com", &with_title("Rust")).is_none());
        assert!(fetcher.rejection("https://example.com", &PageMetadata::failed("boom")).is_none());
    }

    #[tokio::test]
    async fn test_interstitial_page_exhausts_chain() {
        let server = FixtureServer::start(vec![Route::html("/", "<title>Just a moment...</title>")]).await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&dir, static_only());

        let result = fetcher.fetch_metadata(&server.url("/")).await;

        assert_eq!(result.title, NO_TITLE);
        assert_eq!(result.error.as_deref(), Some(EXHAUSTED_ERROR));
        assert!(server.hits("/") >= 2);
    }

    #[test]
    fn test_js_heavy_hosts_try_headless_first() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&dir, MetadataFetcherConfig::default());

        let order = fetcher.strategy_order("https://www.youtube.com/watch?v=1");
        assert!(order[0].is_headless());
        assert_eq!(order.len(), 4);

        let order = fetcher.strategy_order("https://example.com/");
        assert!(order[3].is_headless());
        assert!(!fetcher.is_js_heavy("https://notyoutube.com/"));
    }

    #[tokio::test]
    async fn test_chain_short_circuits_on_first_valid() {
        let chain = Strategy::default_chain();
        let calls = AtomicUsize::new(0);

        let result = run_chain(
            &chain,
            "https://example.com",
            |strategy| {
                calls.fetch_add(1, Ordering::SeqCst);
                let metadata = if strategy.name() == "static-firefox" {
                    with_title("Second")
                } else {
                    PageMetadata::failed("blocked")
                };
                async move { metadata }
            },
            |m| !m.is_error() && !m.title.is_empty(),
        )
        .await;

        assert_eq!(result.title, "Second");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_fallback() {
        let chain = Strategy::default_chain();
        let result = run_chain(&chain, "http://x", |_| async { PageMetadata::failed("nope") }, |_| false).await;

        assert_eq!(result.title, NO_TITLE);
        assert_eq!(result.webicon, DEFAULT_FAVICON);
        assert!(result.icon_candidates.is_empty());
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn test_fetch_is_memoized() {
        let server = FixtureServer::start(vec![Route::html("/", "<title>Memo</title>")]).await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&dir, static_only());
        let url = server.url("/");

        let first = fetcher.fetch_metadata(&url).await;
        let second = fetcher.fetch_metadata(&url).await;

        assert_eq!(first, second);
        assert_eq!(first.title, "Memo");
        assert_eq!(server.hits("/"), 1);

        fetcher.invalidate(&url).await;
        fetcher.fetch_metadata(&url).await;
        assert_eq!(server.hits("/"), 2);
    }

    #[tokio::test]
    async fn test_dead_site_returns_no_title_fallback() {
        let server = FixtureServer::start(vec![Route::html("/", "down").with_status(500)]).await;
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&dir, static_only());

        let result = fetcher.fetch_metadata(&server.url("/")).await;

        assert_eq!(result.title, NO_TITLE);
        assert_eq!(result.webicon, DEFAULT_FAVICON);
        assert!(result.icon_candidates.is_empty());
        assert!(result.is_error());
        assert_eq!(fetcher.cache_stats().await.len, 1);
    }

    #[tokio::test]
    async fn test_invalid_url_never_fetches() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&dir, static_only());

        let result = fetcher.fetch_metadata("not a url").await;
        assert_eq!(result.title, NO_TITLE);
        assert!(result.is_error());
    }
}
