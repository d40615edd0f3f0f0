//! Extraction strategies
//!
//! Every strategy has the same contract: given a URL, produce a
//! [`PageMetadata`]. Failures never escape; they come back as a metadata
//! value with `error` set so the orchestrator can move on.

use bookmark_manager_core::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::headless::HeadlessFetcher;
use crate::html::{extract_page, ExtractedPage, IconCandidate};
use crate::http::{fetch_html, parse_page_url, warm_up, ClientProfile};
use crate::icon::IconAcquirer;

/// How many icon candidates a strategy downloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconPolicy {
    /// Stop at the first candidate that downloads and validates
    FirstWorking,
    /// Download every candidate and pick the webicon by priority
    All,
}

/// One way of getting a page's metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Plain HTTP fetch with a browser-like header profile
    Static {
        profile: ClientProfile,
        /// Request the site root first to collect cookies
        warm_up: bool,
        icons: IconPolicy,
        timeout: Duration,
    },
    /// Rendered DOM from a headless browser
    Headless,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Static { profile: ClientProfile::Chrome, icons: IconPolicy::FirstWorking, .. } => "static-chrome",
            Strategy::Static { profile: ClientProfile::Firefox, .. } => "static-firefox",
            Strategy::Static { profile: ClientProfile::Chrome, icons: IconPolicy::All, .. } => "static-chrome-all-icons",
            Strategy::Headless => "headless",
        }
    }

    pub fn is_headless(&self) -> bool {
        matches!(self, Strategy::Headless)
    }

    /// Default fallback order
    pub fn default_chain() -> Vec<Strategy> {
        vec![
            Strategy::Static {
                profile: ClientProfile::Chrome,
                warm_up: false,
                icons: IconPolicy::FirstWorking,
                timeout: Duration::from_secs(15),
            },
            Strategy::Static {
                profile: ClientProfile::Firefox,
                warm_up: true,
                icons: IconPolicy::FirstWorking,
                timeout: Duration::from_secs(10),
            },
            Strategy::Static {
                profile: ClientProfile::Chrome,
                warm_up: false,
                icons: IconPolicy::All,
                timeout: Duration::from_secs(20),
            },
            Strategy::Headless,
        ]
    }
}

/// Executes strategies; holds one client per header profile
pub struct Extractor {
    chrome: reqwest::Client,
    firefox: reqwest::Client,
    icons: Arc<IconAcquirer>,
    headless: HeadlessFetcher,
}

impl Extractor {
    pub fn new(icons: Arc<IconAcquirer>, headless: HeadlessFetcher) -> Self {
        // Per-request timeouts come from the strategy; this is the ceiling
        let ceiling = Duration::from_secs(60);
        Self {
            chrome: ClientProfile::Chrome.build_client(ceiling),
            firefox: ClientProfile::Firefox.build_client(ceiling),
            icons,
            headless,
        }
    }

    pub fn icons(&self) -> &IconAcquirer {
        &self.icons
    }

    fn client(&self, profile: ClientProfile) -> &reqwest::Client {
        match profile {
            ClientProfile::Chrome => &self.chrome,
            ClientProfile::Firefox => &self.firefox,
        }
    }

    /// Run one strategy against `url`
    pub async fn extract(&self, strategy: &Strategy, url: &str) -> PageMetadata {
        match self.try_extract(strategy, url).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("{} failed for {}: {}", strategy.name(), url, e);
                PageMetadata::failed(e.to_string())
            }
        }
    }

    async fn try_extract(&self, strategy: &Strategy, url: &str) -> std::result::Result<PageMetadata, ScrapeError> {
        let page_url = parse_page_url(url)?;

        let (extracted, icon_policy) = match strategy {
            Strategy::Static { profile, warm_up: warm, icons, timeout } => {
                let client = self.client(*profile);
                if *warm {
                    warm_up(client, &page_url, *timeout).await;
                }
                let fetched = fetch_html(client, page_url.as_str(), *timeout).await?;
                (extract_page(&fetched.html, &fetched.final_url), *icons)
            }
            Strategy::Headless => {
                let html = self.headless.fetch_html(page_url.as_str()).await?;
                (extract_page(&html, &page_url), IconPolicy::FirstWorking)
            }
        };

        debug!(
            "{} extracted title={:?} and {} icon candidate(s) from {}",
            strategy.name(),
            extracted.title,
            extracted.icon_candidates.len(),
            url
        );

        Ok(self.finish(extracted, url, icon_policy).await)
    }

    /// Download icons and assemble the final metadata
    async fn finish(&self, extracted: ExtractedPage, url: &str, policy: IconPolicy) -> PageMetadata {
        let mut stored: Vec<(IconCandidate, String)> = Vec::new();
        for candidate in &extracted.icon_candidates {
            if let Some(path) = self.icons.acquire_candidate(candidate, url).await {
                stored.push((candidate.clone(), path));
                if policy == IconPolicy::FirstWorking {
                    break;
                }
            }
        }

        let (webicon, icon_candidates) = if stored.is_empty() {
            match self.icons.acquire_from_service(url).await {
                Some(path) => (path.clone(), vec![path]),
                None => (DEFAULT_FAVICON.to_string(), Vec::new()),
            }
        } else {
            let webicon = pick_webicon(&stored);
            let mut paths: Vec<String> = Vec::new();
            for (_, path) in stored {
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
            (webicon, paths)
        };

        info!("Metadata assembled for {} with icon {}", url, webicon);
        PageMetadata {
            title: extracted.title,
            description: extracted.description,
            webicon,
            icon_candidates,
            extra_metadata: extracted.extra_metadata,
            error: None,
        }
    }
}

/// Open Graph image, then apple-touch-icon, then the first stored candidate
pub fn pick_webicon(stored: &[(IconCandidate, String)]) -> String {
    [IconKind::OgImage, IconKind::AppleTouchIcon]
        .iter()
        .find_map(|kind| stored.iter().find(|(c, _)| c.kind == *kind))
        .or_else(|| stored.first())
        .map(|(_, path)| path.clone())
        .unwrap_or_else(|| DEFAULT_FAVICON.to_string())
}
