//! Reachability probing

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Boolean oracle: does the URL answer within the timeout?
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Never fails; any error counts as unreachable
    async fn is_online(&self, url: &str, timeout: Duration) -> bool;
}

/// GET-based probe that retries with the other scheme on connection or TLS failure
pub struct HttpReachability {
    client: reqwest::Client,
}

impl HttpReachability {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(crate::http::CHROME_USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl Default for HttpReachability {
    fn default() -> Self {
        Self::new()
    }
}

/// The URL as given, then the same URL with http and https swapped
///
/// A URL without a scheme is tried as http first.
pub fn probe_candidates(url: &str) -> Vec<String> {
    let trimmed = url.trim();
    let parsed = match Url::parse(trimmed) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => u,
        _ => match Url::parse(&format!("http://{}", trimmed)) {
            Ok(u) => u,
            Err(_) => return Vec::new(),
        },
    };

    let mut alternate = parsed.clone();
    let other = if parsed.scheme() == "http" { "https" } else { "http" };
    let mut candidates = vec![parsed.to_string()];
    if alternate.set_scheme(other).is_ok() {
        candidates.push(alternate.to_string());
    }
    candidates
}

#[async_trait]
impl ReachabilityProbe for HttpReachability {
    async fn is_online(&self, url: &str, timeout: Duration) -> bool {
        for candidate in probe_candidates(url) {
            match self.client.get(&candidate).timeout(timeout).send().await {
                Ok(response) => {
                    debug!("{} answered {}", candidate, response.status());
                    return response.status().is_success();
                }
                Err(e) if e.is_connect() || e.is_request() => {
                    // TLS handshake failures surface as connect errors
                    debug!("{} unreachable ({}), trying alternate scheme", candidate, e);
                    continue;
                }
                Err(e) => {
                    debug!("{} probe failed: {}", candidate, e);
                    return false;
                }
            }
        }
        false
    }
}
