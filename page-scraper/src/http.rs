//! Browser-like HTTP client profiles
//!
//! Static strategies differ mainly in how much they look like a real
//! browser. Each profile carries its own user agent and header set; all of
//! them keep a cookie store so a warm-up request can collect session cookies.

use bookmark_manager_core::ScrapeError;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, UPGRADE_INSECURE_REQUESTS};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const CHROME_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
pub const FIREFOX_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0";

/// Largest HTML body read from a page
pub const MAX_HTML_BYTES: usize = 5 * 1024 * 1024;

const MAX_REDIRECTS: usize = 10;

/// Header profile a static strategy presents to the site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientProfile {
    Chrome,
    Firefox,
}

impl ClientProfile {
    pub fn user_agent(&self) -> &'static str {
        match self {
            ClientProfile::Chrome => CHROME_USER_AGENT,
            ClientProfile::Firefox => FIREFOX_USER_AGENT,
        }
    }

    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        match self {
            ClientProfile::Chrome => {
                headers.insert(
                    ACCEPT,
                    HeaderValue::from_static(
                        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
                    ),
                );
                headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
                headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
                headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
                headers.insert("sec-ch-ua-platform", HeaderValue::from_static("\"Windows\""));
                headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
                headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
                headers.insert("sec-fetch-site", HeaderValue::from_static("none"));
            }
            ClientProfile::Firefox => {
                headers.insert(
                    ACCEPT,
                    HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
                );
                headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
                headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
                headers.insert("dnt", HeaderValue::from_static("1"));
                headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            }
        }
        headers
    }

    /// Build a client for this profile
    ///
    /// `timeout` bounds each whole request; strategies may tighten it per
    /// request.
    pub fn build_client(&self, timeout: Duration) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(self.user_agent())
            .default_headers(self.default_headers())
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to a plain HTTP client for {:?}: {}", self, e);
                reqwest::Client::new()
            })
    }
}

/// HTML body of a successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects; relative links resolve against it
    pub final_url: Url,
    pub html: String,
}

/// Parse a user-supplied page URL; only http and https are fetched
pub fn parse_page_url(url: &str) -> Result<Url, ScrapeError> {
    let parsed = Url::parse(url.trim()).map_err(|_| ScrapeError::InvalidUrl { url: url.to_string() })?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        _ => Err(ScrapeError::InvalidUrl { url: url.to_string() }),
    }
}

/// Map a reqwest failure onto the scrape taxonomy
pub fn transport_error(url: &str, e: &reqwest::Error) -> ScrapeError {
    if e.is_timeout() {
        ScrapeError::Timeout { url: url.to_string() }
    } else if let Some(status) = e.status() {
        ScrapeError::HttpStatus { url: url.to_string(), status: status.as_u16() }
    } else {
        ScrapeError::Transport { url: url.to_string(), details: e.to_string() }
    }
}

/// GET a page and return its (size-capped) HTML
pub async fn fetch_html(client: &reqwest::Client, url: &str, timeout: Duration) -> Result<FetchedPage, ScrapeError> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| transport_error(url, &e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::HttpStatus { url: url.to_string(), status: status.as_u16() });
    }

    let final_url = response.url().clone();
    if final_url.as_str() != url {
        debug!("{} redirected to {}", url, final_url);
    }

    let body = read_capped(response, url, MAX_HTML_BYTES).await?;

    Ok(FetchedPage {
        final_url,
        html: String::from_utf8_lossy(&body).into_owned(),
    })
}

/// Stream a response body, stopping once `limit` bytes are in hand
///
/// Longer bodies are truncated; the rest is never read.
pub async fn read_capped(response: reqwest::Response, url: &str, limit: usize) -> Result<Vec<u8>, ScrapeError> {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| transport_error(url, &e))?;
        let room = limit - body.len();
        if chunk.len() >= room {
            body.extend_from_slice(&chunk[..room]);
            debug!("Body of {} truncated at {} bytes", url, limit);
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Request the site root so the cookie store picks up session cookies
pub async fn warm_up(client: &reqwest::Client, page_url: &Url, timeout: Duration) {
    let mut root = page_url.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);

    match client.get(root.as_str()).timeout(timeout).send().await {
        Ok(response) => debug!("Warm-up request to {} returned {}", root, response.status()),
        Err(e) => debug!("Warm-up request to {} failed: {}", root, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FixtureServer, Route};

    #[test]
    fn test_parse_page_url_accepts_http_only() {
        assert!(parse_page_url("https://example.com/a").is_ok());
        assert!(parse_page_url(" http://example.com ").is_ok());
        assert!(matches!(parse_page_url("ftp://example.com"), Err(ScrapeError::InvalidUrl { .. })));
        assert!(matches!(parse_page_url("example.com"), Err(ScrapeError::InvalidUrl { .. })));
        assert!(matches!(parse_page_url("javascript:alert(1)"), Err(ScrapeError::InvalidUrl { .. })));
    }

    #[test]
    fn test_profiles_differ() {
        assert_ne!(ClientProfile::Chrome.user_agent(), ClientProfile::Firefox.user_agent());
        assert!(ClientProfile::Firefox.default_headers().contains_key("dnt"));
        assert!(ClientProfile::Chrome.default_headers().contains_key("sec-fetch-mode"));
    }

    #[tokio::test]
    async fn test_body_read_stops_at_cap() {
        let server = FixtureServer::start(vec![Route::new("/big", "text/html", vec![b'a'; 256 * 1024])]).await;
        let client = ClientProfile::Chrome.build_client(Duration::from_secs(5));
        let url = server.url("/big");
        let response = client.get(&url).send().await.unwrap();

        let body = read_capped(response, &url, 1000).await.unwrap();
        assert_eq!(body.len(), 1000);
    }

    #[tokio::test]
    async fn test_oversized_page_is_truncated() {
        let mut html = b"<html><head><title>Huge</title></head><body>".to_vec();
        html.resize(MAX_HTML_BYTES + 64 * 1024, b'x');
        let server = FixtureServer::start(vec![Route::new("/", "text/html", html)]).await;
        let client = ClientProfile::Chrome.build_client(Duration::from_secs(10));

        let page = fetch_html(&client, &server.url("/"), Duration::from_secs(10)).await.unwrap();
        assert_eq!(page.html.len(), MAX_HTML_BYTES);
        assert!(page.html.starts_with("<html><head><title>Huge"));
    }
}
