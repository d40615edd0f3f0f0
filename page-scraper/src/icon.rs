//! Icon acquisition
//!
//! Downloads a candidate icon, validates it and stores it in the static
//! area under a stable per-domain name.
//!
//! # Features
//! - Browser-like request headers with the page as `Referer`
//! - Content-type / extension checks and a streamed 1 MiB ceiling
//! - Temp-file staging: decode check and thumbnailing happen before the
//!   atomic rename, so a rejected download never leaves a file behind
//! - Third-party favicon service as the last remote resort

use bookmark_manager_core::*;
use data_access::StaticArea;
use futures_util::StreamExt;
use image::ImageReader;
use reqwest::header::{ACCEPT, CONTENT_TYPE, REFERER};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use url::Url;

use crate::http::CHROME_USER_AGENT;
use crate::html::IconCandidate;

/// Extensions accepted for stored icons
pub const ICON_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "ico", "svg", "webp", "bmp"];

/// Configuration for icon acquisition
#[derive(Debug, Clone)]
pub struct IconAcquirerConfig {
    /// Timeout for a single icon download in seconds
    pub timeout_secs: u64,
    /// Largest accepted payload in bytes
    pub max_icon_bytes: u64,
    /// Icons wider or taller than this are thumbnailed
    pub thumbnail_size: u32,
    /// User agent string for icon requests
    pub user_agent: String,
    /// Favicon service URL template; `{domain}` is replaced by the page host
    pub favicon_service: String,
}

impl Default for IconAcquirerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            max_icon_bytes: 1024 * 1024, // 1MB
            thumbnail_size: 64,
            user_agent: CHROME_USER_AGENT.to_string(),
            favicon_service: "https://icons.duckduckgo.com/ip3/{domain}.ico".to_string(),
        }
    }
}

/// Downloads and stores validated icons
pub struct IconAcquirer {
    client: reqwest::Client,
    static_area: StaticArea,
    config: IconAcquirerConfig,
}

impl IconAcquirer {
    pub fn new(static_area: StaticArea) -> Self {
        Self::with_config(static_area, IconAcquirerConfig::default())
    }

    pub fn with_config(static_area: StaticArea, config: IconAcquirerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, static_area, config }
    }

    pub fn config(&self) -> &IconAcquirerConfig {
        &self.config
    }

    pub fn static_area(&self) -> &StaticArea {
        &self.static_area
    }

    /// Acquire an icon whose origin on the page is unknown
    ///
    /// The kind is guessed from the URL and the icon is filed under the
    /// referer's domain (or the icon's own host without a referer).
    pub async fn acquire_icon(&self, candidate_url: &str, referer: &str) -> Option<String> {
        let owner = if referer.trim().is_empty() { candidate_url } else { referer };
        let domain_key = normalize_domain(owner);
        self.acquire(candidate_url, referer, &domain_key, IconKind::from_url(candidate_url)).await
    }

    /// Acquire an icon found on `page_url`
    pub async fn acquire_candidate(&self, candidate: &IconCandidate, page_url: &str) -> Option<String> {
        let domain_key = normalize_domain(page_url);
        self.acquire(&candidate.url, page_url, &domain_key, candidate.kind).await
    }

    /// Ask the third-party favicon service for the page's icon
    pub async fn acquire_from_service(&self, page_url: &str) -> Option<String> {
        let host = host_of(page_url)?;
        let service_url = self.config.favicon_service.replace("{domain}", &host);
        let domain_key = normalize_domain(page_url);
        self.acquire(&service_url, "", &domain_key, IconKind::Favicon).await
    }

    async fn acquire(&self, icon_url: &str, referer: &str, domain_key: &str, kind: IconKind) -> Option<String> {
        if domain_key.is_empty() {
            return None;
        }

        match self.download(icon_url, referer, domain_key, kind).await {
            Ok(web_path) => {
                info!("Stored icon {} as {}", icon_url, web_path);
                Some(web_path)
            }
            Err(e) => {
                warn!("Icon {} rejected: {}", icon_url, e);
                None
            }
        }
    }

    async fn download(
        &self,
        icon_url: &str,
        referer: &str,
        domain_key: &str,
        kind: IconKind,
    ) -> std::result::Result<String, IconError> {
        let parsed = Url::parse(icon_url).map_err(|e| IconError::Transport {
            details: format!("invalid icon URL {}: {}", icon_url, e),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(IconError::Transport {
                details: format!("unsupported scheme: {}", parsed.scheme()),
            });
        }

        let mut request = self.client.get(parsed.as_str()).header(ACCEPT, "image/*,*/*;q=0.8");
        if !referer.is_empty() {
            request = request.header(REFERER, referer);
        }
        let response = request
            .send()
            .await
            .map_err(|e| IconError::Transport { details: e.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            return Err(IconError::HttpStatus { url: icon_url.to_string(), status: status.as_u16() });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or_default().trim().to_lowercase())
            .unwrap_or_default();
        let url_extension = extension_from_url(&parsed);
        check_content_type(icon_url, &content_type, url_extension.as_deref())?;

        let limit = self.config.max_icon_bytes;
        if let Some(length) = response.content_length() {
            if length > limit {
                return Err(IconError::TooLarge { size: length, limit });
            }
        }

        let extension = url_extension
            .or_else(|| extension_from_content_type(&content_type).map(str::to_string))
            .unwrap_or_else(|| "png".to_string());

        let dir = self.static_area.icons_dir(domain_key);
        tokio::fs::create_dir_all(&dir).await?;
        let mut staged = NamedTempFile::new_in(&dir)?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| IconError::Transport { details: e.to_string() })?;
            written += chunk.len() as u64;
            if written > limit {
                return Err(IconError::TooLarge { size: written, limit });
            }
            staged.write_all(&chunk)?;
        }
        staged.flush()?;

        if written == 0 {
            return Err(IconError::Empty { url: icon_url.to_string() });
        }

        let staged_path = staged.path().to_path_buf();
        let is_svg = extension == "svg" || content_type.contains("svg");
        let target = self.config.thumbnail_size;
        tokio::task::spawn_blocking(move || verify_icon(&staged_path, is_svg, target))
            .await
            .map_err(|e| IconError::Undecodable { details: e.to_string() })??;

        let final_path = dir.join(format!("{}.{}", kind.as_str(), extension));
        staged.persist(&final_path).map_err(|e| IconError::IO { source: e.error })?;
        debug!("Persisted {} bytes to {}", written, final_path.display());

        self.static_area.web_path(&final_path).map_err(|e| IconError::IO {
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })
    }
}

/// Lower-cased extension of the URL path when it is a known image type
pub fn extension_from_url(url: &Url) -> Option<String> {
    let file_name = url.path_segments()?.last()?;
    let extension = Path::new(file_name).extension()?.to_str()?.to_lowercase();
    ICON_EXTENSIONS.contains(&extension.as_str()).then_some(extension)
}

/// Extension implied by an image content type
pub fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/x-icon" | "image/vnd.microsoft.icon" | "image/ico" | "image/icon" => Some("ico"),
        "image/svg+xml" => Some("svg"),
        "image/webp" => Some("webp"),
        "image/bmp" | "image/x-ms-bmp" => Some("bmp"),
        _ => None,
    }
}

/// `image/*` passes; an absent or generic binary type passes only with a
/// known image extension; everything else is rejected
pub fn check_content_type(
    url: &str,
    content_type: &str,
    url_extension: Option<&str>,
) -> std::result::Result<(), IconError> {
    if content_type.starts_with("image/") {
        return Ok(());
    }
    let generic = content_type.is_empty() || content_type == "application/octet-stream";
    if generic && url_extension.is_some() {
        return Ok(());
    }
    Err(IconError::NotAnImage {
        url: url.to_string(),
        content_type: if content_type.is_empty() { "unknown".to_string() } else { content_type.to_string() },
    })
}

/// Decode check plus in-place thumbnailing of the staged file
fn verify_icon(path: &Path, is_svg: bool, target: u32) -> std::result::Result<(), IconError> {
    if is_svg {
        let bytes = std::fs::read(path)?;
        let text = std::str::from_utf8(&bytes).map_err(|_| IconError::Undecodable {
            details: "SVG is not valid UTF-8".to_string(),
        })?;
        if !text.to_lowercase().contains("<svg") {
            return Err(IconError::Undecodable { details: "no <svg> element".to_string() });
        }
        return Ok(());
    }

    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let format = reader.format().ok_or_else(|| IconError::Undecodable {
        details: "unrecognized image format".to_string(),
    })?;
    let decoded = reader.decode().map_err(|e| IconError::Undecodable { details: e.to_string() })?;

    if decoded.width() > target || decoded.height() > target {
        let thumbnail = decoded.thumbnail(target, target);
        if let Err(e) = thumbnail.save_with_format(path, format) {
            // The original bytes are still a valid image
            warn!("Could not re-encode {:?} thumbnail, keeping full size: {}", format, e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{png_bytes, FixtureServer, Route};

    fn acquirer() -> (tempfile::TempDir, IconAcquirer) {
        let dir = tempfile::tempdir().unwrap();
        let acquirer = IconAcquirer::new(StaticArea::new(dir.path().join("static")));
        (dir, acquirer)
    }

    fn leftover_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn test_content_type_rules() {
        assert!(check_content_type("u", "image/png", None).is_ok());
        assert!(check_content_type("u", "", Some("ico")).is_ok());
        assert!(check_content_type("u", "application/octet-stream", Some("png")).is_ok());
        assert!(check_content_type("u", "application/octet-stream", None).is_err());
        assert!(check_content_type("u", "text/html", Some("png")).is_err());
    }

    #[test]
    fn test_extension_from_url_strips_query() {
        let url = Url::parse("https://example.com/img/Logo.PNG?v=3").unwrap();
        assert_eq!(extension_from_url(&url).as_deref(), Some("png"));
        let url = Url::parse("https://example.com/icon").unwrap();
        assert_eq!(extension_from_url(&url), None);
        let url = Url::parse("https://example.com/page.html").unwrap();
        assert_eq!(extension_from_url(&url), None);
    }

    #[tokio::test]
    async fn test_valid_icon_is_thumbnailed_and_stored() {
        let server = FixtureServer::start(vec![Route::new("/big.png", "image/png", png_bytes(128, 96))]).await;
        let (_dir, acquirer) = acquirer();

        let web = acquirer
            .acquire_icon(&server.url("/big.png"), "https://example.com/page")
            .await
            .unwrap();

        assert_eq!(web, "/static/icons/example_com/other.png");
        let path = acquirer.static_area().resolve(&web).unwrap();
        let stored = image::open(&path).unwrap();
        assert_eq!((stored.width(), stored.height()), (64, 48));
        assert_eq!(leftover_files(&acquirer.static_area().icons_dir("example_com")), vec!["other.png"]);
    }

    #[tokio::test]
    async fn test_candidate_kind_names_the_file() {
        let server = FixtureServer::start(vec![Route::new("/touch", "image/png", png_bytes(16, 16))]).await;
        let (_dir, acquirer) = acquirer();
        let candidate = IconCandidate { url: server.url("/touch"), kind: IconKind::AppleTouchIcon };

        let web = acquirer.acquire_candidate(&candidate, "https://example.com/").await.unwrap();
        assert_eq!(web, "/static/icons/example_com/apple-touch-icon.png");
    }

    #[tokio::test]
    async fn test_html_payload_is_rejected() {
        let server = FixtureServer::start(vec![Route::new("/favicon.ico", "text/html", b"<html></html>".to_vec())]).await;
        let (_dir, acquirer) = acquirer();

        assert!(acquirer.acquire_icon(&server.url("/favicon.ico"), "https://example.com").await.is_none());
        assert!(leftover_files(&acquirer.static_area().icons_dir("example_com")).is_empty());
    }

    #[tokio::test]
    async fn test_oversized_payload_leaves_no_temp_file() {
        let server = FixtureServer::start(vec![Route::new("/huge.png", "image/png", vec![0u8; 1024 * 1024 + 10])]).await;
        let (_dir, acquirer) = acquirer();

        assert!(acquirer.acquire_icon(&server.url("/huge.png"), "https://example.com").await.is_none());
        assert!(leftover_files(&acquirer.static_area().icons_dir("example_com")).is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_image_is_discarded() {
        let server = FixtureServer::start(vec![Route::new("/broken.png", "image/png", b"not really a png".to_vec())]).await;
        let (_dir, acquirer) = acquirer();

        assert!(acquirer.acquire_icon(&server.url("/broken.png"), "https://example.com").await.is_none());
        assert!(leftover_files(&acquirer.static_area().icons_dir("example_com")).is_empty());
    }

    #[tokio::test]
    async fn test_svg_is_accepted_without_decoding() {
        let svg = br#"<?xml version="1.0"?><svg xmlns="http://www.w3.org/2000/svg"></svg>"#.to_vec();
        let server = FixtureServer::start(vec![Route::new("/logo.svg", "image/svg+xml", svg)]).await;
        let (_dir, acquirer) = acquirer();

        let web = acquirer.acquire_icon(&server.url("/logo.svg"), "https://example.com").await.unwrap();
        assert_eq!(web, "/static/icons/example_com/other.svg");
    }

    #[tokio::test]
    async fn test_missing_icon_returns_none() {
        let server = FixtureServer::start(vec![]).await;
        let (_dir, acquirer) = acquirer();

        assert!(acquirer.acquire_icon(&server.url("/favicon.ico"), "https://example.com").await.is_none());
    }
}
