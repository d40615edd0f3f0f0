//! Shared data model for the bookmark manager
//!
//! Holds the persisted [`Bookmark`] record, the [`PageMetadata`] payload the
//! scraping pipeline produces, and the small enums the pipeline and the
//! organizer exchange (icon kinds, network categories, display groups).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Web path of the shared fallback icon
pub const DEFAULT_FAVICON: &str = "/static/favicon.ico";

/// Title reported when every extraction strategy failed
pub const NO_TITLE: &str = "No title";

/// Open key-value map for Open Graph fields and other page extras
pub type ExtraMetadata = serde_json::Map<String, serde_json::Value>;

/// Auto-increment bookmark identifier assigned by the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkId(pub i64);

impl fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted bookmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: BookmarkId,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub webicon: String,
    #[serde(default)]
    pub icon_candidates: Vec<String>,
    pub extra_metadata: Option<ExtraMetadata>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub is_favorite: bool,
    pub click_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub full_text_content: Option<String>,
    pub content_fetched_at: Option<DateTime<Utc>>,
}

impl Bookmark {
    /// Tags with surrounding whitespace removed, blank entries skipped
    pub fn clean_tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty())
    }

    /// True when the bookmark carries no non-blank tag
    pub fn is_untagged(&self) -> bool {
        self.clean_tags().next().is_none()
    }

    /// Lower-cased host of the bookmark URL, if it parses
    pub fn host(&self) -> Option<String> {
        host_of(&self.url)
    }
}

/// Payload for creating a bookmark
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewBookmark {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub webicon: Option<String>,
    #[serde(default)]
    pub icon_candidates: Vec<String>,
    pub extra_metadata: Option<ExtraMetadata>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_favorite: bool,
}

impl NewBookmark {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookmarkUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_favorite: Option<bool>,
    pub webicon: Option<String>,
    pub icon_candidates: Option<Vec<String>>,
    pub extra_metadata: Option<ExtraMetadata>,
}

impl BookmarkUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.tags.is_none()
            && self.is_favorite.is_none()
            && self.webicon.is_none()
            && self.icon_candidates.is_none()
            && self.extra_metadata.is_none()
    }
}

/// Result of a metadata extraction attempt
///
/// A failed attempt is still a `PageMetadata`: `error` is set and the other
/// fields carry safe defaults, so callers never have to handle a panic or an
/// exception from the scraping pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
    pub webicon: String,
    pub icon_candidates: Vec<String>,
    #[serde(default)]
    pub extra_metadata: ExtraMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageMetadata {
    /// Empty, successful result with the default icon
    pub fn empty() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            webicon: DEFAULT_FAVICON.to_string(),
            icon_candidates: Vec::new(),
            extra_metadata: ExtraMetadata::new(),
            error: None,
        }
    }

    /// Structured error result for a single failed strategy
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::empty()
        }
    }

    /// Best-effort payload returned when every strategy failed
    pub fn exhausted(reason: impl Into<String>) -> Self {
        Self {
            title: NO_TITLE.to_string(),
            error: Some(reason.into()),
            ..Self::empty()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }

    pub fn has_custom_icon(&self) -> bool {
        !self.webicon.is_empty() && self.webicon != DEFAULT_FAVICON
    }
}

/// Where an icon candidate came from; decides its on-disk name and priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IconKind {
    Favicon,
    AppleTouchIcon,
    OgImage,
    Other,
}

impl IconKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IconKind::Favicon => "favicon",
            IconKind::AppleTouchIcon => "apple-touch-icon",
            IconKind::OgImage => "og-image",
            IconKind::Other => "other",
        }
    }

    /// Guess the kind from a bare URL when the source element is unknown
    pub fn from_url(url: &str) -> Self {
        let lower = url.to_lowercase();
        if lower.contains("apple-touch-icon") {
            IconKind::AppleTouchIcon
        } else if lower.contains("og-image") || lower.contains("og:image") {
            IconKind::OgImage
        } else if lower.contains("favicon") {
            IconKind::Favicon
        } else {
            IconKind::Other
        }
    }
}

impl fmt::Display for IconKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address-space classification of a bookmark host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NetworkCategory {
    Local,
    LocalOffline,
    Vpn,
    Remote,
    Ipv6Host,
    UnresolvableHost,
    InvalidUrl,
}

impl NetworkCategory {
    /// Every category, in display order
    pub const ALL: [NetworkCategory; 7] = [
        NetworkCategory::Local,
        NetworkCategory::LocalOffline,
        NetworkCategory::Vpn,
        NetworkCategory::Remote,
        NetworkCategory::Ipv6Host,
        NetworkCategory::UnresolvableHost,
        NetworkCategory::InvalidUrl,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            NetworkCategory::Local => "Local",
            NetworkCategory::LocalOffline => "Local (Offline)",
            NetworkCategory::Vpn => "VPN",
            NetworkCategory::Remote => "Remote",
            NetworkCategory::Ipv6Host => "IPv6 Host",
            NetworkCategory::UnresolvableHost => "Unresolvable Host",
            NetworkCategory::InvalidUrl => "Invalid URL Structure",
        }
    }

    /// Machine tag suitable for storing on a bookmark
    pub fn tag(&self) -> &'static str {
        match self {
            NetworkCategory::Local => "local-server",
            NetworkCategory::LocalOffline => "local-server-offline",
            NetworkCategory::Vpn => "vpn-server",
            NetworkCategory::Remote => "remote-server",
            NetworkCategory::Ipv6Host => "ipv6-server",
            NetworkCategory::UnresolvableHost => "unresolvable-server",
            NetworkCategory::InvalidUrl => "invalid-url-structure",
        }
    }

    /// Bucket name used by the categorization view
    pub fn display_name(&self) -> &'static str {
        match self {
            NetworkCategory::Local => "Local Network",
            NetworkCategory::LocalOffline => "Local Network (Offline)",
            NetworkCategory::Vpn => "VPN Network",
            NetworkCategory::Remote => "Remote Servers",
            NetworkCategory::Ipv6Host => "IPv6 Hosts",
            NetworkCategory::UnresolvableHost => "Unresolvable Hosts",
            NetworkCategory::InvalidUrl => "Invalid URLs",
        }
    }
}

impl fmt::Display for NetworkCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of classifying a URL's host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkClassification {
    pub category: NetworkCategory,
    pub reachable: bool,
}

/// One labelled bucket of the categorized view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkGroup {
    pub label: String,
    pub bookmarks: Vec<Bookmark>,
}

impl BookmarkGroup {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            bookmarks: Vec::new(),
        }
    }
}

/// Lower-cased host of a URL; tolerates a missing scheme
pub fn host_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).or_else(|_| url::Url::parse(&format!("http://{}", url)));
    parsed
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_matches(|c| c == '[' || c == ']').to_lowercase()))
        .filter(|h| !h.is_empty())
}

/// Filesystem-safe domain key: `example.com:8080` becomes `example_com_8080`
pub fn normalize_domain(url_or_host: &str) -> String {
    let parsed = url::Url::parse(url_or_host)
        .or_else(|_| url::Url::parse(&format!("http://{}", url_or_host)))
        .ok();

    let raw = match parsed.as_ref().and_then(|u| u.host_str().map(|h| (h, u.port()))) {
        Some((host, Some(port))) => format!("{}:{}", host, port),
        Some((host, None)) => host.to_string(),
        None => url_or_host.to_string(),
    };

    raw.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}

/// Capitalize the first character: `video` -> `Video`
pub fn display_label(tag: &str) -> String {
    let mut chars = tag.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("https://example.com/page"), "example_com");
        assert_eq!(normalize_domain("example.com"), "example_com");
        assert_eq!(normalize_domain("http://192.168.1.10:8080/"), "192_168_1_10_8080");
        assert_eq!(normalize_domain("https://Sub.Example.org"), "sub_example_org");
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://www.YouTube.com/watch?v=1"), Some("www.youtube.com".to_string()));
        assert_eq!(host_of("github.com/rust-lang"), Some("github.com".to_string()));
        assert_eq!(host_of("http://[::1]:8080/"), Some("::1".to_string()));
    }

    #[test]
    fn test_page_metadata_defaults() {
        let failed = PageMetadata::failed("HTTP 503");
        assert!(failed.is_error());
        assert_eq!(failed.webicon, DEFAULT_FAVICON);
        assert!(!failed.has_custom_icon());

        let exhausted = PageMetadata::exhausted("all strategies failed");
        assert_eq!(exhausted.title, NO_TITLE);
        assert!(exhausted.icon_candidates.is_empty());
    }

    #[test]
    fn test_network_category_tags_are_distinct() {
        let mut tags: Vec<_> = NetworkCategory::ALL.iter().map(|c| c.tag()).collect();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), NetworkCategory::ALL.len());
    }

    #[test]
    fn test_icon_kind_from_url() {
        assert_eq!(IconKind::from_url("https://x.com/apple-touch-icon.png"), IconKind::AppleTouchIcon);
        assert_eq!(IconKind::from_url("https://x.com/favicon-32.png"), IconKind::Favicon);
        assert_eq!(IconKind::from_url("https://x.com/logo.svg"), IconKind::Other);
    }

    #[test]
    fn test_display_label() {
        assert_eq!(display_label("video"), "Video");
        assert_eq!(display_label(""), "");
    }
}
