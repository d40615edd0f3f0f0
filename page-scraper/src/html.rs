//! HTML metadata extraction
//!
//! Parses a page with a tolerant HTML parser and pulls out everything the
//! strategies need. The parsed DOM is not `Send`, so extraction is a plain
//! synchronous function returning owned data.
//!
//! # Features
//! - Title fallback chain: `<title>`, `og:title`, `twitter:title`, first `<h1>`
//! - Description fallback chain: `description`, `og:description`, `twitter:description`
//! - Icon candidates from `<link rel=icon>`, `apple-touch-icon` and `og:image`,
//!   plus a `/favicon.ico` guess, deduplicated in first-seen order
//! - Every `og:*` and `twitter:*` meta value captured as extra metadata

use bookmark_manager_core::{ExtraMetadata, IconKind};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// A remote icon URL and where on the page it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconCandidate {
    pub url: String,
    pub kind: IconKind,
}

/// Owned extraction result of one HTML document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedPage {
    pub title: String,
    pub description: String,
    pub icon_candidates: Vec<IconCandidate>,
    pub extra_metadata: ExtraMetadata,
}

/// Extract metadata from `html` served at `page_url`
pub fn extract_page(html: &str, page_url: &Url) -> ExtractedPage {
    let document = Html::parse_document(html);
    let base = base_url(&document, page_url);
    let meta = collect_meta(&document);

    let title = first_text(&document, "title")
        .or_else(|| meta_value(&meta, "og:title"))
        .or_else(|| meta_value(&meta, "twitter:title"))
        .or_else(|| first_text(&document, "h1"))
        .unwrap_or_default();

    let description = meta_value(&meta, "description")
        .or_else(|| meta_value(&meta, "og:description"))
        .or_else(|| meta_value(&meta, "twitter:description"))
        .unwrap_or_default();

    let mut extra_metadata = ExtraMetadata::new();
    for (key, value) in &meta {
        if (key.starts_with("og:") || key.starts_with("twitter:")) && !extra_metadata.contains_key(key) {
            extra_metadata.insert(key.clone(), serde_json::Value::String(value.clone()));
        }
    }

    ExtractedPage {
        title,
        description,
        icon_candidates: icon_candidates(&document, &meta, &base),
        extra_metadata,
    }
}

/// `<base href>` wins over the page URL when present and valid
fn base_url(document: &Html, page_url: &Url) -> Url {
    select_first(document, "base[href]")
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone())
}

fn select_first<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    document.select(&selector).next()
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let element = select_first(document, css)?;
    let text = element.text().collect::<Vec<_>>().join(" ");
    let text = collapse_whitespace(&text);
    (!text.is_empty()).then_some(text)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `(lower-cased name or property, content)` for every `<meta>` in document order
fn collect_meta(document: &Html) -> Vec<(String, String)> {
    let Ok(selector) = Selector::parse("meta[content]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|el| {
            let attrs = el.value();
            let key = attrs.attr("property").or_else(|| attrs.attr("name"))?;
            let content = attrs.attr("content")?.trim();
            Some((key.trim().to_lowercase(), content.to_string()))
        })
        .collect()
}

/// First non-empty value for a meta key
fn meta_value(meta: &[(String, String)], key: &str) -> Option<String> {
    meta.iter()
        .find(|(k, v)| k == key && !v.is_empty())
        .map(|(_, v)| collapse_whitespace(v))
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let resolved = base.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

fn icon_candidates(document: &Html, meta: &[(String, String)], base: &Url) -> Vec<IconCandidate> {
    let mut candidates = Vec::new();

    if let Ok(selector) = Selector::parse("link[rel][href]") {
        for link in document.select(&selector) {
            let attrs = link.value();
            let rel = attrs.attr("rel").unwrap_or_default().to_lowercase();
            let tokens: Vec<&str> = rel.split_whitespace().collect();

            let kind = if tokens.iter().any(|t| t.starts_with("apple-touch-icon")) {
                IconKind::AppleTouchIcon
            } else if tokens.contains(&"icon") {
                let href = attrs.attr("href").unwrap_or_default();
                if href.to_lowercase().contains("favicon") {
                    IconKind::Favicon
                } else {
                    IconKind::Other
                }
            } else {
                continue;
            };

            if let Some(url) = attrs.attr("href").and_then(|href| resolve(base, href)) {
                candidates.push(IconCandidate { url, kind });
            }
        }
    }

    for (key, value) in meta {
        if key == "og:image" {
            if let Some(url) = resolve(base, value) {
                candidates.push(IconCandidate { url, kind: IconKind::OgImage });
                break;
            }
        }
    }

    if let Some(url) = resolve(base, "/favicon.ico") {
        candidates.push(IconCandidate { url, kind: IconKind::Favicon });
    }

    let mut seen = HashSet::new();
    candidates.retain(|c| seen.insert(c.url.clone()));
    candidates
}
