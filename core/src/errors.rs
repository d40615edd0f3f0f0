use thiserror::Error;
use crate::types::BookmarkId;

/// Page fetching and metadata extraction errors
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Request failed for {url}: {details}")]
    Transport { url: String, details: String },

    #[error("Request timed out: {url}")]
    Timeout { url: String },

    #[error("Anti-bot interstitial detected: {title}")]
    Interstitial { title: String },

    #[error("Page carried no usable metadata: {url}")]
    EmptyPage { url: String },

    #[error("Headless browser failure: {details}")]
    Browser { details: String },
}

/// Icon download and validation errors
#[derive(Debug, Error)]
pub enum IconError {
    #[error("HTTP {status} for icon {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Not an image: {url} ({content_type})")]
    NotAnImage { url: String, content_type: String },

    #[error("Icon too large: {size} bytes > {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("Icon payload is empty: {url}")]
    Empty { url: String },

    #[error("Icon failed to decode: {details}")]
    Undecodable { details: String },

    #[error("Icon request failed: {details}")]
    Transport { details: String },

    #[error("Icon storage failed: {source}")]
    IO {
        #[from]
        source: std::io::Error,
    },
}

/// Persistence and static file area errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Bookmark not found: {id}")]
    NotFound { id: BookmarkId },

    #[error("A bookmark for this URL already exists: {url}")]
    DuplicateUrl { url: String },

    #[error("Database error: {details}")]
    Database { details: String },

    #[error("Path escapes the static area: {path}")]
    InvalidStaticPath { path: String },
}

/// Tag vocabulary, suggestion and clustering errors
#[derive(Debug, Error)]
pub enum TaggingError {
    #[error("Failed to persist tag vocabulary: {details}")]
    VocabularyPersist { details: String },

    #[error("Vectorization produced no features")]
    EmptyFeatureSpace,

    #[error("Clustering failed: {reason}")]
    ClusteringFailed { reason: String },
}

/// General system errors
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("Configuration error: {details}")]
    Configuration { details: String },

    #[error("IO error: {source}")]
    IO {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

/// Main error type for the bookmark manager
#[derive(Debug, Error)]
pub enum BookmarkManagerError {
    #[error("Scrape error: {source}")]
    Scrape {
        #[from]
        source: ScrapeError,
    },

    #[error("Icon error: {source}")]
    Icon {
        #[from]
        source: IconError,
    },

    #[error("Storage error: {source}")]
    Storage {
        #[from]
        source: StorageError,
    },

    #[error("Tagging error: {source}")]
    Tagging {
        #[from]
        source: TaggingError,
    },

    #[error("System error: {source}")]
    System {
        #[from]
        source: SystemError,
    },
}

impl From<std::io::Error> for BookmarkManagerError {
    fn from(source: std::io::Error) -> Self {
        BookmarkManagerError::System {
            source: SystemError::IO { source },
        }
    }
}

impl From<serde_json::Error> for BookmarkManagerError {
    fn from(source: serde_json::Error) -> Self {
        BookmarkManagerError::System {
            source: SystemError::Serialization { source },
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, BookmarkManagerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = BookmarkManagerError::from(StorageError::DuplicateUrl {
            url: "https://example.com".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Storage error: A bookmark for this URL already exists: https://example.com"
        );

        let err = ScrapeError::HttpStatus { url: "https://a.b".to_string(), status: 503 };
        assert_eq!(err.to_string(), "HTTP 503 for https://a.b");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: BookmarkManagerError = io.into();
        assert!(matches!(err, BookmarkManagerError::System { source: SystemError::IO { .. } }));
    }
}
