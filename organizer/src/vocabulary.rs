//! Tag vocabulary store
//!
//! A fixed base list of topic words plus a user list that grows whenever a
//! user assigns a tag the store has never seen. The user list is persisted
//! as a JSON array of strings and rewritten wholesale on every change.
//!
//! # Features
//! - Tolerant loading: a missing, unreadable or malformed file falls back to
//!   the seed list
//! - Case-sensitive dedup on append, case-insensitive lookup for bucketing
//! - Append and file rewrite happen under one lock; a failed write rolls the
//!   in-memory list back

use bookmark_manager_core::TaggingError;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Curated topic words. Includes every content type word from the domain
/// table so domain-derived tags always bucket.
pub const BASE_VOCABULARY: &[&str] = &[
    "video", "code", "programming", "documentation", "reference", "research", "blog", "social",
    "news", "shopping", "music", "education", "design", "productivity", "cloud", "gaming",
    "rust", "python", "javascript", "typescript", "java", "golang", "web", "frontend", "backend",
    "database", "linux", "devops", "docker", "kubernetes", "security", "networking", "api",
    "tutorial", "tools", "software", "hardware", "science", "math", "ai", "machine", "learning",
    "data", "finance", "business", "travel", "food", "recipes", "health", "fitness", "sports",
    "movies", "books", "photography", "art", "history", "politics", "technology", "mobile",
    "android", "ios", "email", "storage", "monitoring", "homelab", "server", "game", "forum",
    "wiki", "podcast", "jobs", "career",
];

/// User list used when no vocabulary file can be read
pub const DEFAULT_USER_VOCABULARY: &[&str] = &["work", "personal", "reading", "ideas", "todo"];

/// Process-wide tag vocabulary with an optional backing file
pub struct TagVocabulary {
    path: Option<PathBuf>,
    user: Mutex<Vec<String>>,
}

impl TagVocabulary {
    /// Load the user list from `path`, falling back to the seed list
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let user = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<Vec<String>>(&content) {
                Ok(words) => {
                    info!("Loaded {} user tags from {}", words.len(), path.display());
                    words
                }
                Err(e) => {
                    warn!("Vocabulary file {} is malformed ({}), using defaults", path.display(), e);
                    default_user_words()
                }
            },
            Err(e) => {
                debug!("No vocabulary file at {} ({}), using defaults", path.display(), e);
                default_user_words()
            }
        };

        Self {
            path: Some(path),
            user: Mutex::new(user),
        }
    }

    /// Vocabulary that is never written to disk
    pub fn in_memory(user_words: Vec<String>) -> Self {
        Self {
            path: None,
            user: Mutex::new(user_words),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Base words followed by user words, exact duplicates removed
    pub async fn all_words(&self) -> Vec<String> {
        let user = self.user.lock().await;
        let mut seen = HashSet::new();
        BASE_VOCABULARY
            .iter()
            .map(|w| w.to_string())
            .chain(user.iter().cloned())
            .filter(|w| seen.insert(w.clone()))
            .collect()
    }

    pub async fn user_words(&self) -> Vec<String> {
        self.user.lock().await.clone()
    }

    /// Case-insensitive membership in either list
    pub async fn contains_ci(&self, word: &str) -> bool {
        let needle = word.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }
        if BASE_VOCABULARY.iter().any(|w| w.to_lowercase() == needle) {
            return true;
        }
        self.user.lock().await.iter().any(|w| w.to_lowercase() == needle)
    }

    /// Append one tag; returns whether it was new
    pub async fn add_user_tag(&self, tag: &str) -> Result<bool, TaggingError> {
        Ok(self.add_user_tags(&[tag.to_string()]).await? > 0)
    }

    /// Append every tag not yet present (exact match) and persist once
    ///
    /// Returns the number of appended words. When the file write fails the
    /// appended words are removed again.
    pub async fn add_user_tags(&self, tags: &[String]) -> Result<usize, TaggingError> {
        let mut user = self.user.lock().await;

        let before = user.len();
        for tag in tags {
            let tag = tag.trim();
            if tag.is_empty() || BASE_VOCABULARY.contains(&tag) || user.iter().any(|w| w == tag) {
                continue;
            }
            user.push(tag.to_string());
        }

        let added = user.len() - before;
        if added == 0 {
            return Ok(0);
        }

        if let Some(path) = &self.path {
            let snapshot = user.clone();
            let target = path.clone();
            let written = tokio::task::spawn_blocking(move || write_vocabulary(&target, &snapshot))
                .await
                .map_err(|e| TaggingError::VocabularyPersist { details: e.to_string() })
                .and_then(|r| r);

            if let Err(e) = written {
                user.truncate(before);
                warn!("Rolled back {} user tags: {}", added, e);
                return Err(e);
            }
        }

        info!("Added {} user tags to vocabulary", added);
        Ok(added)
    }
}

fn default_user_words() -> Vec<String> {
    DEFAULT_USER_VOCABULARY.iter().map(|w| w.to_string()).collect()
}

/// Write through a temp file in the same directory, then rename over the target
fn write_vocabulary(path: &Path, words: &[String]) -> Result<(), TaggingError> {
    let persist_error = |e: &dyn std::fmt::Display| TaggingError::VocabularyPersist {
        details: format!("{}: {}", path.display(), e),
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| persist_error(&e))?;

    let json = serde_json::to_string_pretty(words).map_err(|e| persist_error(&e))?;
    let mut file = tempfile::NamedTempFile::new_in(&dir).map_err(|e| persist_error(&e))?;
    file.write_all(json.as_bytes()).map_err(|e| persist_error(&e))?;
    file.persist(path).map_err(|e| persist_error(&e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::DOMAIN_TYPES;
    use tempfile::TempDir;

    #[test]
    fn test_domain_types_are_vocabulary_words() {
        for (_, kind) in DOMAIN_TYPES {
            assert!(BASE_VOCABULARY.contains(kind), "{} missing from base vocabulary", kind);
        }
    }

    #[tokio::test]
    async fn test_load_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();

        let missing = TagVocabulary::load(dir.path().join("missing.json")).await;
        assert_eq!(missing.user_words().await, default_user_words());

        let corrupt_path = dir.path().join("corrupt.json");
        std::fs::write(&corrupt_path, "{not json").unwrap();
        let corrupt = TagVocabulary::load(&corrupt_path).await;
        assert_eq!(corrupt.user_words().await, default_user_words());

        let wrong_shape = dir.path().join("object.json");
        std::fs::write(&wrong_shape, r#"{"tags": ["a"]}"#).unwrap();
        let wrong = TagVocabulary::load(&wrong_shape).await;
        assert_eq!(wrong.user_words().await, default_user_words());
    }

    #[tokio::test]
    async fn test_add_persists_and_dedups() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vocab.json");
        let vocabulary = TagVocabulary::load(&path).await;

        assert!(vocabulary.add_user_tag("selfhosted").await.unwrap());
        assert!(!vocabulary.add_user_tag("selfhosted").await.unwrap());
        assert!(!vocabulary.add_user_tag("video").await.unwrap());
        assert!(!vocabulary.add_user_tag("   ").await.unwrap());
        // Case-sensitive dedup
        assert!(vocabulary.add_user_tag("SelfHosted").await.unwrap());

        let stored: Vec<String> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored.iter().filter(|w| *w == "selfhosted").count(), 1);
        assert!(stored.contains(&"SelfHosted".to_string()));

        let reloaded = TagVocabulary::load(&path).await;
        assert_eq!(reloaded.user_words().await, stored);
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back() {
        let dir = TempDir::new().unwrap();
        // The target is a directory, so the final rename fails
        let path = dir.path().join("taken");
        std::fs::create_dir_all(path.join("inner")).unwrap();
        let vocabulary = TagVocabulary::load(&path).await;
        let before = vocabulary.user_words().await;

        let result = vocabulary.add_user_tag("homebrew").await;

        assert!(matches!(result, Err(TaggingError::VocabularyPersist { .. })));
        assert_eq!(vocabulary.user_words().await, before);
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let vocabulary = TagVocabulary::in_memory(vec!["Homelab".to_string()]);
        assert!(vocabulary.contains_ci("VIDEO").await);
        assert!(vocabulary.contains_ci("homelab").await);
        assert!(!vocabulary.contains_ci("unknown").await);
        assert!(!vocabulary.contains_ci("").await);

        let words = vocabulary.all_words().await;
        assert_eq!(words.len(), BASE_VOCABULARY.len() + 1);
    }
}
