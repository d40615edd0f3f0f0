//! Tag suggestion by vocabulary similarity
//!
//! The query document (title, description, URL, plus a domain type word and
//! the network tag for IP hosts) is vectorized together with one document per
//! vocabulary word. Words whose cosine similarity to the query clears the
//! threshold are returned best first.

use bookmark_manager_core::{host_of, TaggingError};
use data_access::{CacheStats, SharedCache};
use page_scraper::{is_ip_host, NetworkClassifier};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domains::domain_type;
use crate::text::{cosine_similarity, TfidfVectorizer};
use crate::vocabulary::TagVocabulary;

/// Configuration for tag suggestion
#[derive(Debug, Clone)]
pub struct TagSuggesterConfig {
    /// Similarity a word must strictly exceed
    pub threshold: f64,
    pub max_tags: usize,
    pub cache_capacity: usize,
}

impl Default for TagSuggesterConfig {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            max_tags: 3,
            cache_capacity: 1000,
        }
    }
}

type SuggestionKey = (String, String, String);

/// Suggests tags for a page from the shared vocabulary
pub struct TagSuggester {
    vocabulary: Arc<TagVocabulary>,
    classifier: Arc<NetworkClassifier>,
    cache: SharedCache<SuggestionKey, Vec<String>>,
    config: TagSuggesterConfig,
}

impl TagSuggester {
    pub fn new(vocabulary: Arc<TagVocabulary>, classifier: Arc<NetworkClassifier>) -> Self {
        Self::with_config(vocabulary, classifier, TagSuggesterConfig::default())
    }

    pub fn with_config(
        vocabulary: Arc<TagVocabulary>,
        classifier: Arc<NetworkClassifier>,
        config: TagSuggesterConfig,
    ) -> Self {
        Self {
            vocabulary,
            classifier,
            cache: SharedCache::new(config.cache_capacity),
            config,
        }
    }

    pub fn config(&self) -> &TagSuggesterConfig {
        &self.config
    }

    pub fn vocabulary(&self) -> &Arc<TagVocabulary> {
        &self.vocabulary
    }

    pub fn classifier(&self) -> &Arc<NetworkClassifier> {
        &self.classifier
    }

    /// At most `max_tags` vocabulary words, most similar first
    ///
    /// Results are memoized per exact (title, description, url) triple.
    pub async fn suggest_tags(&self, title: &str, description: &str, url: &str) -> Vec<String> {
        let key = (title.to_string(), description.to_string(), url.to_string());
        if let Some(cached) = self.cache.get(&key).await {
            debug!("Tag suggestion cache hit for {}", url);
            return cached;
        }

        let tags: Vec<String> = self
            .scored_suggestions(title, description, url)
            .await
            .into_iter()
            .map(|(word, _)| word)
            .collect();

        self.cache.insert(key, tags.clone()).await;
        tags
    }

    /// Suggestions with their similarity scores, bypassing the cache
    pub async fn scored_suggestions(&self, title: &str, description: &str, url: &str) -> Vec<(String, f64)> {
        let query = self.query_document(title, description, url).await;
        let words = self.vocabulary.all_words().await;

        let mut documents = Vec::with_capacity(words.len() + 1);
        documents.push(query);
        documents.extend(words.iter().cloned());

        let matrix = match TfidfVectorizer::new().fit_transform(&documents) {
            Ok(matrix) => matrix,
            Err(e) => {
                warn!("Could not vectorize suggestion input for {}: {}", url, e);
                return Vec::new();
            }
        };

        let query_row = &matrix.rows[0];
        let mut scored: Vec<(String, f64)> = words
            .into_iter()
            .zip(matrix.rows.iter().skip(1))
            .map(|(word, row)| (word, cosine_similarity(query_row, row)))
            .filter(|(_, score)| *score > self.config.threshold)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        // Case variants score identically; the first (base) spelling is kept
        let mut seen = HashSet::new();
        scored.retain(|(word, _)| seen.insert(word.to_lowercase()));
        scored.truncate(self.config.max_tags);
        scored
    }

    /// Text the vocabulary is scored against
    pub async fn query_document(&self, title: &str, description: &str, url: &str) -> String {
        let mut parts: Vec<String> = vec![title.to_string(), description.to_string(), url.to_string()];

        if let Some(kind) = host_of(url).as_deref().and_then(domain_type) {
            parts.push(kind.to_string());
        }
        if is_ip_host(url) {
            parts.push(self.classifier.network_tag(url).await.to_string());
        }

        parts.join(" ")
    }

    /// Grow the vocabulary with user-assigned tags
    ///
    /// Memoized suggestions are dropped when any word was appended, since
    /// they were scored against the old vocabulary.
    pub async fn record_user_tags(&self, tags: &[String]) -> Result<usize, TaggingError> {
        let added = self.vocabulary.add_user_tags(tags).await?;
        if added > 0 {
            self.cache.clear().await;
        }
        Ok(added)
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use page_scraper::ReachabilityProbe;
    use std::time::Duration;

    pub(crate) struct StaticProbe(pub bool);

    #[async_trait]
    impl ReachabilityProbe for StaticProbe {
        async fn is_online(&self, _url: &str, _timeout: Duration) -> bool {
            self.0
        }
    }

    pub(crate) fn suggester(user_words: &[&str]) -> TagSuggester {
        let vocabulary = Arc::new(TagVocabulary::in_memory(
            user_words.iter().map(|w| w.to_string()).collect(),
        ));
        let classifier = Arc::new(NetworkClassifier::with_probe(Arc::new(StaticProbe(true))));
        TagSuggester::new(vocabulary, classifier)
    }

    #[tokio::test]
    async fn test_suggests_matching_words() {
        let suggester = suggester(&[]);

        let tags = suggester
            .suggest_tags("Learning Rust", "A rust programming tutorial", "https://example.com/rust")
            .await;

        assert!(!tags.is_empty() && tags.len() <= 3);
        assert_eq!(tags[0], "rust");
        assert!(tags.contains(&"programming".to_string()) || tags.contains(&"tutorial".to_string()));
    }

    #[tokio::test]
    async fn test_domain_type_added_to_query() {
        let suggester = suggester(&[]);

        let query = suggester.query_document("Some clip", "", "https://www.youtube.com/watch?v=1").await;
        assert!(query.ends_with(" video"));

        let tags = suggester.suggest_tags("Some clip", "", "https://www.youtube.com/watch?v=1").await;
        assert!(tags.contains(&"video".to_string()));
    }

    #[tokio::test]
    async fn test_network_tag_for_ip_hosts() {
        let suggester = suggester(&[]);

        let query = suggester.query_document("NAS", "", "http://192.168.1.20:5000/").await;
        assert!(query.ends_with(" local-server"));

        let tags = suggester.suggest_tags("NAS", "", "http://192.168.1.20:5000/").await;
        assert!(tags.contains(&"server".to_string()));
    }

    #[tokio::test]
    async fn test_scores_clear_threshold() {
        let suggester = suggester(&[]);
        let scored = suggester
            .scored_suggestions("Docker and kubernetes for devops", "", "https://example.com")
            .await;

        assert!(scored.len() <= 3);
        assert!(scored.iter().all(|(_, score)| *score > 0.1));
        assert!(scored.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[tokio::test]
    async fn test_nothing_suggested_for_unrelated_text() {
        let suggester = suggester(&[]);
        let tags = suggester.suggest_tags("zzqx", "", "").await;
        assert!(tags.is_empty());
    }

    #[tokio::test]
    async fn test_user_tags_grow_vocabulary_and_reset_cache() {
        let suggester = suggester(&[]);

        let before = suggester.suggest_tags("Sourdough starter", "", "").await;
        assert!(!before.contains(&"sourdough".to_string()));
        assert_eq!(suggester.cache_stats().await.len, 1);

        let added = suggester.record_user_tags(&["sourdough".to_string()]).await.unwrap();
        assert_eq!(added, 1);
        assert_eq!(suggester.cache_stats().await.len, 0);

        let after = suggester.suggest_tags("Sourdough starter", "", "").await;
        assert_eq!(after.first().map(String::as_str), Some("sourdough"));

        assert_eq!(suggester.record_user_tags(&["sourdough".to_string()]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_case_variants_suggested_once() {
        let suggester = suggester(&["Rust", "RUST"]);

        let tags = suggester
            .suggest_tags("Learning Rust", "A rust programming tutorial", "https://example.com/rust")
            .await;

        assert_eq!(tags[0], "rust");
        assert_eq!(tags.iter().filter(|t| t.eq_ignore_ascii_case("rust")).count(), 1);
        assert!(tags.len() <= 3);
    }
}
