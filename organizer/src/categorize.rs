//! Bookmark categorization
//!
//! Partitions a bookmark set into labelled groups, in this order:
//! 1. bookmarks without tags ("Untagged", first)
//! 2. IP-addressed hosts, grouped by network category
//! 3. the first tag (stored tags plus the domain type) known to the vocabulary
//! 4. k-means clusters of the remaining bookmarks' text
//!
//! A vectorization or clustering failure puts every remaining bookmark into
//! one catch-all group instead of failing the call.

use bookmark_manager_core::*;
use page_scraper::is_ip_host;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cluster::{cluster_count, kmeans};
use crate::domains::{domain_type, second_level_domain};
use crate::suggest::TagSuggester;
use crate::text::TfidfVectorizer;

pub const UNTAGGED_LABEL: &str = "Untagged";
pub const CATCH_ALL_LABEL: &str = "Other";
pub const MISC_LABEL: &str = "Miscellaneous";

/// Configuration for categorization
#[derive(Debug, Clone)]
pub struct CategorizerConfig {
    pub min_clusters: usize,
    pub max_clusters: usize,
    /// Documents per cluster before the min/max bounds apply
    pub documents_per_cluster: usize,
    pub max_features: usize,
    pub max_iterations: usize,
}

impl Default for CategorizerConfig {
    fn default() -> Self {
        Self {
            min_clusters: 3,
            max_clusters: 5,
            documents_per_cluster: 5,
            max_features: 1000,
            max_iterations: 100,
        }
    }
}

/// Groups bookmarks for display
pub struct Categorizer {
    suggester: Arc<TagSuggester>,
    config: CategorizerConfig,
}

impl Categorizer {
    pub fn new(suggester: Arc<TagSuggester>) -> Self {
        Self::with_config(suggester, CategorizerConfig::default())
    }

    pub fn with_config(suggester: Arc<TagSuggester>, config: CategorizerConfig) -> Self {
        Self { suggester, config }
    }

    pub fn config(&self) -> &CategorizerConfig {
        &self.config
    }

    /// Ordered groups whose members together are exactly `bookmarks`
    pub async fn categorize(&self, bookmarks: &[Bookmark]) -> Vec<BookmarkGroup> {
        if bookmarks.is_empty() {
            return vec![BookmarkGroup::new(UNTAGGED_LABEL)];
        }

        let mut groups = Vec::new();

        let (untagged, tagged): (Vec<&Bookmark>, Vec<&Bookmark>) =
            bookmarks.iter().partition(|b| b.is_untagged());
        if !untagged.is_empty() {
            groups.push(group_of(UNTAGGED_LABEL, &untagged));
        }

        let (ip_hosted, named): (Vec<&Bookmark>, Vec<&Bookmark>) =
            tagged.into_iter().partition(|b| is_ip_host(&b.url));
        groups.extend(self.network_groups(&ip_hosted).await);

        let (tag_groups, fallthrough) = self.primary_tag_groups(&named).await;
        groups.extend(tag_groups);

        if !fallthrough.is_empty() {
            groups.extend(self.cluster_groups(&fallthrough).await);
        }

        let merged = merge_by_label(groups);
        info!("Categorized {} bookmarks into {} groups", bookmarks.len(), merged.len());
        merged
    }

    async fn network_groups(&self, bookmarks: &[&Bookmark]) -> Vec<BookmarkGroup> {
        let mut by_category: HashMap<NetworkCategory, Vec<&Bookmark>> = HashMap::new();
        for &bookmark in bookmarks {
            let classification = self.suggester.classifier().classify_network(&bookmark.url).await;
            by_category.entry(classification.category).or_default().push(bookmark);
        }

        NetworkCategory::ALL
            .iter()
            .filter_map(|category| {
                by_category
                    .get(category)
                    .map(|members| group_of(category.display_name(), members))
            })
            .collect()
    }

    /// Buckets keyed by the first vocabulary tag; returns the unmatched rest
    async fn primary_tag_groups<'a>(&self, bookmarks: &[&'a Bookmark]) -> (Vec<BookmarkGroup>, Vec<&'a Bookmark>) {
        let vocabulary = self.suggester.vocabulary();
        let mut order: Vec<String> = Vec::new();
        let mut buckets: HashMap<String, Vec<&Bookmark>> = HashMap::new();
        let mut fallthrough = Vec::new();

        for &bookmark in bookmarks {
            let mut primary = None;
            for tag in effective_tags(bookmark) {
                if vocabulary.contains_ci(&tag).await {
                    primary = Some(tag.to_lowercase());
                    break;
                }
            }

            match primary {
                Some(key) => {
                    if !buckets.contains_key(&key) {
                        order.push(key.clone());
                    }
                    buckets.entry(key).or_default().push(bookmark);
                }
                None => fallthrough.push(bookmark),
            }
        }

        let groups = order
            .iter()
            .filter_map(|key| buckets.get(key).map(|members| group_of(&display_label(key), members)))
            .collect();
        (groups, fallthrough)
    }

    async fn cluster_groups(&self, bookmarks: &[&Bookmark]) -> Vec<BookmarkGroup> {
        let mut documents = Vec::with_capacity(bookmarks.len());
        for bookmark in bookmarks {
            documents.push(
                self.suggester
                    .query_document(
                        bookmark.title.as_deref().unwrap_or_default(),
                        bookmark.description.as_deref().unwrap_or_default(),
                        &bookmark.url,
                    )
                    .await,
            );
        }

        match self.cluster(&documents) {
            Ok(clusters) => {
                debug!("Clustered {} bookmarks into {} groups", bookmarks.len(), clusters.len());
                clusters
                    .into_iter()
                    .map(|indices| {
                        let members: Vec<&Bookmark> = indices.iter().map(|&i| bookmarks[i]).collect();
                        group_of(&cluster_label(&members), &members)
                    })
                    .collect()
            }
            Err(e) => {
                warn!("Clustering {} bookmarks failed, using one group: {}", bookmarks.len(), e);
                vec![group_of(CATCH_ALL_LABEL, bookmarks)]
            }
        }
    }

    fn cluster(&self, documents: &[String]) -> std::result::Result<Vec<Vec<usize>>, TaggingError> {
        let matrix = TfidfVectorizer::new()
            .with_stop_words()
            .with_max_features(self.config.max_features)
            .fit_transform(documents)?;

        let k = cluster_count(
            documents.len(),
            self.config.min_clusters,
            self.config.max_clusters,
            self.config.documents_per_cluster,
        );
        kmeans(&matrix.rows, k, self.config.max_iterations)
    }
}

/// Stored tags, then the domain type when not already among them
pub fn effective_tags(bookmark: &Bookmark) -> Vec<String> {
    let mut tags: Vec<String> = bookmark.clean_tags().map(str::to_string).collect();
    if let Some(kind) = bookmark.host().as_deref().and_then(domain_type) {
        if !tags.iter().any(|t| t.eq_ignore_ascii_case(kind)) {
            tags.push(kind.to_string());
        }
    }
    tags
}

/// "Tag1 & Tag2", prefixed with "Sld: " when one second-level domain
/// covers more than one member
pub fn cluster_label(members: &[&Bookmark]) -> String {
    let mut tag_counts: Vec<(String, usize)> = Vec::new();
    for tag in members.iter().flat_map(|b| b.clean_tags()) {
        let tag = tag.to_lowercase();
        match tag_counts.iter_mut().find(|(t, _)| *t == tag) {
            Some((_, count)) => *count += 1,
            None => tag_counts.push((tag, 1)),
        }
    }
    // Stable sort keeps first-seen order among equal counts
    tag_counts.sort_by(|a, b| b.1.cmp(&a.1));

    let tags = if tag_counts.is_empty() {
        MISC_LABEL.to_string()
    } else {
        tag_counts
            .iter()
            .take(2)
            .map(|(t, _)| display_label(t))
            .collect::<Vec<_>>()
            .join(" & ")
    };

    let mut domain_counts: Vec<(String, usize)> = Vec::new();
    for sld in members.iter().filter_map(|b| b.host()).filter_map(|h| second_level_domain(&h)) {
        match domain_counts.iter_mut().find(|(d, _)| *d == sld) {
            Some((_, count)) => *count += 1,
            None => domain_counts.push((sld, 1)),
        }
    }
    let top_domain = domain_counts
        .into_iter()
        .fold(None::<(String, usize)>, |best, cur| match best {
            Some(b) if b.1 >= cur.1 => Some(b),
            _ => Some(cur),
        });

    match top_domain {
        Some((sld, count)) if count > 1 => format!("{}: {}", display_label(&sld), tags),
        _ => tags,
    }
}

fn group_of(label: &str, members: &[&Bookmark]) -> BookmarkGroup {
    BookmarkGroup {
        label: label.to_string(),
        bookmarks: members.iter().map(|b| (*b).clone()).collect(),
    }
}

/// Groups sharing a label are combined at the first one's position
fn merge_by_label(groups: Vec<BookmarkGroup>) -> Vec<BookmarkGroup> {
    let mut merged: Vec<BookmarkGroup> = Vec::with_capacity(groups.len());
    for group in groups {
        match merged.iter_mut().find(|g| g.label == group.label) {
            Some(existing) => existing.bookmarks.extend(group.bookmarks),
            None => merged.push(group),
        }
    }
    merged
}
