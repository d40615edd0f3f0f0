// Property tests for tag suggestion and categorization
//
// Property: suggestions never exceed three tags and every suggested tag
// clears the similarity threshold; categorization is a partition of its
// input (no bookmark lost or duplicated) with "Untagged" first when present.

use proptest::prelude::*;
use organizer::{Categorizer, TagSuggester, TagVocabulary};
use page_scraper::{NetworkClassifier, ReachabilityProbe};
use bookmark_manager_core::*;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

struct FixedProbe(bool);

#[async_trait]
impl ReachabilityProbe for FixedProbe {
    async fn is_online(&self, _url: &str, _timeout: Duration) -> bool {
        self.0
    }
}

fn suggester(reachable: bool) -> Arc<TagSuggester> {
    let vocabulary = Arc::new(TagVocabulary::in_memory(vec!["homelab".to_string(), "Sourdough".to_string()]));
    let classifier = Arc::new(NetworkClassifier::with_probe(Arc::new(FixedProbe(reachable))));
    Arc::new(TagSuggester::new(vocabulary, classifier))
}

fn arb_words() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("rust".to_string()),
            Just("video".to_string()),
            Just("the".to_string()),
            Just("docker".to_string()),
            Just("sourdough".to_string()),
            "[a-z]{1,9}",
        ],
        0..8,
    )
    .prop_map(|words| words.join(" "))
}

fn arb_url() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("https://www.youtube.com/watch?v=abc".to_string()),
        Just("https://github.com/org/repo".to_string()),
        "https://[a-z]{2,8}\\.(com|org|net)/[a-z]{0,6}",
        (0u8..=255, 0u8..=255).prop_map(|(c, d)| format!("http://192.168.{}.{}/", c, d)),
        (0u8..=255, 0u8..=255).prop_map(|(c, d)| format!("http://100.64.{}.{}:8080/", c, d)),
        Just("".to_string()),
    ]
}

fn arb_bookmark() -> impl Strategy<Value = (String, String, Vec<String>)> {
    (
        arb_url(),
        arb_words(),
        prop::collection::vec(
            prop_oneof![
                Just("video".to_string()),
                Just("Rust".to_string()),
                Just("  ".to_string()),
                "[a-z]{2,7}",
            ],
            0..3,
        ),
    )
}

fn to_bookmarks(raw: Vec<(String, String, Vec<String>)>) -> Vec<Bookmark> {
    let now = Utc::now();
    raw.into_iter()
        .enumerate()
        .map(|(i, (url, title, tags))| Bookmark {
            id: BookmarkId(i as i64 + 1),
            url,
            title: Some(title),
            description: None,
            webicon: DEFAULT_FAVICON.to_string(),
            icon_candidates: Vec::new(),
            extra_metadata: None,
            tags,
            is_favorite: false,
            click_count: 0,
            created_at: now,
            updated_at: now,
            last_used: None,
            full_text_content: None,
            content_fetched_at: None,
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    #[test]
    fn prop_suggestions_bounded_and_above_threshold(
        title in arb_words(),
        description in arb_words(),
        url in arb_url(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let suggester = suggester(true);

            let scored = suggester.scored_suggestions(&title, &description, &url).await;
            prop_assert!(scored.len() <= 3);
            for (_, score) in &scored {
                prop_assert!(*score > 0.1);
            }

            let tags = suggester.suggest_tags(&title, &description, &url).await;
            let expected: Vec<String> = scored.into_iter().map(|(w, _)| w).collect();
            prop_assert_eq!(&tags, &expected);

            // Memoized answer is identical
            prop_assert_eq!(suggester.suggest_tags(&title, &description, &url).await, tags);
            Ok(())
        })?;
    }

    #[test]
    fn prop_categorize_partitions_input(
        raw in prop::collection::vec(arb_bookmark(), 0..25),
        reachable in any::<bool>(),
    ) {
        let bookmarks = to_bookmarks(raw);
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let categorizer = Categorizer::new(suggester(reachable));

            let groups = categorizer.categorize(&bookmarks).await;

            let mut seen: Vec<i64> = groups
                .iter()
                .flat_map(|g| g.bookmarks.iter().map(|b| b.id.0))
                .collect();
            seen.sort_unstable();
            let expected: Vec<i64> = bookmarks.iter().map(|b| b.id.0).collect();
            prop_assert_eq!(seen, expected);

            if bookmarks.is_empty() {
                prop_assert_eq!(groups.len(), 1);
                prop_assert_eq!(groups[0].label.as_str(), "Untagged");
            }

            for (i, group) in groups.iter().enumerate() {
                if group.label == "Untagged" {
                    prop_assert_eq!(i, 0);
                    prop_assert!(group.bookmarks.iter().all(|b| b.is_untagged()));
                }
            }

            let mut labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
            labels.sort_unstable();
            labels.dedup();
            prop_assert_eq!(labels.len(), groups.len());
            Ok(())
        })?;
    }
}
