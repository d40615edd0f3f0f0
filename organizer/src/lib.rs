//! Organizer module for the bookmark manager
//!
//! Suggests tags for pages and groups the bookmark collection for display.
//!
//! # Features
//! - TF-IDF vectorization and cosine scoring against a growable vocabulary
//! - Domain-type heuristics for well-known sites
//! - Persistent user vocabulary fed by manually assigned tags
//! - Rule-based grouping with a k-means fallback that never fails the call

pub mod text;
pub mod cluster;
pub mod domains;
pub mod vocabulary;
pub mod suggest;
pub mod categorize;

pub use text::{cosine_similarity, tokenize, TfidfMatrix, TfidfVectorizer};
pub use domains::{domain_type, second_level_domain};
pub use vocabulary::{TagVocabulary, BASE_VOCABULARY, DEFAULT_USER_VOCABULARY};
pub use suggest::{TagSuggester, TagSuggesterConfig};
pub use categorize::{Categorizer, CategorizerConfig, CATCH_ALL_LABEL, MISC_LABEL, UNTAGGED_LABEL};
