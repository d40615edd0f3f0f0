//! TF-IDF text vectorization
//!
//! Tokens are runs of two or more alphanumeric characters, lower-cased.
//! Weights use raw term counts and smooth idf `ln((1 + n) / (1 + df)) + 1`;
//! every row is L2-normalized so cosine similarity is a dot product.

use bookmark_manager_core::TaggingError;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Common English words dropped before clustering
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "almost", "alone", "along", "already",
    "also", "although", "always", "am", "among", "an", "and", "another", "any", "anyhow", "anyone",
    "anything", "anyway", "anywhere", "are", "around", "as", "at", "back", "be", "became", "because",
    "become", "becomes", "been", "before", "behind", "being", "below", "beside", "besides", "between",
    "beyond", "both", "but", "by", "can", "cannot", "could", "did", "do", "does", "done", "down",
    "due", "during", "each", "either", "else", "elsewhere", "enough", "etc", "even", "ever", "every",
    "everyone", "everything", "everywhere", "except", "few", "for", "former", "from", "further", "get",
    "give", "go", "had", "has", "have", "he", "hence", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "however", "i", "ie", "if", "in", "indeed", "into", "is", "it", "its",
    "itself", "just", "keep", "last", "latter", "least", "less", "made", "many", "may", "me",
    "meanwhile", "might", "mine", "more", "moreover", "most", "mostly", "much", "must", "my", "myself",
    "namely", "neither", "never", "nevertheless", "next", "no", "nobody", "none", "nor", "not",
    "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto", "or",
    "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own", "per", "perhaps",
    "please", "put", "rather", "re", "same", "see", "seem", "seemed", "seems", "several", "she",
    "should", "since", "so", "some", "somehow", "someone", "something", "sometimes", "somewhere",
    "still", "such", "than", "that", "the", "their", "them", "themselves", "then", "there",
    "thereafter", "thereby", "therefore", "these", "they", "this", "those", "though", "through",
    "throughout", "thus", "to", "together", "too", "toward", "towards", "under", "until", "up", "upon",
    "us", "very", "via", "was", "we", "well", "were", "what", "whatever", "when", "whence", "whenever",
    "where", "whereas", "wherever", "whether", "which", "while", "who", "whoever", "whole", "whom",
    "whose", "why", "will", "with", "within", "without", "would", "yet", "you", "your", "yours",
    "yourself", "yourselves",
];

/// Split text into lower-cased tokens of at least two alphanumeric characters
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 2)
        .map(|t| t.to_lowercase())
        .collect()
}

/// Fitted TF-IDF matrix: one L2-normalized dense row per input document
#[derive(Debug, Clone, PartialEq)]
pub struct TfidfMatrix {
    pub features: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

/// Vectorizer settings
#[derive(Debug, Clone, Default)]
pub struct TfidfVectorizer {
    pub remove_stop_words: bool,
    /// Keep only the most frequent terms across the corpus
    pub max_features: Option<usize>,
}

impl TfidfVectorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stop_words(mut self) -> Self {
        self.remove_stop_words = true;
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Fit on `documents` and transform them in one pass
    pub fn fit_transform<S: AsRef<str>>(&self, documents: &[S]) -> Result<TfidfMatrix, TaggingError> {
        let stop_words: HashSet<&str> = if self.remove_stop_words {
            ENGLISH_STOP_WORDS.iter().copied().collect()
        } else {
            HashSet::new()
        };

        let tokenized: Vec<Vec<String>> = documents
            .iter()
            .map(|doc| {
                tokenize(doc.as_ref())
                    .into_iter()
                    .filter(|t| !stop_words.contains(t.as_str()))
                    .collect()
            })
            .collect();

        let mut corpus_counts: HashMap<&str, usize> = HashMap::new();
        for tokens in &tokenized {
            for token in tokens {
                *corpus_counts.entry(token.as_str()).or_insert(0) += 1;
            }
        }
        if corpus_counts.is_empty() {
            return Err(TaggingError::EmptyFeatureSpace);
        }

        let mut kept: Vec<(&str, usize)> = corpus_counts.into_iter().collect();
        if let Some(limit) = self.max_features {
            kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            kept.truncate(limit.max(1));
        }

        // Feature order is alphabetical, like a sorted vocabulary
        let index: BTreeMap<&str, usize> = {
            let mut terms: Vec<&str> = kept.iter().map(|(t, _)| *t).collect();
            terms.sort_unstable();
            terms.into_iter().enumerate().map(|(i, t)| (t, i)).collect()
        };
        let features: Vec<String> = index.keys().map(|t| t.to_string()).collect();

        let n = tokenized.len() as f64;
        let mut document_frequency = vec![0usize; features.len()];
        let mut counts: Vec<HashMap<usize, f64>> = Vec::with_capacity(tokenized.len());
        for tokens in &tokenized {
            let mut row: HashMap<usize, f64> = HashMap::new();
            for token in tokens {
                if let Some(&i) = index.get(token.as_str()) {
                    *row.entry(i).or_insert(0.0) += 1.0;
                }
            }
            for &i in row.keys() {
                document_frequency[i] += 1;
            }
            counts.push(row);
        }

        let idf: Vec<f64> = document_frequency
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        let rows = counts
            .into_iter()
            .map(|row| {
                let mut dense = vec![0.0; features.len()];
                for (i, count) in row {
                    dense[i] = count * idf[i];
                }
                l2_normalize(&mut dense);
                dense
            })
            .collect();

        Ok(TfidfMatrix { features, rows })
    }
}

fn l2_normalize(row: &mut [f64]) {
    let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        for v in row.iter_mut() {
            *v /= norm;
        }
    }
}

/// Cosine similarity; zero when either vector is all zeros
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|v| v * v).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
