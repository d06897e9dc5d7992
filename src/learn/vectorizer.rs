use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Sparse row: `(feature index, count)` pairs sorted by index.
pub type SparseRow = Vec<(usize, f64)>;

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Words of two or more word characters.
    PATTERN.get_or_init(|| Regex::new(r"(?u)\b\w\w+\b").expect("valid token regex"))
}

pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    token_pattern()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
}

/// Bag-of-words term counter with a vocabulary learned from a corpus.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountVectorizer {
    vocabulary: BTreeMap<String, usize>,
}

impl CountVectorizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn the vocabulary. Feature indices follow sorted term order.
    pub fn fit<S: AsRef<str>>(&mut self, texts: &[S]) {
        let mut terms: BTreeMap<String, usize> = BTreeMap::new();
        for text in texts {
            for token in tokenize(text.as_ref()) {
                terms.entry(token).or_insert(0);
            }
        }
        for (index, value) in terms.values_mut().enumerate() {
            *value = index;
        }
        self.vocabulary = terms;
    }

    pub fn transform<S: AsRef<str>>(&self, texts: &[S]) -> Vec<SparseRow> {
        texts
            .iter()
            .map(|text| self.transform_one(text.as_ref()))
            .collect()
    }

    fn transform_one(&self, text: &str) -> SparseRow {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokenize(text) {
            if let Some(&index) = self.vocabulary.get(&token) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }
        counts.into_iter().collect()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }
}
