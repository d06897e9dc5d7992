pub mod dataset;
pub mod naive_bayes;
pub mod vectorizer;

use crate::classifier::Classify;
use dataset::Dataset;
use naive_bayes::MultinomialNb;
use serde::{Deserialize, Serialize};
use std::path::Path;
use vectorizer::{CountVectorizer, SparseRow};

/// Every fourth sample goes to the held-out set.
const TEST_EVERY: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum LearnError {
    #[error("Dataset error: {0}")]
    Dataset(#[from] csv::Error),
    #[error("Dataset is empty")]
    EmptyDataset,
    #[error("Shape mismatch: {0}")]
    Shape(String),
    #[error("Filter file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Filter encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VectorizerKind {
    CountVectorizer,
}

impl std::str::FromStr for VectorizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CountVectorizer" => Ok(VectorizerKind::CountVectorizer),
            other => Err(format!("Unknown vectorizer: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifierKind {
    #[serde(rename = "MultinomialNB")]
    MultinomialNb,
}

impl std::str::FromStr for ClassifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MultinomialNB" => Ok(ClassifierKind::MultinomialNb),
            other => Err(format!("Unknown classifier: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Vectorizer {
    CountVectorizer(CountVectorizer),
}

impl Vectorizer {
    pub fn new(kind: VectorizerKind) -> Self {
        match kind {
            VectorizerKind::CountVectorizer => Vectorizer::CountVectorizer(CountVectorizer::new()),
        }
    }

    fn fit(&mut self, texts: &[String]) {
        match self {
            Vectorizer::CountVectorizer(v) => v.fit(texts),
        }
    }

    fn transform<S: AsRef<str>>(&self, texts: &[S]) -> Vec<SparseRow> {
        match self {
            Vectorizer::CountVectorizer(v) => v.transform(texts),
        }
    }

    fn n_features(&self) -> usize {
        match self {
            Vectorizer::CountVectorizer(v) => v.vocabulary_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Classifier {
    MultinomialNb(MultinomialNb),
}

impl Classifier {
    pub fn new(kind: ClassifierKind) -> Self {
        match kind {
            ClassifierKind::MultinomialNb => Classifier::MultinomialNb(MultinomialNb::new()),
        }
    }

    fn fit(&mut self, rows: &[SparseRow], labels: &[bool], n_features: usize) -> Result<(), LearnError> {
        match self {
            Classifier::MultinomialNb(c) => c.fit(rows, labels, n_features),
        }
    }

    fn predict(&self, rows: &[SparseRow]) -> Vec<bool> {
        match self {
            Classifier::MultinomialNb(c) => c.predict(rows),
        }
    }
}

/// Vectorizer plus classifier, trained together and persisted as one JSON
/// document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpamFilter {
    vectorizer: Vectorizer,
    classifier: Classifier,
}

impl SpamFilter {
    pub fn new(vectorizer: VectorizerKind, classifier: ClassifierKind) -> Self {
        Self {
            vectorizer: Vectorizer::new(vectorizer),
            classifier: Classifier::new(classifier),
        }
    }

    /// Fit on the dataset and log accuracy on the train and held-out parts.
    pub fn learn(&mut self, dataset: &Dataset) -> Result<(), LearnError> {
        if dataset.is_empty() {
            return Err(LearnError::EmptyDataset);
        }

        self.vectorizer.fit(&dataset.texts);
        let rows = self.vectorizer.transform(&dataset.texts);

        let (mut train_rows, mut train_labels) = (Vec::new(), Vec::new());
        let (mut test_rows, mut test_labels) = (Vec::new(), Vec::new());
        for (i, (row, label)) in rows.into_iter().zip(&dataset.labels).enumerate() {
            if dataset.len() >= TEST_EVERY && i % TEST_EVERY == TEST_EVERY - 1 {
                test_rows.push(row);
                test_labels.push(*label);
            } else {
                train_rows.push(row);
                train_labels.push(*label);
            }
        }

        self.classifier
            .fit(&train_rows, &train_labels, self.vectorizer.n_features())?;

        log::info!(
            "filter accuracy on train set is {:.4}",
            accuracy(&self.classifier.predict(&train_rows), &train_labels)
        );
        if !test_rows.is_empty() {
            log::info!(
                "filter accuracy on test set is {:.4}",
                accuracy(&self.classifier.predict(&test_rows), &test_labels)
            );
        }
        Ok(())
    }

    pub fn is_spam<S: AsRef<str>>(&self, texts: &[S]) -> Vec<bool> {
        self.classifier.predict(&self.vectorizer.transform(texts))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LearnError> {
        let content = serde_json::to_vec(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LearnError> {
        let content = std::fs::read(path)?;
        Ok(serde_json::from_slice(&content)?)
    }
}

impl Classify for SpamFilter {
    fn classify(&self, texts: &[String]) -> anyhow::Result<Vec<bool>> {
        Ok(self.is_spam(texts))
    }
}

fn accuracy(predicted: &[bool], expected: &[bool]) -> f64 {
    if expected.is_empty() {
        return 0.0;
    }
    let correct = predicted
        .iter()
        .zip(expected)
        .filter(|(p, e)| p == e)
        .count();
    correct as f64 / expected.len() as f64
}
