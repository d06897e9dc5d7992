use crate::batcher::Batch;
use std::sync::Arc;

/// Something that can label message texts as spam (`true`) or ham.
///
/// Implementations must return exactly one label per input text, in input
/// order. Calls may be slow; the gateway runs them on the blocking pool.
pub trait Classify: Send + Sync {
    fn classify(&self, texts: &[String]) -> anyhow::Result<Vec<bool>>;
}

#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    #[error("Classifier failed: {0}")]
    Capability(String),
    #[error("Classifier returned {actual} labels for a batch of {expected}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Adapter between a [`Batch`] and the classification capability.
#[derive(Clone)]
pub struct ClassificationGateway {
    classifier: Arc<dyn Classify>,
}

impl ClassificationGateway {
    pub fn new(classifier: Arc<dyn Classify>) -> Self {
        Self { classifier }
    }

    pub async fn classify(&self, batch: &Batch) -> Result<Vec<bool>, ClassificationError> {
        let texts: Vec<String> = batch.iter().map(|record| record.text.clone()).collect();
        let expected = texts.len();
        let classifier = self.classifier.clone();

        let labels = tokio::task::spawn_blocking(move || classifier.classify(&texts))
            .await
            .map_err(|e| ClassificationError::Capability(format!("classifier task aborted: {e}")))?
            .map_err(|e| ClassificationError::Capability(format!("{e:#}")))?;

        if labels.len() != expected {
            return Err(ClassificationError::LengthMismatch {
                expected,
                actual: labels.len(),
            });
        }

        Ok(labels)
    }
}
