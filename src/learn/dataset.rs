use super::LearnError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Supported training corpora.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetKind {
    /// CSV with a header row and `text`, `spam` (0/1) columns.
    #[serde(rename = "emails_small")]
    EmailsSmall,
    /// Tab separated `label<TAB>text` lines, label `spam` or `ham`.
    #[serde(rename = "sms")]
    Sms,
}

impl std::str::FromStr for DatasetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "emails_small" => Ok(DatasetKind::EmailsSmall),
            "sms" => Ok(DatasetKind::Sms),
            other => Err(format!("Unknown dataset: {other}")),
        }
    }
}

/// Labelled texts with duplicates removed.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub texts: Vec<String>,
    pub labels: Vec<bool>,
}

impl Dataset {
    pub fn load(kind: DatasetKind, path: impl AsRef<Path>) -> Result<Self, LearnError> {
        let path = path.as_ref();
        let rows = match kind {
            DatasetKind::EmailsSmall => Self::read_emails(path)?,
            DatasetKind::Sms => Self::read_sms(path)?,
        };
        let dataset = Self::from_rows(rows);
        log::info!(
            "Loaded {} unique sample(s) ({} spam) from {}",
            dataset.len(),
            dataset.labels.iter().filter(|l| **l).count(),
            path.display()
        );
        Ok(dataset)
    }

    /// Build from `(text, is_spam)` pairs, keeping the first of any exact
    /// duplicates.
    pub fn from_rows(rows: impl IntoIterator<Item = (String, bool)>) -> Self {
        let mut seen = HashSet::new();
        let mut dataset = Dataset::default();
        for (text, label) in rows {
            if seen.insert((text.clone(), label)) {
                dataset.texts.push(text);
                dataset.labels.push(label);
            }
        }
        dataset
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    fn read_emails(path: &Path) -> Result<Vec<(String, bool)>, LearnError> {
        #[derive(Deserialize)]
        struct EmailRow {
            text: String,
            spam: i64,
        }

        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        let mut rows = Vec::new();
        for row in reader.deserialize() {
            let row: EmailRow = row?;
            rows.push((row.text, row.spam == 1));
        }
        Ok(rows)
    }

    fn read_sms(path: &Path) -> Result<Vec<(String, bool)>, LearnError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .quoting(false)
            .flexible(true)
            .from_path(path)?;
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let (Some(label), Some(text)) = (record.get(0), record.get(1)) else {
                log::warn!("Skipping malformed SMS row at {:?}", record.position());
                continue;
            };
            rows.push((text.to_string(), label == "spam"));
        }
        Ok(rows)
    }
}
