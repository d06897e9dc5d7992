use super::vectorizer::SparseRow;
use super::LearnError;
use serde::{Deserialize, Serialize};

const ALPHA: f64 = 1.0;

/// Multinomial naive Bayes over two classes: ham (index 0) and spam (index 1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultinomialNb {
    class_log_prior: [f64; 2],
    feature_log_prob: [Vec<f64>; 2],
}

impl MultinomialNb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(
        &mut self,
        rows: &[SparseRow],
        labels: &[bool],
        n_features: usize,
    ) -> Result<(), LearnError> {
        if rows.len() != labels.len() {
            return Err(LearnError::Shape(format!(
                "{} rows but {} labels",
                rows.len(),
                labels.len()
            )));
        }
        if rows.is_empty() {
            return Err(LearnError::EmptyDataset);
        }

        let mut class_count = [0.0f64; 2];
        let mut feature_count = [vec![0.0f64; n_features], vec![0.0f64; n_features]];

        for (row, &is_spam) in rows.iter().zip(labels) {
            let class = usize::from(is_spam);
            class_count[class] += 1.0;
            for &(index, count) in row {
                if index >= n_features {
                    return Err(LearnError::Shape(format!(
                        "feature {index} out of range for {n_features} features"
                    )));
                }
                feature_count[class][index] += count;
            }
        }

        let total = class_count[0] + class_count[1];
        for class in 0..2 {
            // An absent class can never be predicted. Kept finite so the
            // model survives a JSON round trip.
            self.class_log_prior[class] = if class_count[class] > 0.0 {
                (class_count[class] / total).ln()
            } else {
                f64::MIN
            };

            let smoothed_total: f64 =
                feature_count[class].iter().sum::<f64>() + ALPHA * n_features as f64;
            self.feature_log_prob[class] = feature_count[class]
                .iter()
                .map(|count| ((count + ALPHA) / smoothed_total).ln())
                .collect();
        }

        Ok(())
    }

    pub fn predict(&self, rows: &[SparseRow]) -> Vec<bool> {
        rows.iter().map(|row| self.predict_one(row)).collect()
    }

    fn predict_one(&self, row: &SparseRow) -> bool {
        let score = |class: usize| {
            row.iter().fold(self.class_log_prior[class], |acc, &(index, count)| {
                acc + count
                    * self.feature_log_prob[class]
                        .get(index)
                        .copied()
                        .unwrap_or(0.0)
            })
        };
        score(1) > score(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separates_obvious_classes() {
        // features: 0 = "free", 1 = "money", 2 = "meeting", 3 = "lunch"
        let rows = vec![
            vec![(0, 2.0), (1, 1.0)],
            vec![(0, 1.0), (1, 2.0)],
            vec![(2, 1.0), (3, 1.0)],
            vec![(2, 2.0)],
        ];
        let labels = vec![true, true, false, false];

        let mut nb = MultinomialNb::new();
        nb.fit(&rows, &labels, 4).unwrap();

        assert_eq!(
            nb.predict(&[vec![(0, 1.0)], vec![(3, 1.0)], vec![(1, 1.0), (2, 1.0), (3, 1.0)]]),
            vec![true, false, false]
        );
    }

    #[test]
    fn test_empty_row_follows_prior() {
        let rows = vec![vec![(0, 1.0)], vec![(1, 1.0)], vec![(1, 1.0)]];
        let mut nb = MultinomialNb::new();
        nb.fit(&rows, &[true, false, false], 2).unwrap();
        assert_eq!(nb.predict(&[vec![]]), vec![false]);
    }

    #[test]
    fn test_single_class_training() {
        let mut nb = MultinomialNb::new();
        nb.fit(&[vec![(0, 1.0)]], &[false], 1).unwrap();
        assert_eq!(nb.predict(&[vec![(0, 5.0)]]), vec![false]);
    }

    #[test]
    fn test_shape_errors() {
        let mut nb = MultinomialNb::new();
        assert!(matches!(
            nb.fit(&[vec![]], &[true, false], 1),
            Err(LearnError::Shape(_))
        ));
        assert!(matches!(
            nb.fit(&[vec![(3, 1.0)]], &[true], 2),
            Err(LearnError::Shape(_))
        ));
        assert!(matches!(nb.fit(&[], &[], 2), Err(LearnError::EmptyDataset)));
    }
}
