//! Complaint text classifier: TF-IDF features scored by logistic regression.
//!
//! Mirrors a fitted scikit-learn `TfidfVectorizer` (default token pattern,
//! lowercasing, raw term counts, L2 normalization) followed by a binary
//! `LogisticRegression`. The model file is JSON:
//!
//! ```json
//! { "vocabulary": { "pijn": 0, "borst": 1 },
//!   "idf": [1.4, 2.1],
//!   "coef": [0.3, 1.2],
//!   "intercept": -0.8 }
//! ```

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::util::safe_read_to_string;
use crate::error::{FeatureError, Result};
use crate::inference::tree::sigmoid;

// Tokens of two or more word characters
static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("valid token pattern"));

const fn default_true() -> bool {
    true
}

/// Fitted complaint classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintClassifier {
    vocabulary: FxHashMap<String, usize>,
    idf: Vec<f64>,
    coef: Vec<f64>,
    intercept: f64,
    #[serde(default = "default_true")]
    lowercase: bool,
}

impl ComplaintClassifier {
    /// Load and validate a classifier file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = safe_read_to_string(path, "complaint classifier")?;
        let model: Self = serde_json::from_str(&content).map_err(|e| FeatureError::InvalidModel {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        model.validate().map_err(|reason| FeatureError::InvalidModel {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(model)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let terms = self.idf.len();
        if self.coef.len() != terms {
            return Err(format!(
                "{} coefficients for {terms} idf weights",
                self.coef.len()
            ));
        }
        if let Some((term, index)) = self.vocabulary.iter().find(|(_, i)| **i >= terms) {
            return Err(format!("term {term} has index {index} beyond {terms} weights"));
        }
        Ok(())
    }

    /// L2-normalized TF-IDF vector of a text, as sparse (index, weight) pairs
    #[must_use]
    pub fn vectorize(&self, text: &str) -> Vec<(usize, f64)> {
        let text = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        let mut counts: FxHashMap<usize, f64> = FxHashMap::default();
        for token in TOKEN_PATTERN.find_iter(&text) {
            if let Some(&index) = self.vocabulary.get(token.as_str()) {
                *counts.entry(index).or_default() += 1.0;
            }
        }

        let mut weights: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(index, count)| (index, count * self.idf[index]))
            .collect();
        weights.sort_unstable_by_key(|(index, _)| *index);

        let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut weights {
                *w /= norm;
            }
        }
        weights
    }

    /// Probability that the complaint belongs to an admitted visit
    #[must_use]
    pub fn predict_proba(&self, text: &str) -> f64 {
        let margin = self
            .vectorize(text)
            .into_iter()
            .map(|(index, weight)| weight * self.coef[index])
            .sum::<f64>()
            + self.intercept;
        sigmoid(margin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> ComplaintClassifier {
        serde_json::from_str(
            r#"{ "vocabulary": { "pijn": 0, "borst": 1, "val": 2 },
                 "idf": [1.0, 2.0, 1.5],
                 "coef": [0.5, 2.0, -1.0],
                 "intercept": -0.5 }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_vector_is_l2_normalized() {
        let weights = classifier().vectorize("Pijn borst pijn");
        let norm: f64 = weights.iter().map(|(_, w)| w * w).sum();
        assert!((norm - 1.0).abs() < 1e-12);
        assert_eq!(weights.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_unknown_text_scores_intercept() {
        let p = classifier().predict_proba("hoofd x");
        assert!((p - sigmoid(-0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_single_term() {
        // One known term normalizes to weight 1
        let p = classifier().predict_proba("borst");
        assert!((p - sigmoid(1.5)).abs() < 1e-12);
    }

    #[test]
    fn test_validation_catches_short_coefficients() {
        let mut model = classifier();
        model.coef.pop();
        assert!(model.validate().is_err());
    }
}
