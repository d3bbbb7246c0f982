//! One-hot encoding of a nominal column.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};

/// Category a missing input value encodes as
pub const MISSING_CATEGORY: &str = "nan";

/// One indicator column per category kept at fit time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    column: String,
    categories: Vec<String>,
}

impl OneHotEncoder {
    /// Fit on the observed values of a column
    ///
    /// # Arguments
    /// * `column` - Source column name, the prefix of every output column
    /// * `values` - Observed values; `None` counts as [`MISSING_CATEGORY`]
    /// * `min_count` - Categories seen fewer times are pruned
    pub fn fit<'a, I>(column: &str, values: I, min_count: usize) -> Result<Self>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let counts = values
            .into_iter()
            .map(|v| v.unwrap_or(MISSING_CATEGORY))
            .counts();

        if counts.is_empty() {
            return Err(FeatureError::EmptyFit {
                key: column.to_string(),
            });
        }

        let total = counts.len();
        let categories: Vec<String> = counts
            .into_iter()
            .filter(|(_, n)| *n >= min_count)
            .map(|(category, _)| category.to_string())
            .sorted()
            .collect();

        if categories.len() < total {
            log::info!(
                "{column}: pruned {} of {total} categories seen fewer than {min_count} times",
                total - categories.len()
            );
        }

        Ok(Self {
            column: column.to_string(),
            categories,
        })
    }

    /// Source column name
    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Kept categories in output order
    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Output column names (`<COLUMN>_<category>`)
    #[must_use]
    pub fn feature_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|category| format!("{}_{category}", self.column))
            .collect()
    }

    /// Indicator values for one input
    ///
    /// An unknown or pruned category sets no indicator.
    #[must_use]
    pub fn transform(&self, value: Option<&str>) -> Vec<f64> {
        let value = value.unwrap_or(MISSING_CATEGORY);
        self.categories
            .iter()
            .map(|category| if category == value { 1.0 } else { 0.0 })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_becomes_nan_category() {
        let encoder = OneHotEncoder::fit("VVCODE", [Some("EV"), None, Some("AMB")], 1).unwrap();
        assert_eq!(
            encoder.feature_names(),
            vec!["VVCODE_AMB", "VVCODE_EV", "VVCODE_nan"]
        );
        assert_eq!(encoder.transform(None), vec![0.0, 0.0, 1.0]);
        assert_eq!(encoder.transform(Some("HELI")), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_rare_categories_are_pruned() {
        let values = [Some("INT"), Some("INT"), Some("CHI"), Some("INT"), Some("CHI"), Some("OOG")];
        let encoder = OneHotEncoder::fit("SPECIALISM", values, 2).unwrap();

        assert_eq!(encoder.categories(), ["CHI", "INT"]);
        assert_eq!(encoder.transform(Some("OOG")), vec![0.0, 0.0]);
        assert_eq!(encoder.transform(Some("INT")), vec![0.0, 1.0]);
    }
}
