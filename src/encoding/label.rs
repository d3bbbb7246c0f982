//! Label encoding of a nominal column.

use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};

/// Maps each class seen at fit time to its index in sorted order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit on the observed values of a column
    pub fn fit<'a, I>(key: &str, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut classes: Vec<String> = values.into_iter().map(str::to_string).collect();
        classes.sort_unstable();
        classes.dedup();

        if classes.is_empty() {
            return Err(FeatureError::EmptyFit {
                key: key.to_string(),
            });
        }
        Ok(Self { classes })
    }

    /// Code for a value, `None` for a class never seen at fit time
    #[must_use]
    pub fn transform(&self, value: &str) -> Option<u32> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .ok()
            .and_then(|idx| u32::try_from(idx).ok())
    }

    /// Known classes in code order
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_sorted_classes() {
        let encoder = LabelEncoder::fit("GESLACHT", ["V", "M", "V", "O"]).unwrap();
        assert_eq!(encoder.classes(), ["M", "O", "V"]);
        assert_eq!(encoder.transform("M"), Some(0));
        assert_eq!(encoder.transform("V"), Some(2));
        assert_eq!(encoder.transform("X"), None);
    }
}
