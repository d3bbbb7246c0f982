//! Min-max scaling of one numeric metric.

use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};

/// Scales values into `[0, 1]` relative to the range seen at fit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub data_min: f64,
    pub data_max: f64,
}

impl MinMaxScaler {
    /// Fit on the observed values of one metric
    ///
    /// # Arguments
    /// * `key` - Metric name, used in the error when nothing can be fitted
    /// * `values` - Observed values; non-finite values are ignored
    pub fn fit(key: &str, values: &[f64]) -> Result<Self> {
        let mut usable = values.iter().copied().filter(|v| v.is_finite());

        let first = usable.next().ok_or_else(|| FeatureError::EmptyFit {
            key: key.to_string(),
        })?;

        let (data_min, data_max) =
            usable.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));

        Ok(Self { data_min, data_max })
    }

    fn scale(&self) -> f64 {
        let range = self.data_max - self.data_min;
        if range == 0.0 { 1.0 } else { range }
    }

    /// Scale one value
    ///
    /// Values outside the fitted range are not clamped.
    #[must_use]
    pub fn transform(&self, value: f64) -> f64 {
        (value - self.data_min) / self.scale()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_and_transform() {
        let scaler = MinMaxScaler::fit("HR", &[45.0, 80.0, 60.0]).unwrap();
        assert_eq!(scaler.transform(45.0), 0.0);
        assert_eq!(scaler.transform(80.0), 1.0);
        assert!((scaler.transform(62.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_zero_range_uses_unit_divisor() {
        let scaler = MinMaxScaler::fit("Kalium", &[4.0, 4.0]).unwrap();
        assert_eq!(scaler.transform(4.0), 0.0);
        assert_eq!(scaler.transform(5.5), 1.5);
    }

    #[test]
    fn test_out_of_range_is_not_clamped() {
        let scaler = MinMaxScaler::fit("CRP", &[f64::NAN, 10.0, 20.0]).unwrap();
        assert_eq!(scaler.data_min, 10.0);
        assert_eq!(scaler.transform(30.0), 2.0);
    }

    #[test]
    fn test_empty_fit_fails() {
        let err = MinMaxScaler::fit("LD", &[f64::NAN]).unwrap_err();
        assert!(matches!(err, FeatureError::EmptyFit { key } if key == "LD"));
    }
}
