//! Long-to-wide pivot into the tidy per-patient table.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::error::{FeatureError, Result};
use crate::models::FeatureTable;

/// Pivot `(patient, metric, value)` triples into one row per patient
///
/// Every expected metric becomes a column; metrics a patient has no
/// observation for are missing. Rows are ordered by patient identifier.
///
/// # Errors
/// * [`FeatureError::AmbiguousPivot`] when a (patient, metric) pair occurs twice
/// * [`FeatureError::UnexpectedMetric`] when a metric is not an expected column
pub fn pivot<I>(key_column: &str, expected: &[String], observations: I) -> Result<FeatureTable>
where
    I: IntoIterator<Item = (String, String, Option<f64>)>,
{
    let positions: FxHashMap<&str, usize> = expected
        .iter()
        .enumerate()
        .map(|(idx, metric)| (metric.as_str(), idx))
        .collect();

    // Values plus a filled flag, so a duplicate missing value is still caught
    let mut wide: BTreeMap<String, Vec<(Option<f64>, bool)>> = BTreeMap::new();

    for (patient, metric, value) in observations {
        let col = *positions
            .get(metric.as_str())
            .ok_or_else(|| FeatureError::UnexpectedMetric(metric.clone()))?;

        let row = wide
            .entry(patient.clone())
            .or_insert_with(|| vec![(None, false); expected.len()]);

        if row[col].1 {
            return Err(FeatureError::AmbiguousPivot { patient, metric });
        }
        row[col] = (value, true);
    }

    let mut table = FeatureTable::new(key_column, expected.to_vec());
    for (patient, cells) in wide {
        table.push_row(patient, cells.into_iter().map(|(v, _)| v).collect());
    }
    Ok(table)
}
