//! Tidy per-patient feature table
//!
//! One row per patient, one column per expected metric. The column set is
//! fixed when the table is created, so the output schema does not depend on
//! which metrics happen to be observed.

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashMap;

use crate::error::Result;

/// Values of one patient, aligned with the table's columns
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub key: String,
    pub values: Vec<Option<f64>>,
}

/// Wide table keyed by patient identifier
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    key_column: String,
    columns: Vec<String>,
    rows: Vec<FeatureRow>,
    index: FxHashMap<String, usize>,
}

impl FeatureTable {
    /// Empty table with a fixed column set
    pub fn new(key_column: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            key_column: key_column.into(),
            columns,
            rows: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Append a row; `values` must be aligned with the columns
    pub(crate) fn push_row(&mut self, key: String, values: Vec<Option<f64>>) {
        debug_assert_eq!(values.len(), self.columns.len());
        self.index.insert(key.clone(), self.rows.len());
        self.rows.push(FeatureRow { key, values });
    }

    #[must_use]
    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row of one patient
    #[must_use]
    pub fn row(&self, key: &str) -> Option<&FeatureRow> {
        self.index.get(key).map(|&idx| &self.rows[idx])
    }

    /// Position of a column
    #[must_use]
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Value of one patient and column; `None` when either is unknown or missing
    #[must_use]
    pub fn value(&self, key: &str, column: &str) -> Option<f64> {
        let col = self.column_index(column)?;
        self.row(key)?.values[col]
    }

    /// Values of one patient, all missing when the patient has no row
    #[must_use]
    pub fn values_or_missing(&self, key: &str) -> Vec<Option<f64>> {
        self.row(key)
            .map_or_else(|| vec![None; self.columns.len()], |row| row.values.clone())
    }

    /// Convert to an Arrow batch: the key as `Utf8`, every metric as nullable `Float64`
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = Vec::with_capacity(self.columns.len() + 1);
        fields.push(Field::new(&self.key_column, DataType::Utf8, false));
        fields.extend(
            self.columns
                .iter()
                .map(|c| Field::new(c, DataType::Float64, true)),
        );

        let mut keys = StringBuilder::new();
        for row in &self.rows {
            keys.append_value(&row.key);
        }

        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(fields.len());
        arrays.push(Arc::new(keys.finish()));
        for col in 0..self.columns.len() {
            let mut builder = Float64Builder::with_capacity(self.rows.len());
            for row in &self.rows {
                builder.append_option(row.values[col]);
            }
            arrays.push(Arc::new(builder.finish()));
        }

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;

    #[test]
    fn test_missing_patient_yields_missing_values() {
        let mut table = FeatureTable::new("PATIENTNR", vec!["Temp".into(), "HR".into()]);
        table.push_row("1".into(), vec![Some(0.5), None]);

        assert_eq!(table.value("1", "Temp"), Some(0.5));
        assert_eq!(table.value("1", "HR"), None);
        assert_eq!(table.values_or_missing("2"), vec![None, None]);
    }

    #[test]
    fn test_record_batch_schema() {
        let mut table = FeatureTable::new("PATIENTNR", vec!["Glucose".into()]);
        table.push_row("1".into(), vec![None]);

        let batch = table.to_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(batch.schema().field(1).name(), "Glucose");
        assert!(batch.column(1).is_null(0));
    }
}
