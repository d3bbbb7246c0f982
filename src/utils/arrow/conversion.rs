//! Conversion between record batches and typed rows using `serde_arrow`.

use std::sync::Arc;

use arrow::datatypes::{FieldRef, Schema};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};

/// Deserialize rows from a sequence of record batches
pub fn batches_to_rows<T>(batches: &[RecordBatch]) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let mut rows = Vec::with_capacity(batches.iter().map(RecordBatch::num_rows).sum());
    for batch in batches {
        let mut part: Vec<T> = serde_arrow::from_record_batch(batch)
            .map_err(|e| FeatureError::RowConversion(format!("Failed to deserialize: {e}")))?;
        rows.append(&mut part);
    }
    Ok(rows)
}

/// Row types with a declared Arrow layout
///
/// The layout is declared rather than traced: timestamps go through a text
/// adapter that the schema tracer cannot follow, and an empty table still
/// needs its columns.
pub trait ArrowRow: Serialize {
    /// Schema the rows serialize into, in field order
    fn schema() -> Schema;
}

/// Serialize rows into one record batch with the declared schema of `T`
pub fn rows_to_batch<T: ArrowRow>(rows: &[T]) -> Result<RecordBatch> {
    let schema = T::schema();
    if rows.is_empty() {
        return Ok(RecordBatch::new_empty(Arc::new(schema)));
    }
    let fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
    serde_arrow::to_record_batch(&fields, &rows)
        .map_err(|e| FeatureError::RowConversion(format!("Serialization error: {e}")))
}
