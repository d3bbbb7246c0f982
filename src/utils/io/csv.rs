//! Semicolon-delimited tabular files
//!
//! Hospital exports are read with every column typed as text; parsing is
//! left to the pipelines so one malformed value cannot fail the file.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use arrow::csv::reader::ReaderBuilder;
use arrow::csv::writer::{Writer, WriterBuilder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use crate::error::util::safe_open_file;
use crate::error::{FeatureError, Result};
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Field delimiter of every input and output file
pub const DELIMITER: u8 = b';';

/// Rows per batch when reading
pub const READ_BATCH_SIZE: usize = 8192;

/// Read the header line and derive an all-text schema from it
pub fn header_schema(path: &Path) -> Result<SchemaRef> {
    let file = safe_open_file(path, "CSV input")?;
    let mut header = String::new();
    BufReader::new(file)
        .read_line(&mut header)
        .map_err(|e| FeatureError::io(path, e))?;

    let fields: Vec<Field> = header
        .trim_start_matches('\u{feff}')
        .trim_end_matches(['\r', '\n'])
        .split(DELIMITER as char)
        .map(|name| Field::new(name.trim().trim_matches('"'), DataType::Utf8, true))
        .collect();

    Ok(Arc::new(Schema::new(fields)))
}

/// Read a semicolon-delimited file into text-typed record batches
pub fn read_csv(path: &Path) -> Result<Vec<RecordBatch>> {
    let start = std::time::Instant::now();
    log_operation_start("Reading CSV file", path);

    let schema = header_schema(path)?;
    let file = safe_open_file(path, "CSV input")?;
    let reader = ReaderBuilder::new(schema)
        .with_header(true)
        .with_delimiter(DELIMITER)
        .with_batch_size(READ_BATCH_SIZE)
        .build(file)?;

    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;

    let rows = batches.iter().map(RecordBatch::num_rows).sum();
    log_operation_complete("Read", path, rows, start);
    Ok(batches)
}

/// Incremental semicolon-delimited writer; the header is written once
pub struct CsvBatchWriter {
    writer: Writer<File>,
    rows: usize,
}

impl CsvBatchWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| FeatureError::io(path, e))?;
        let writer = WriterBuilder::new()
            .with_header(true)
            .with_delimiter(DELIMITER)
            .build(file);
        Ok(Self { writer, rows: 0 })
    }

    pub fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        self.writer.write(batch)?;
        self.rows += batch.num_rows();
        Ok(())
    }

    /// Close the file, returning the number of rows written
    pub fn finish(self) -> Result<usize> {
        drop(self.writer.into_inner());
        Ok(self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, StringArray};
    use std::io::Write;

    #[test]
    fn test_header_schema_is_all_text() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "PATIENTNR;LABEL;Value1").unwrap();
        writeln!(file, "1;HR;80").unwrap();

        let schema = header_schema(file.path()).unwrap();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["PATIENTNR", "LABEL", "Value1"]);
        assert!(schema.fields().iter().all(|f| f.data_type() == &DataType::Utf8));
    }

    #[test]
    fn test_read_keeps_values_as_text() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "PATIENTNR;Value1").unwrap();
        writeln!(file, "1;37,5").unwrap();
        writeln!(file, "2;").unwrap();

        let batches = read_csv(file.path()).unwrap();
        let values = batches[0]
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(values.value(0), "37,5");
        assert!(values.is_null(1) || values.value(1).is_empty());
    }
}
