//! Parquet input and output

use std::fs::File;
use std::path::Path;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::util::safe_open_file;
use crate::error::{FeatureError, Result};
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Read a Parquet file into record batches
///
/// # Arguments
/// * `path` - Path to the Parquet file
///
/// # Returns
/// The batches in file order
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>> {
    let start = std::time::Instant::now();
    log_operation_start("Reading parquet file", path);

    let file = safe_open_file(path, "Parquet input")?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;

    let rows = batches.iter().map(RecordBatch::num_rows).sum();
    log_operation_complete("Read", path, rows, start);
    Ok(batches)
}

/// Incremental Parquet writer (Snappy compressed)
pub struct ParquetBatchWriter {
    writer: ArrowWriter<File>,
    rows: usize,
}

impl ParquetBatchWriter {
    pub fn create(path: &Path, schema: SchemaRef) -> Result<Self> {
        let file = File::create(path).map_err(|e| FeatureError::io(path, e))?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let writer = ArrowWriter::try_new(file, schema, Some(props))?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        self.writer.write(batch)?;
        self.rows += batch.num_rows();
        Ok(())
    }

    /// Write the footer, returning the number of rows written
    pub fn finish(self) -> Result<usize> {
        self.writer.close()?;
        Ok(self.rows)
    }
}
