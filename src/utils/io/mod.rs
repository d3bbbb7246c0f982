//! File input and output
//!
//! Input tables are semicolon CSV or Parquet, chosen by file extension.
//! Outputs are written incrementally through a [`TableWriter`] in the
//! configured [`OutputFormat`].

pub mod csv;
pub mod parquet;

use std::path::{Path, PathBuf};

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};
use crate::models::SourceRecord;
use crate::utils::arrow::conversion::batches_to_rows;

pub use self::csv::{CsvBatchWriter, read_csv};
pub use self::parquet::{ParquetBatchWriter, read_parquet};

/// Format of the training output files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

impl OutputFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
        }
    }
}

/// Read a table, dispatching on the file extension (Parquet, else CSV)
pub fn read_table(path: &Path) -> Result<Vec<RecordBatch>> {
    if path.extension().is_some_and(|ext| ext == "parquet") {
        read_parquet(path)
    } else {
        read_csv(path)
    }
}

/// Read a source table into typed raw records
///
/// Every column the domain requires must be present in the file header.
pub fn read_records<T: SourceRecord>(path: &Path) -> Result<Vec<T>> {
    let batches = read_table(path)?;

    if let Some(first) = batches.first() {
        let schema = first.schema();
        if let Some(column) = T::REQUIRED_COLUMNS
            .iter()
            .find(|column| schema.index_of(column).is_err())
        {
            return Err(FeatureError::MissingColumn {
                domain: T::DOMAIN,
                column: (*column).to_string(),
            });
        }
    }

    let rows = batches_to_rows(&batches)?;
    log::info!("Number of starting {} entries: {}", T::DOMAIN, rows.len());
    Ok(rows)
}

/// Directory for training outputs next to an input file: `<input dir>/processed`
#[must_use]
pub fn default_output_dir(input: &Path) -> PathBuf {
    input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("processed")
}

/// Dated output file: `<dir>/<YYYY-MM-DD>_<name>.<ext>`
#[must_use]
pub fn dated_output_path(dir: &Path, date: NaiveDate, name: &str, format: OutputFormat) -> PathBuf {
    dir.join(format!(
        "{}_{name}.{}",
        date.format("%Y-%m-%d"),
        format.extension()
    ))
}

/// Batch writer for either output format
pub enum TableWriter {
    Csv(CsvBatchWriter),
    Parquet(ParquetBatchWriter),
}

impl TableWriter {
    pub fn create(path: &Path, schema: SchemaRef, format: OutputFormat) -> Result<Self> {
        Ok(match format {
            OutputFormat::Csv => Self::Csv(CsvBatchWriter::create(path)?),
            OutputFormat::Parquet => Self::Parquet(ParquetBatchWriter::create(path, schema)?),
        })
    }

    pub fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        match self {
            Self::Csv(writer) => writer.write(batch),
            Self::Parquet(writer) => writer.write(batch),
        }
    }

    /// Close the file, returning the number of rows written
    pub fn finish(self) -> Result<usize> {
        match self {
            Self::Csv(writer) => writer.finish(),
            Self::Parquet(writer) => writer.finish(),
        }
    }
}

/// Write one batch to a new file
pub fn write_table(path: &Path, batch: &RecordBatch, format: OutputFormat) -> Result<()> {
    let start = std::time::Instant::now();
    let mut writer = TableWriter::create(path, batch.schema(), format)?;
    writer.write(batch)?;
    let rows = writer.finish()?;
    log::info!(
        "Wrote {rows} rows to {} in {:?}",
        path.display(),
        start.elapsed()
    );
    Ok(())
}
