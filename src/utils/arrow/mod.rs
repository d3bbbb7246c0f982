//! Arrow data handling utilities

pub mod conversion;

pub use conversion::{ArrowRow, batches_to_rows, rows_to_batch};
