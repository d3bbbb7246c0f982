//! Log lines for file reads, domain runs and pipeline stages
//!
//! Every line names the file or domain it concerns so a training log can be
//! grepped per export.

use std::path::Path;
use std::time::Instant;

/// Announce work on one input or output file
pub fn log_operation_start(operation: &str, path: &Path) {
    log::info!("{operation}: {}", path.display());
}

/// Report the rows handled for one file and the time since `started`
pub fn log_operation_complete(operation: &str, path: &Path, rows: usize, started: Instant) {
    log::info!(
        "{operation} {rows} rows of {} in {:.2?}",
        path.display(),
        started.elapsed()
    );
}

/// Warn about a file that produced an unusable or empty result
pub fn log_warning(message: &str, path: Option<&Path>) {
    match path {
        Some(path) => log::warn!("{message} ({})", path.display()),
        None => log::warn!("{message}"),
    }
}

/// Rows of `domain` left after `stage`
pub fn log_stage(domain: &str, stage: &str, rows: usize) {
    log::info!("[{domain}] # of entries after {stage}: {rows}");
}
