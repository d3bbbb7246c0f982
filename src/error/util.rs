//! Utility functions for error handling
//!
//! File and directory checks that attach the offending path to the error.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{FeatureError, Result};

/// Open a file for reading, reporting why it was needed if that fails
///
/// # Arguments
/// * `path` - The path to the file to open
/// * `purpose` - Why the file is being opened (for error context)
pub fn safe_open_file(path: &Path, purpose: &str) -> Result<fs::File> {
    if !path.is_file() {
        return Err(FeatureError::io(
            path,
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found, needed for: {purpose}"),
            ),
        ));
    }

    fs::File::open(path).map_err(|e| {
        let context = match e.kind() {
            io::ErrorKind::PermissionDenied => "permission denied".to_string(),
            _ => format!("failed to open file for: {purpose}"),
        };
        FeatureError::io(path, io::Error::new(e.kind(), format!("{context}: {e}")))
    })
}

/// Check that a directory exists and is readable
pub fn validate_directory(path: &Path, purpose: &str) -> Result<()> {
    if !path.is_dir() {
        return Err(FeatureError::io(
            path,
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory not found, needed for: {purpose}"),
            ),
        ));
    }

    fs::read_dir(path)
        .map(|_| ())
        .map_err(|e| FeatureError::io(path, e))
}

/// Read a file to string with the path attached to any failure
pub fn safe_read_to_string(path: &Path, purpose: &str) -> Result<String> {
    let mut file = safe_open_file(path, purpose)?;
    let mut content = String::new();
    io::Read::read_to_string(&mut file, &mut content).map_err(|e| FeatureError::io(path, e))?;
    Ok(content)
}

/// Create a directory (and parents) for output
pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| FeatureError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_reports_path() {
        let err = safe_open_file(Path::new("/nonexistent/scaler.json"), "scaler").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/scaler.json"));
    }

    #[test]
    fn test_validate_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_directory(dir.path(), "encoders").is_ok());
        assert!(validate_directory(&dir.path().join("missing"), "encoders").is_err());
    }
}
