use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading or writing image files.
#[derive(Debug, Error)]
pub enum ImageIoError {
    #[error("FITS error on '{path}': {source}")]
    Fits {
        path: PathBuf,
        source: fitsio::errors::Error,
    },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unsupported image layout in '{path}': {reason}")]
    UnsupportedLayout { path: PathBuf, reason: String },

    #[error("Row {row} out of range for image height {height}")]
    RowOutOfRange { row: usize, height: usize },

    #[error("Row {row} has {actual} pixels, expected {expected}")]
    RowLength {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Pixel buffer has {actual} elements, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_message_contains_path() {
        let err = ImageIoError::Io {
            path: PathBuf::from("/frames/light_001.fits"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/frames/light_001.fits"));
        assert!(msg.contains("file not found"));
    }

    #[test]
    fn test_row_out_of_range_message() {
        let err = ImageIoError::RowOutOfRange { row: 12, height: 10 };
        assert_eq!(err.to_string(), "Row 12 out of range for image height 10");
    }
}
