//! Error types for stacking operations.

use thiserror::Error;

use crate::image_io::ImageIoError;

/// Errors that can occur during stacking operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("No frames provided for stacking")]
    NoFrames,

    #[error("Dimension mismatch for frame {index}: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        index: usize,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Buffer has {actual} pixels, expected {expected}")]
    BufferLength { expected: usize, actual: usize },

    #[error("Got {actual} frame medians for {expected} frames")]
    MedianCount { expected: usize, actual: usize },

    #[error("Failed to read frame {index}: {source}")]
    Read {
        index: usize,
        #[source]
        source: ImageIoError,
    },
}
