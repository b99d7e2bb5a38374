use std::path::PathBuf;

use thiserror::Error;

use super::CalibrationKind;
use crate::image_io::ImageIoError;

/// Errors raised while selecting, loading or applying calibration masters.
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("Cannot open {kind} master '{path}': {source}")]
    MasterUnavailable {
        kind: CalibrationKind,
        path: PathBuf,
        #[source]
        source: ImageIoError,
    },

    #[error("Failed to read {kind} master '{path}': {source}")]
    MasterRead {
        kind: CalibrationKind,
        path: PathBuf,
        #[source]
        source: ImageIoError,
    },

    #[error("{kind} master '{path}' is {actual:?}, registered as {expected:?}")]
    MasterDimensions {
        kind: CalibrationKind,
        path: PathBuf,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Frame is {actual:?}, declared as {expected:?}")]
    FrameDimensions {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Failed to read frame: {0}")]
    FrameRead(#[source] ImageIoError),

    #[error("Failed to read calibration library '{path}': {source}")]
    LibraryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write calibration library '{path}': {source}")]
    LibraryWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid calibration library '{path}': {source}")]
    LibraryFormat {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },
}

impl CalibrationError {
    /// Whether the error stems from the calibration setup rather than the frame.
    ///
    /// Configuration errors repeat for every following frame and end the
    /// processing session.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, CalibrationError::FrameRead(_))
    }
}
