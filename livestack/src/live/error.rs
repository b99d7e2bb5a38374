use std::path::PathBuf;

use thiserror::Error;

use crate::calibration_masters::CalibrationError;
use crate::image_io::ImageIoError;
use crate::registration::RegistrationError;
use crate::stacking;

/// Errors raised while processing live frames or building flat masters.
#[derive(Debug, Error)]
pub enum LiveStackError {
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error("Alignment failed: {0}")]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Stacking(#[from] stacking::Error),

    #[error(transparent)]
    ImageIo(#[from] ImageIoError),

    #[error("Frame is {actual:?}, stack '{target}-{filter}' is {expected:?}")]
    BagDimensions {
        target: String,
        filter: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Stack '{target}-{filter}' has no data")]
    EmptyBag { target: String, filter: String },

    #[error("Filter '{filter}' has {found} flat frames, at least {required} are required")]
    InsufficientFrames {
        filter: String,
        found: usize,
        required: usize,
    },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid live stack configuration '{path}': {source}")]
    ConfigFormat {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },

    #[error("Frame queue is closed")]
    QueueClosed,

    #[error("Failed to start live stacking worker: {0}")]
    WorkerStart(#[source] std::io::Error),

    #[error("Live stacking worker panicked")]
    WorkerPanicked,

    #[error("Live stacking was cancelled")]
    Cancelled,
}

impl LiveStackError {
    /// Whether the error ends a processing run instead of skipping one frame.
    ///
    /// Calibration setup problems and dimension mismatches repeat for every
    /// following frame. Failed alignments, unreadable frames and failed
    /// writes only affect the current frame.
    pub fn is_fatal(&self) -> bool {
        match self {
            LiveStackError::Calibration(e) => e.is_configuration(),
            LiveStackError::BagDimensions { .. }
            | LiveStackError::Stacking(_)
            | LiveStackError::ConfigFormat { .. }
            | LiveStackError::WorkerPanicked => true,
            LiveStackError::Registration(_)
            | LiveStackError::ImageIo(_)
            | LiveStackError::EmptyBag { .. }
            | LiveStackError::InsufficientFrames { .. }
            | LiveStackError::Io { .. }
            | LiveStackError::QueueClosed
            | LiveStackError::WorkerStart(_)
            | LiveStackError::Cancelled => false,
        }
    }
}
