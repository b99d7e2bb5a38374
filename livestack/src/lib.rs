//! Livestack - streaming calibration, registration and stacking of
//! astronomical frames.
//!
//! Frames arrive with their detected stars, are corrected with the best
//! matching bias/dark/flat masters, aligned to the first frame of their
//! (target, filter) stack by triangle-similarity star matching and folded
//! into a running mean that is persisted after every update.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use livestack::{CalibrationLibrary, FitsCodec, LiveStackConfig, LiveStackWorker};
//!
//! let worker = LiveStackWorker::spawn(LiveStackConfig::default(), CalibrationLibrary::new(), Arc::new(FitsCodec))?;
//! let queue = worker.queue();
//! queue.blocking_enqueue(item)?;
//! drop(queue);
//! let summary = worker.finish()?;
//! ```

pub mod calibration_masters;
pub mod image_io;
pub mod live;
pub mod math;
pub mod registration;
pub mod stacking;

#[cfg(test)]
mod testing;

// ============================================================================
// Image I/O
// ============================================================================

pub use image_io::{FitsCodec, HeaderCard, ImageCodec, ImageIoError, MemoryPixelSource, PixelSource};

// ============================================================================
// Calibration
// ============================================================================

pub use calibration_masters::{
    CalibrationError, CalibrationFrameMeta, CalibrationKind, CalibrationLibrary, CalibrationSession, FrameIdentity,
};

// ============================================================================
// Registration
// ============================================================================

pub use registration::{
    AffineTransform, Alignment, DetectedStar, RegistrationConfig, RegistrationError, align, warp_affine,
};

// ============================================================================
// Stacking
// ============================================================================

pub use stacking::{HotPixelConfig, PercentileClip, fold_into_mean, percentile_clip, remove_hot_pixels};

// ============================================================================
// Live stacking
// ============================================================================

pub use live::{
    BagKey, FlatMasterBuilder, FrameOutcome, FrameQueue, LiveStackBag, LiveStackConfig, LiveStackError,
    LiveStackItem, LiveStackSession, LiveStackWorker, QualityGate, RunSummary,
};
