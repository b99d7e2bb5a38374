//! Calibration masters: registry, lookup and per-frame correction.
//!
//! A [`CalibrationLibrary`] holds ordered lists of bias, dark and flat master
//! descriptors. A [`CalibrationSession`] snapshots the library, selects the
//! best master per channel for each frame, memoizes master rows for its
//! lifetime and releases the underlying files when dropped.

mod error;
mod library;
mod master;
mod meta;
mod session;

pub use error::CalibrationError;
pub use library::CalibrationLibrary;
pub use master::CalibrationMaster;
pub use meta::{CalibrationFrameMeta, CalibrationKind, FrameIdentity, NO_FILTER, WILDCARD, normalize_filter};
pub use session::CalibrationSession;
