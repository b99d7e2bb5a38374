//! Pixel-level combination primitives.
//!
//! - [`running_mean`]: incremental mean used by the live accumulator.
//! - [`percentile_clip`]: outlier-rejecting batch combination for masters.
//! - [`hot_pixels`]: neighborhood outlier replacement.
//! - [`color`]: RGB interleave of per-channel stacks.

pub mod color;
mod error;
pub mod hot_pixels;
pub mod percentile_clip;
pub mod running_mean;

pub use error::Error;
pub use hot_pixels::{HotPixelConfig, remove_hot_pixels};
pub use percentile_clip::{PercentileClip, percentile_clip};
pub use running_mean::fold_into_mean;
