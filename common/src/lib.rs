pub mod cancel;
pub mod file_utils;
pub mod log_setup;

pub use cancel::CancellationToken;

pub const EPSILON: f64 = 1e-6;
