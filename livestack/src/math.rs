//! Numeric helpers shared by calibration, stacking and registration.

pub mod statistics;
