use thiserror::Error;

/// Reasons a frame cannot be aligned to its reference.
///
/// All variants are insufficient-data conditions: the frame is skipped and
/// processing continues.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistrationError {
    #[error("Only {found} usable stars, need at least {required}")]
    InsufficientStars { found: usize, required: usize },

    #[error("Only {found} star matches, need at least {required}")]
    InsufficientMatches { found: usize, required: usize },

    #[error("Matched stars are degenerate (collinear or coincident)")]
    DegenerateGeometry,
}
