//! Error types for cycinc-model.

use cycinc_fixed::FixedError;
use thiserror::Error;

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors that can occur while evaluating the model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Fixed-point arithmetic failed.
    #[error("fixed-point error: {0}")]
    Fixed(#[from] FixedError),

    /// The squared denominator rescaled to zero.
    #[error("model denominator vanished (g = {g})")]
    DegenerateDenominator { g: i64 },

    /// Calibration needs at least one sample.
    #[error("calibration requires at least one sample")]
    NoSamples,
}
