//! Local Observation Model
//!
//! Each node knows its own anchor and reads one light sensor. Its private
//! sub-objective is the squared mismatch between that reading and what a
//! light source at the shared estimate would produce at the anchor:
//!
//! ```text
//! g(x) = |x - anchor|^2 + B
//! f(x) = A / g(x) + C
//! ```
//!
//! The [`GradientStepEngine`] takes one fixed-step gradient descent step on
//! that sub-objective, entirely in scaled integers.

mod error;
mod gradient;
mod local;
mod sensor;

pub use error::{ModelError, Result};
pub use gradient::{BoundingBox, GradientStepEngine};
pub use local::{LocalModel, ModelParams};
pub use sensor::{calibrate_offset, FixedReading, LightSource, Sensor};

/// Step constant of the canonical deployment. Effective step is `STEP / 2^S`.
pub const CANONICAL_STEP: i64 = 2;

/// Model constant `A` of the canonical deployment, in sensor units times distance squared.
pub const CANONICAL_A: i64 = 56_000;

/// Model constant `B`: keeps `g` away from zero at the anchor.
pub const CANONICAL_B: i64 = 3;

/// Model constant `C`: ambient reading with no source present.
pub const CANONICAL_C: i64 = 88;

/// Samples averaged when calibrating `C` at startup.
pub const CALIBRATION_SAMPLES: u32 = 50;
