//! Scaled-integer arithmetic for the cyclic incremental chain.
//!
//! Sensor motes have no FPU, so every real quantity in the algorithm is carried
//! as a signed integer `round(v * 2^S)` for one shared shift `S`.
//!
//! # Rules
//!
//! - Addition and subtraction need no rescaling and saturate at the 64-bit
//!   range instead of wrapping.
//! - `mul(a, b) = (a * b) >> S`, computed in a 128-bit intermediate.
//! - `div(a, b) = (a << S) / b`, with `b == 0` reported as an error.
//! - [`squared_norm`] is returned un-rescaled (scale `2S`); callers shift it
//!   down when they need a value at scale `S`.
//!
//! Mixing values produced under different shifts is a programming error. The
//! types here cannot detect it; every value in a chain is built from the one
//! [`FixedPoint`] held by the chain configuration.

mod scaled;
mod estimate;

pub use scaled::{FixedPoint, Scaled, MAX_SHIFT};
pub use estimate::{Estimate, ESTIMATE_DIM};

use thiserror::Error;

/// Errors raised by fixed-point operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FixedError {
    /// Division by a zero divisor.
    #[error("division by zero")]
    DivideByZero,

    /// Shift does not leave room for a 64-bit product rescale.
    #[error("precision shift {0} exceeds maximum of {max}", max = MAX_SHIFT)]
    ShiftTooLarge(u32),
}

/// Squared Euclidean distance between two vectors of scaled values.
///
/// The result is at scale `2S`, accumulated in 128 bits and saturating at
/// `i128::MAX` for components far apart. Both slices must have the same
/// length.
pub fn squared_norm(u: &[Scaled], v: &[Scaled]) -> i128 {
    debug_assert_eq!(u.len(), v.len(), "squared_norm over mismatched lengths");
    u.iter()
        .zip(v)
        .map(|(a, b)| {
            let d = i128::from(a.raw()) - i128::from(b.raw());
            d.saturating_mul(d)
        })
        .fold(0, i128::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squared_norm_is_unscaled() {
        let fx = FixedPoint::new(9).unwrap();
        let u = [fx.from_int(3), fx.from_int(4)];
        let v = [Scaled::ZERO, Scaled::ZERO];

        // 3^2 + 4^2 = 25 at scale 2S
        assert_eq!(squared_norm(&u, &v), 25 << 18);
        assert_eq!(fx.rescale_wide(squared_norm(&u, &v)), 25 << 9);
    }

    #[test]
    fn squared_norm_symmetric() {
        let u = [Scaled(7), Scaled(-3), Scaled(100)];
        let v = [Scaled(-2), Scaled(5), Scaled(0)];
        assert_eq!(squared_norm(&u, &v), squared_norm(&v, &u));
        assert_eq!(squared_norm(&u, &u), 0);
    }

    #[test]
    fn squared_norm_saturates_at_extremes() {
        let u = [Scaled(i64::MAX), Scaled(i64::MAX)];
        let v = [Scaled(i64::MIN), Scaled(i64::MIN)];
        assert_eq!(squared_norm(&u, &v), i128::MAX);
    }

    #[test]
    fn shift_error_names_the_limit() {
        assert_eq!(
            FixedError::ShiftTooLarge(30).to_string(),
            format!("precision shift 30 exceeds maximum of {}", MAX_SHIFT)
        );
    }
}
