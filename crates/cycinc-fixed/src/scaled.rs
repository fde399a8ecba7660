//! Scaled values and the shift context that gives them meaning.

use std::ops::{Add, Neg, Sub};

use crate::FixedError;

/// Largest supported precision shift.
///
/// Keeps `1 << S` and the rescaled products of in-range values well inside
/// 64 bits.
pub const MAX_SHIFT: u32 = 24;

/// A real number stored as `round(v * 2^S)`.
///
/// The shift is not stored; see [`FixedPoint`]. `+`, `-` and negation
/// saturate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Scaled(pub i64);

impl Scaled {
    /// Zero at any scale.
    pub const ZERO: Self = Self(0);

    /// The underlying integer.
    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Saturating narrow from a wide intermediate.
    #[inline]
    pub fn saturate(wide: i128) -> Self {
        Self(wide.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64)
    }
}

impl Add for Scaled {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl Sub for Scaled {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl Neg for Scaled {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self(self.0.saturating_neg())
    }
}

impl std::fmt::Display for Scaled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed-point context: the shift `S` shared by every value of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedPoint {
    shift: u32,
}

impl FixedPoint {
    /// Create a context for shift `S`.
    pub const fn new(shift: u32) -> Result<Self, FixedError> {
        if shift > MAX_SHIFT {
            return Err(FixedError::ShiftTooLarge(shift));
        }
        Ok(Self { shift })
    }

    /// The precision shift `S`.
    #[inline]
    pub const fn shift(&self) -> u32 {
        self.shift
    }

    /// `1.0` at this scale.
    #[inline]
    pub const fn one(&self) -> Scaled {
        Scaled(1 << self.shift)
    }

    /// Scale an integer: `v << S`.
    #[inline]
    pub const fn from_int(&self, v: i64) -> Scaled {
        Scaled(v << self.shift)
    }

    /// Integer part, rounding toward negative infinity.
    #[inline]
    pub const fn to_int(&self, v: Scaled) -> i64 {
        v.0 >> self.shift
    }

    /// Nearest scaled value to a float.
    pub fn from_f64(&self, v: f64) -> Scaled {
        Scaled((v * (1u64 << self.shift) as f64).round() as i64)
    }

    /// Convert back to a float (for logs and tests).
    pub fn to_f64(&self, v: Scaled) -> f64 {
        v.0 as f64 / (1u64 << self.shift) as f64
    }

    /// `(a * b) >> S` with a 128-bit intermediate.
    ///
    /// Saturates if the rescaled product does not fit 64 bits; configuration
    /// validation rules that out for in-range values.
    #[inline]
    pub fn mul(&self, a: Scaled, b: Scaled) -> Scaled {
        Scaled::saturate((i128::from(a.0) * i128::from(b.0)) >> self.shift)
    }

    /// `(a << S) / b`, truncating toward zero.
    #[inline]
    pub fn div(&self, a: Scaled, b: Scaled) -> Result<Scaled, FixedError> {
        if b.0 == 0 {
            return Err(FixedError::DivideByZero);
        }
        Ok(Scaled::saturate((i128::from(a.0) << self.shift) / i128::from(b.0)))
    }

    /// Shift a wide product back down by `S`.
    #[inline]
    pub const fn rescale_wide(&self, wide: i128) -> i128 {
        wide >> self.shift
    }
}
