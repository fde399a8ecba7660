//! The shared iterate passed around the chain.

use std::ops::{Index, IndexMut};

use crate::{squared_norm, FixedPoint, Scaled};

/// Number of components in the shared estimate: column, row, height.
pub const ESTIMATE_DIM: usize = 3;

/// The jointly minimized quantity, one scaled value per dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Estimate(pub [Scaled; ESTIMATE_DIM]);

impl Estimate {
    /// All components zero.
    pub const ZERO: Self = Self([Scaled::ZERO; ESTIMATE_DIM]);

    /// Build from already-scaled raw integers.
    pub const fn from_raw(raw: [i64; ESTIMATE_DIM]) -> Self {
        Self([Scaled(raw[0]), Scaled(raw[1]), Scaled(raw[2])])
    }

    /// Build from whole real values, scaling each by `2^S`.
    pub fn from_ints(fx: &FixedPoint, values: [i64; ESTIMATE_DIM]) -> Self {
        Self(values.map(|v| fx.from_int(v)))
    }

    /// Raw integers, in wire order.
    pub fn raw(&self) -> [i64; ESTIMATE_DIM] {
        self.0.map(Scaled::raw)
    }

    /// Squared distance to another estimate, at scale `2S`.
    pub fn squared_distance(&self, other: &Self) -> i128 {
        squared_norm(&self.0, &other.0)
    }

    /// Index of the first component outside `[-limit, limit]`, if any.
    pub fn first_out_of_range(&self, limit: Scaled) -> Option<usize> {
        let limit = limit.raw().saturating_abs();
        self.0.iter().position(|v| v.raw().saturating_abs() > limit)
    }

    /// Whether every component lies within `[-limit, limit]`.
    pub fn within(&self, limit: Scaled) -> bool {
        self.first_out_of_range(limit).is_none()
    }

    /// Pull every component into `[-limit, limit]`.
    pub fn clamp_magnitude(&self, limit: Scaled) -> Self {
        let limit = Scaled(limit.raw().saturating_abs());
        Self(self.0.map(|v| v.clamp(-limit, limit)))
    }

    /// Iterate over the components.
    pub fn iter(&self) -> impl Iterator<Item = &Scaled> {
        self.0.iter()
    }

    /// Render as real values for logging.
    pub fn to_f64(&self, fx: &FixedPoint) -> [f64; ESTIMATE_DIM] {
        self.0.map(|v| fx.to_f64(v))
    }
}

impl Index<usize> for Estimate {
    type Output = Scaled;

    #[inline]
    fn index(&self, i: usize) -> &Scaled {
        &self.0[i]
    }
}

impl IndexMut<usize> for Estimate {
    #[inline]
    fn index_mut(&mut self, i: usize) -> &mut Scaled {
        &mut self.0[i]
    }
}

impl std::fmt::Display for Estimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}, {}]", self.0[0], self.0[1], self.0[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_ints_scales_every_component() {
        let fx = FixedPoint::new(9).unwrap();
        let e = Estimate::from_ints(&fx, [30, 30, 10]);
        assert_eq!(e.raw(), [15360, 15360, 5120]);
        assert_eq!(e.to_f64(&fx), [30.0, 30.0, 10.0]);
    }

    #[test]
    fn squared_distance_matches_norm() {
        let a = Estimate::from_raw([1, 2, 3]);
        let b = Estimate::from_raw([4, 6, 3]);
        assert_eq!(a.squared_distance(&b), 25);
        assert_eq!(Estimate::ZERO.squared_distance(&Estimate::ZERO), 0);
    }

    #[test]
    fn index_access() {
        let mut e = Estimate::from_raw([1, 2, 3]);
        e[2] = Scaled(9);
        assert_eq!(e[0], Scaled(1));
        assert_eq!(e[2], Scaled(9));
        assert_eq!(e.to_string(), "[1, 2, 9]");
    }

    #[test]
    fn range_check_and_clamp() {
        let limit = Scaled(100);
        let inside = Estimate::from_raw([100, -100, 0]);
        assert!(inside.within(limit));
        assert_eq!(inside.clamp_magnitude(limit), inside);

        let outside = Estimate::from_raw([5, i64::MIN, i64::MAX]);
        assert_eq!(outside.first_out_of_range(limit), Some(1));
        assert_eq!(outside.clamp_magnitude(limit).raw(), [5, -100, 100]);
    }
}
