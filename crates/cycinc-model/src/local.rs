//! The observation model `f` and its denominator `g`.

use cycinc_fixed::{Estimate, FixedPoint, Scaled};

use crate::error::Result;
use crate::{CANONICAL_A, CANONICAL_B, CANONICAL_C, CANONICAL_STEP};

/// Model constants, already scaled by `2^S`, plus the raw step constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModelParams {
    /// Source strength
    pub a: Scaled,
    /// Denominator offset, strictly positive
    pub b: Scaled,
    /// Ambient offset
    pub c: Scaled,
    /// Unscaled step constant
    pub step: i64,
}

impl ModelParams {
    /// Scale whole-unit constants.
    pub fn from_units(fx: &FixedPoint, a: i64, b: i64, c: i64, step: i64) -> Self {
        Self {
            a: fx.from_int(a),
            b: fx.from_int(b),
            c: fx.from_int(c),
            step,
        }
    }

    /// Constants of the canonical deployment.
    pub fn canonical(fx: &FixedPoint) -> Self {
        Self::from_units(fx, CANONICAL_A, CANONICAL_B, CANONICAL_C, CANONICAL_STEP)
    }

    /// Replace the ambient offset (after calibration).
    #[must_use]
    pub fn with_offset(mut self, c: Scaled) -> Self {
        self.c = c;
        self
    }
}

/// One node's view of the model: its anchor and the shared constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalModel {
    fx: FixedPoint,
    anchor: Estimate,
    params: ModelParams,
}

impl LocalModel {
    /// Create a model for the node at `anchor`.
    pub fn new(fx: FixedPoint, anchor: Estimate, params: ModelParams) -> Self {
        Self { fx, anchor, params }
    }

    /// Fixed-point context.
    pub fn fixed(&self) -> &FixedPoint {
        &self.fx
    }

    /// This node's anchor.
    pub fn anchor(&self) -> &Estimate {
        &self.anchor
    }

    /// Model constants.
    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// `g(x) = (|x - anchor|^2 >> S) + B`.
    ///
    /// Strictly positive whenever `B > 0`.
    pub fn g(&self, estimate: &Estimate) -> Scaled {
        let dist = self.fx.rescale_wide(estimate.squared_distance(&self.anchor));
        Scaled::saturate(dist) + self.params.b
    }

    /// `f(x) = (A << S) / g(x) + C`: the reading a source at `x` would produce here.
    pub fn f(&self, estimate: &Estimate) -> Result<Scaled> {
        self.f_from_g(self.g(estimate))
    }

    /// `f` given an already computed `g`.
    pub(crate) fn f_from_g(&self, g: Scaled) -> Result<Scaled> {
        Ok(self.fx.div(self.params.a, g)? + self.params.c)
    }
}
