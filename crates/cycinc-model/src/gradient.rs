//! One fixed-step gradient descent step on the local sub-objective.
//!
//! Per dimension:
//!
//! ```text
//! next[i] = x[i] - ((step * 4 * A * (reading - f(x)) / g(x)^2) >> S) * (x[i] - anchor[i])
//! ```
//!
//! The integer evaluation order is part of the algorithm: numerator terms are
//! multiplied first, then divided by `g^2`, and only then multiplied by the
//! positional delta. Reordering changes the rounding and therefore the
//! trajectory every node in the chain observes.

use cycinc_fixed::{Estimate, FixedPoint, Scaled, ESTIMATE_DIM};
use cycinc_topology::GridBounds;

use crate::error::{ModelError, Result};
use crate::local::LocalModel;
use crate::sensor::Sensor;

/// Height band of the optional clamp, in grid spacings.
const CLAMP_MIN_HEIGHT: i64 = 3;
const CLAMP_MAX_HEIGHT: i64 = 30;

/// Axis-aligned box the estimate may be clamped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min: Estimate,
    pub max: Estimate,
}

impl BoundingBox {
    /// One grid cell of margin around the deployment, with a fixed height band.
    pub fn around(bounds: &GridBounds, spacing: i64, fx: &FixedPoint) -> Self {
        Self {
            min: Estimate([
                fx.from_int((bounds.min_col - 1) * spacing),
                fx.from_int((bounds.min_row - 1) * spacing),
                fx.from_int(CLAMP_MIN_HEIGHT * spacing),
            ]),
            max: Estimate([
                fx.from_int((bounds.max_col + 1) * spacing),
                fx.from_int((bounds.max_row + 1) * spacing),
                fx.from_int(CLAMP_MAX_HEIGHT * spacing),
            ]),
        }
    }

    /// Pull every component into range.
    pub fn clamp(&self, estimate: &Estimate) -> Estimate {
        let mut out = *estimate;
        for i in 0..ESTIMATE_DIM {
            out[i] = estimate[i].clamp(self.min[i], self.max[i]);
        }
        out
    }
}

/// Computes the next shared estimate for one node.
#[derive(Debug, Clone, Copy)]
pub struct GradientStepEngine {
    model: LocalModel,
    clamp: Option<BoundingBox>,
}

impl GradientStepEngine {
    /// Create an engine with no clamp.
    pub fn new(model: LocalModel) -> Self {
        Self { model, clamp: None }
    }

    /// Clamp every output into `bounds`.
    #[must_use]
    pub fn with_clamp(mut self, bounds: BoundingBox) -> Self {
        self.clamp = Some(bounds);
        self
    }

    /// The model this engine steps on.
    pub fn model(&self) -> &LocalModel {
        &self.model
    }

    /// Read one sensor sample and step.
    pub fn step<S: Sensor + ?Sized>(&self, estimate: &Estimate, sensor: &mut S) -> Result<Estimate> {
        self.step_with_reading(estimate, sensor.read())
    }

    /// Step using a reading in raw sensor units.
    pub fn step_with_reading(&self, estimate: &Estimate, reading: i64) -> Result<Estimate> {
        let fx = self.model.fixed();
        let params = self.model.params();
        let anchor = self.model.anchor();

        let g = self.model.g(estimate);
        let residual = fx.from_int(reading) - self.model.f_from_g(g)?;
        let g_squared = fx.mul(g, g);
        if g_squared.raw() == 0 {
            return Err(ModelError::DegenerateDenominator { g: g.raw() });
        }

        // A and the residual are both at scale S; dividing by g^2 (scale S)
        // leaves the ratio at scale S.
        let ratio = i128::from(params.a.raw()) * i128::from(residual.raw()) / i128::from(g_squared.raw());
        let coef = fx.rescale_wide(i128::from(params.step).saturating_mul(4).saturating_mul(ratio));

        let mut next = *estimate;
        for i in 0..ESTIMATE_DIM {
            let delta = i128::from((estimate[i] - anchor[i]).raw());
            next[i] = estimate[i] - Scaled::saturate(fx.rescale_wide(coef.saturating_mul(delta)));
        }

        Ok(match &self.clamp {
            Some(bounds) => bounds.clamp(&next),
            None => next,
        })
    }
}
