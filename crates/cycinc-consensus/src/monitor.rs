//! Per-node streak tracking over inbound estimates.

use cycinc_fixed::Estimate;

use crate::threshold::{meets_threshold, CONVERGENCE_THRESHOLD, DEFAULT_EPSILON};

/// Parameters of the streak rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConvergenceCriteria {
    /// Movement tolerance in raw scaled units
    pub epsilon: i64,
    /// Quiet cycles in a row needed to converge
    pub threshold: u32,
    /// Completed cycles before a quiet cycle may count
    pub warmup_cycles: u64,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            threshold: CONVERGENCE_THRESHOLD,
            warmup_cycles: 1,
        }
    }
}

impl ConvergenceCriteria {
    /// `epsilon^2`, the bound on the un-rescaled squared delta.
    pub fn epsilon_squared(&self) -> i128 {
        let e = i128::from(self.epsilon);
        e * e
    }
}

/// What the node remembers between its turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConvergenceState {
    /// Inbound estimate from the previous processed cycle
    pub previous: Estimate,
    /// Consecutive near-convergent cycles
    pub streak: u32,
}

/// Result of one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Squared movement since the previous turn, at scale `2S`
    pub delta_squared: i128,
    /// Whether this cycle counted toward the streak
    pub quiet: bool,
    /// Streak after this cycle
    pub streak: u32,
}

/// Tracks how far the shared estimate moves between this node's turns.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceMonitor {
    criteria: ConvergenceCriteria,
    state: ConvergenceState,
}

impl ConvergenceMonitor {
    /// Create a monitor with an empty history.
    pub fn new(criteria: ConvergenceCriteria) -> Self {
        Self {
            criteria,
            state: ConvergenceState::default(),
        }
    }

    /// Record an accepted inbound estimate.
    ///
    /// `completed_cycles` is the number of cycles this node had finished
    /// before this one. The estimate always becomes the new reference.
    pub fn observe(&mut self, estimate: &Estimate, completed_cycles: u64) -> Observation {
        let delta_squared = estimate.squared_distance(&self.state.previous);
        let warmed_up = completed_cycles >= self.criteria.warmup_cycles;
        let quiet = warmed_up && delta_squared <= self.criteria.epsilon_squared();

        if quiet {
            self.state.streak = self.state.streak.saturating_add(1);
        } else {
            self.state.streak = 0;
        }
        self.state.previous = *estimate;

        Observation {
            delta_squared,
            quiet,
            streak: self.state.streak,
        }
    }

    /// Whether the streak has reached the threshold.
    pub fn has_converged(&self) -> bool {
        meets_threshold(self.state.streak, self.criteria.threshold)
    }

    /// Current streak.
    pub fn streak(&self) -> u32 {
        self.state.streak
    }

    /// Criteria in force.
    pub fn criteria(&self) -> &ConvergenceCriteria {
        &self.criteria
    }

    /// Snapshot of the remembered state.
    pub fn state(&self) -> &ConvergenceState {
        &self.state
    }
}
