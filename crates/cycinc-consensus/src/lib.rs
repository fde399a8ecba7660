//! Convergence Detection
//!
//! A chain never agrees on "done" through a vote. Each node watches the
//! shared estimate as it comes back around and decides locally that the
//! iterate has stopped moving.
//!
//! # Streak Rule
//!
//! A cycle is *near-convergent* when the squared distance between the inbound
//! estimate and the one the node saw on its previous turn is at most
//! `epsilon^2`. A node declares convergence after
//! [`CONVERGENCE_THRESHOLD`] near-convergent cycles in a row; any larger step
//! resets the streak.
//!
//! The first processed cycle never counts: there is nothing to compare
//! against yet.
//!
//! # Processing Gate
//!
//! Whether a node keeps handling traffic while a streak is building is a
//! [`GatePolicy`]. The intended rule keeps processing until the threshold;
//! the legacy rule stops as soon as any streak starts.

mod gate;
mod monitor;
mod threshold;

pub use gate::GatePolicy;
pub use monitor::{ConvergenceCriteria, ConvergenceMonitor, ConvergenceState, Observation};
pub use threshold::{cycles_remaining, meets_threshold, CONVERGENCE_THRESHOLD, DEFAULT_EPSILON};

#[cfg(test)]
mod tests {
    use super::*;
    use cycinc_fixed::Estimate;

    #[test]
    fn settles_after_threshold_quiet_cycles() {
        let mut monitor = ConvergenceMonitor::new(ConvergenceCriteria::default());
        let still = Estimate::from_raw([100, 100, 100]);

        // First cycle only primes the previous estimate
        monitor.observe(&still, 0);
        for cycle in 1..CONVERGENCE_THRESHOLD as u64 {
            monitor.observe(&still, cycle);
            assert!(!monitor.has_converged());
        }
        monitor.observe(&still, CONVERGENCE_THRESHOLD as u64);
        assert!(monitor.has_converged());
    }
}
