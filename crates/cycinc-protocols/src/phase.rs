//! RUNNING / CONVERGED state machine.
//!
//! ```text
//!            streak >= threshold
//!            | inbound CONVERGED
//!            | iteration >= MAX_ITER
//!  RUNNING ───────────────────────────▶ CONVERGED (terminal)
//!     ▲  │
//!     └──┘ gradient step, relay RUNNING
//! ```

use cycinc_consensus::{ConvergenceMonitor, GatePolicy};

use crate::message::{Iteration, Message, Phase};

/// Why a node left RUNNING.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergeReason {
    /// This node's streak reached the threshold.
    Streak,
    /// The upstream node had already converged.
    Upstream,
    /// The iteration cap was hit.
    IterationCap,
}

impl std::fmt::Display for ConvergeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Streak => write!(f, "streak"),
            Self::Upstream => write!(f, "upstream"),
            Self::IterationCap => write!(f, "iteration cap"),
        }
    }
}

/// What to do with an admitted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Take a gradient step and relay RUNNING.
    Step,
    /// Relay CONVERGED and stop stepping.
    Converge(ConvergeReason),
}

/// Decides transitions for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseController {
    gate: GatePolicy,
    max_iter: Iteration,
}

impl PhaseController {
    /// Create a controller.
    pub const fn new(gate: GatePolicy, max_iter: Iteration) -> Self {
        Self { gate, max_iter }
    }

    /// Iteration cap.
    pub const fn max_iter(&self) -> Iteration {
        self.max_iter
    }

    /// Gate policy.
    pub const fn gate(&self) -> GatePolicy {
        self.gate
    }

    /// Whether a node in `phase` with this monitor handles the next message.
    ///
    /// A converged node absorbs everything, which stops the terminal
    /// message after one trip around the ring.
    pub fn admits(&self, phase: Phase, monitor: &ConvergenceMonitor) -> bool {
        phase == Phase::Running && self.gate.admits(monitor.streak(), monitor.criteria().threshold)
    }

    /// Decide the transition for an inbound message, after the monitor has
    /// observed it.
    pub fn decide(&self, monitor: &ConvergenceMonitor, inbound: &Message) -> Decision {
        if monitor.has_converged() {
            Decision::Converge(ConvergeReason::Streak)
        } else if inbound.phase.is_converged() {
            Decision::Converge(ConvergeReason::Upstream)
        } else if inbound.iteration >= self.max_iter {
            Decision::Converge(ConvergeReason::IterationCap)
        } else {
            Decision::Step
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cycinc_consensus::ConvergenceCriteria;
    use cycinc_fixed::Estimate;

    fn controller() -> PhaseController {
        PhaseController::new(GatePolicy::UntilThreshold, 500)
    }

    #[test]
    fn steps_while_nothing_fires() {
        let monitor = ConvergenceMonitor::new(ConvergenceCriteria::default());
        let msg = Message::running(3, Estimate::ZERO);
        assert_eq!(controller().decide(&monitor, &msg), Decision::Step);
    }

    #[test]
    fn upstream_convergence_propagates() {
        let monitor = ConvergenceMonitor::new(ConvergenceCriteria::default());
        let msg = Message::converged(3, Estimate::ZERO);
        assert_eq!(
            controller().decide(&monitor, &msg),
            Decision::Converge(ConvergeReason::Upstream)
        );
    }

    #[test]
    fn iteration_cap_boundary() {
        let monitor = ConvergenceMonitor::new(ConvergenceCriteria::default());
        let c = controller();
        assert_eq!(c.decide(&monitor, &Message::running(499, Estimate::ZERO)), Decision::Step);
        assert_eq!(
            c.decide(&monitor, &Message::running(500, Estimate::ZERO)),
            Decision::Converge(ConvergeReason::IterationCap)
        );
    }

    #[test]
    fn streak_takes_precedence() {
        let criteria = ConvergenceCriteria {
            threshold: 1,
            ..Default::default()
        };
        let mut monitor = ConvergenceMonitor::new(criteria);
        monitor.observe(&Estimate::ZERO, 0);
        monitor.observe(&Estimate::ZERO, 1);
        let msg = Message::converged(600, Estimate::ZERO);
        assert_eq!(
            controller().decide(&monitor, &msg),
            Decision::Converge(ConvergeReason::Streak)
        );
    }

    #[test]
    fn converged_phase_admits_nothing() {
        let monitor = ConvergenceMonitor::new(ConvergenceCriteria::default());
        assert!(controller().admits(Phase::Running, &monitor));
        assert!(!controller().admits(Phase::Converged, &monitor));
    }

    #[test]
    fn zero_streak_gate_closes_early() {
        let mut monitor = ConvergenceMonitor::new(ConvergenceCriteria::default());
        let c = PhaseController::new(GatePolicy::ZeroStreak, 500);
        monitor.observe(&Estimate::ZERO, 0);
        assert!(c.admits(Phase::Running, &monitor));
        monitor.observe(&Estimate::ZERO, 1);
        assert!(!c.admits(Phase::Running, &monitor));
    }
}
