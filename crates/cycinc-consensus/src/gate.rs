//! Processing gate: whether an accepted message is handled at all.

/// Rule deciding whether a still-running node handles an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum GatePolicy {
    /// Keep processing until the streak reaches the threshold.
    #[default]
    UntilThreshold,
    /// Process only while the streak is zero.
    ///
    /// Legacy rule. A node goes silent after its first quiet
    /// cycle, so the chain stalls before the threshold can be reached.
    ZeroStreak,
}

impl GatePolicy {
    /// Whether a node with this streak should process the next message.
    pub const fn admits(self, streak: u32, threshold: u32) -> bool {
        match self {
            Self::UntilThreshold => streak < threshold,
            Self::ZeroStreak => streak == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CONVERGENCE_THRESHOLD;

    #[test]
    fn until_threshold_admits_partial_streaks() {
        let gate = GatePolicy::UntilThreshold;
        for streak in 0..CONVERGENCE_THRESHOLD {
            assert!(gate.admits(streak, CONVERGENCE_THRESHOLD));
        }
        assert!(!gate.admits(CONVERGENCE_THRESHOLD, CONVERGENCE_THRESHOLD));
    }

    #[test]
    fn zero_streak_closes_after_one_quiet_cycle() {
        let gate = GatePolicy::ZeroStreak;
        assert!(gate.admits(0, CONVERGENCE_THRESHOLD));
        assert!(!gate.admits(1, CONVERGENCE_THRESHOLD));
    }

    #[test]
    fn default_is_until_threshold() {
        assert_eq!(GatePolicy::default(), GatePolicy::UntilThreshold);
    }
}
