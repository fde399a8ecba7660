//! Streak threshold for declaring convergence.

/// Consecutive near-convergent cycles required before a node converges.
pub const CONVERGENCE_THRESHOLD: u32 = 10;

/// Default per-cycle movement tolerance, in raw scaled units.
///
/// Compared as `delta^2 <= epsilon^2` against an un-rescaled squared norm,
/// so `1` means "moved by at most one unit in the last place".
pub const DEFAULT_EPSILON: i64 = 1;

/// Check if a streak has reached the threshold.
///
/// # Examples
///
/// ```
/// use cycinc_consensus::meets_threshold;
///
/// assert!(!meets_threshold(9, 10));
/// assert!(meets_threshold(10, 10));
/// ```
pub const fn meets_threshold(streak: u32, threshold: u32) -> bool {
    streak >= threshold
}

/// How many more quiet cycles are needed before convergence.
pub const fn cycles_remaining(streak: u32, threshold: u32) -> u32 {
    threshold.saturating_sub(streak)
}
