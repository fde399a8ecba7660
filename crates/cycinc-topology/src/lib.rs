//! Chain Topology
//!
//! Static layout of the sensor chain: which devices exist, where each one sits
//! on the anchor grid, and who each device forwards to.
//!
//! # Grid
//!
//! Devices sit on a regular grid with a fixed spacing. The lower-left device
//! is at `(row 0, col 0)`. A device's anchor, in the estimate's coordinate
//! system, is `(col * spacing, row * spacing, 0)` scaled by `2^S`.
//!
//! # Chain
//!
//! Identities are consecutive starting at the table's first id. Each device
//! forwards to `id + 1`; the last device closes the ring back to the first.
//!
//! ```text
//! 16 <- 15 <- 14
//!  |           |
//! 17 -> 18    13
//!             |
//! 10 -> 11 -> 12
//! ```

mod grid;
mod node;
mod table;

pub use grid::{GridBounds, GridCoord};
pub use node::NodeId;
pub use table::TopologyTable;

use thiserror::Error;

/// Grid spacing of the canonical deployment, in centimeters.
pub const CANONICAL_SPACING: i64 = 30;

/// Identity of the first device in the canonical chain.
pub const CANONICAL_START_ID: NodeId = NodeId(10);

/// Errors raised by topology lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// The identity is not part of the configured chain.
    #[error("node {0} is not in the chain")]
    UnknownNode(NodeId),

    /// The table has no entries.
    #[error("topology table is empty")]
    Empty,

    /// The chain extends past the largest representable identity.
    #[error("chain of {len} nodes starting at {start} overflows the id space")]
    IdOverflow { start: NodeId, len: usize },

    /// Spacing must be positive.
    #[error("grid spacing must be positive, got {0}")]
    BadSpacing(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_chain_closes_ring() {
        let table = TopologyTable::canonical();
        let last = table.last();
        assert_eq!(table.next_hop(last), Ok(CANONICAL_START_ID));
        assert_eq!(table.next_hop(CANONICAL_START_ID), Ok(NodeId(11)));
    }
}
