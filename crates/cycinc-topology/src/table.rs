//! Identity to grid lookup, loaded as configuration data.

use cycinc_fixed::{Estimate, FixedPoint};

use crate::{GridBounds, GridCoord, NodeId, TopologyError, CANONICAL_SPACING, CANONICAL_START_ID};

/// The chain layout: consecutive identities starting at `start_id`, one grid
/// cell per identity.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TopologyTable {
    /// Identity of the first device in the chain
    start_id: NodeId,
    /// Distance between adjacent grid cells
    spacing: i64,
    /// Grid cell of device `start_id + i` at index `i`
    cells: Vec<GridCoord>,
}

impl TopologyTable {
    /// Create and validate a table.
    pub fn new(start_id: NodeId, spacing: i64, cells: Vec<GridCoord>) -> Result<Self, TopologyError> {
        let table = Self { start_id, spacing, cells };
        table.validate()?;
        Ok(table)
    }

    /// The nine-device serpentine deployment, ids 10 through 18.
    pub fn canonical() -> Self {
        const ROWS: [i64; 9] = [0, 0, 0, 1, 2, 2, 2, 1, 1];
        const COLS: [i64; 9] = [0, 1, 2, 2, 2, 1, 0, 0, 1];
        let cells = ROWS
            .iter()
            .zip(COLS.iter())
            .map(|(&row, &col)| GridCoord::new(row, col))
            .collect();
        Self {
            start_id: CANONICAL_START_ID,
            spacing: CANONICAL_SPACING,
            cells,
        }
    }

    /// Check structural invariants. Deserialized tables must pass this
    /// before use.
    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.cells.is_empty() {
            return Err(TopologyError::Empty);
        }
        if self.spacing <= 0 {
            return Err(TopologyError::BadSpacing(self.spacing));
        }
        let last = usize::from(self.start_id.0) + self.cells.len() - 1;
        if last > usize::from(u16::MAX) {
            return Err(TopologyError::IdOverflow {
                start: self.start_id,
                len: self.cells.len(),
            });
        }
        Ok(())
    }

    /// Keep only the first `len` devices of the chain.
    pub fn truncated(&self, len: usize) -> Result<Self, TopologyError> {
        let cells: Vec<_> = self.cells.iter().take(len).copied().collect();
        Self::new(self.start_id, self.spacing, cells)
    }

    /// First device of the chain.
    pub fn start(&self) -> NodeId {
        self.start_id
    }

    /// Last device of the chain.
    pub fn last(&self) -> NodeId {
        // validate() guarantees this fits
        NodeId(self.start_id.0 + (self.cells.len() as u16).saturating_sub(1))
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Grid spacing.
    pub fn spacing(&self) -> i64 {
        self.spacing
    }

    /// Position of `id` in the chain.
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        let offset = usize::from(id.0.checked_sub(self.start_id.0)?);
        (offset < self.cells.len()).then_some(offset)
    }

    /// Whether `id` belongs to the chain.
    pub fn contains(&self, id: NodeId) -> bool {
        self.index_of(id).is_some()
    }

    /// Grid cell of a device.
    pub fn coord(&self, id: NodeId) -> Result<GridCoord, TopologyError> {
        self.index_of(id)
            .map(|i| self.cells[i])
            .ok_or(TopologyError::UnknownNode(id))
    }

    /// Scaled anchor position of a device.
    pub fn anchor(&self, id: NodeId, fx: &FixedPoint) -> Result<Estimate, TopologyError> {
        Ok(self.coord(id)?.anchor(self.spacing, fx))
    }

    /// Downstream neighbor: `id + 1`, wrapping from the last device to the first.
    pub fn next_hop(&self, id: NodeId) -> Result<NodeId, TopologyError> {
        let i = self.index_of(id).ok_or(TopologyError::UnknownNode(id))?;
        if i + 1 == self.cells.len() {
            Ok(self.start_id)
        } else {
            Ok(NodeId(id.0 + 1))
        }
    }

    /// Every device in chain order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.cells.len()).map(move |i| NodeId(self.start_id.0 + i as u16))
    }

    /// Row/column extent of the deployment.
    pub fn bounds(&self) -> Option<GridBounds> {
        GridBounds::covering(&self.cells)
    }
}

impl Default for TopologyTable {
    fn default() -> Self {
        Self::canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn canonical_layout() {
        let table = TopologyTable::canonical();
        assert!(table.validate().is_ok());
        assert_eq!(table.len(), 9);
        assert_eq!(table.start(), NodeId(10));
        assert_eq!(table.last(), NodeId(18));
        assert_eq!(table.coord(NodeId(13)), Ok(GridCoord::new(1, 2)));
        assert_eq!(table.coord(NodeId(18)), Ok(GridCoord::new(1, 1)));
    }

    #[test]
    fn anchor_lookup_scaled() {
        let fx = FixedPoint::new(9).unwrap();
        let table = TopologyTable::canonical();

        // node 15: row 2, col 1
        let anchor = table.anchor(NodeId(15), &fx).unwrap();
        assert_eq!(anchor.raw(), [(30 << 9), (60 << 9), 0]);
    }

    #[test]
    fn unknown_nodes_rejected() {
        let table = TopologyTable::canonical();
        assert_eq!(table.coord(NodeId(9)), Err(TopologyError::UnknownNode(NodeId(9))));
        assert_eq!(table.coord(NodeId(19)), Err(TopologyError::UnknownNode(NodeId(19))));
        assert_eq!(table.next_hop(NodeId(25)), Err(TopologyError::UnknownNode(NodeId(25))));
        assert!(!table.contains(NodeId(0)));
    }

    #[test]
    fn hops_walk_the_whole_ring() {
        let table = TopologyTable::canonical();
        let mut id = table.start();
        let mut seen = Vec::new();
        for _ in 0..table.len() {
            seen.push(id);
            id = table.next_hop(id).unwrap();
        }
        assert_eq!(id, table.start());
        assert_eq!(seen, table.ids().collect::<Vec<_>>());
    }

    #[test]
    fn truncated_chain_wraps_early() {
        let table = TopologyTable::canonical().truncated(3).unwrap();
        assert_eq!(table.last(), NodeId(12));
        assert_eq!(table.next_hop(NodeId(12)), Ok(NodeId(10)));
    }

    #[test]
    fn invalid_tables() {
        assert_eq!(
            TopologyTable::new(NodeId(1), 30, vec![]),
            Err(TopologyError::Empty)
        );
        assert_eq!(
            TopologyTable::new(NodeId(1), 0, vec![GridCoord::new(0, 0)]),
            Err(TopologyError::BadSpacing(0))
        );
        assert!(matches!(
            TopologyTable::new(NodeId(u16::MAX), 30, vec![GridCoord::default(); 2]),
            Err(TopologyError::IdOverflow { .. })
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn loads_from_json() {
        let json = r#"{"start_id": 3, "spacing": 10, "cells": [{"row": 0, "col": 0}, {"row": 0, "col": 1}]}"#;
        let table: TopologyTable = serde_json::from_str(json).unwrap();
        assert!(table.validate().is_ok());
        assert_eq!(table.coord(NodeId(4)), Ok(GridCoord::new(0, 1)));
    }

    proptest! {
        #[test]
        fn anchor_matches_table(index in 0usize..9, shift in 0u32..=16) {
            let fx = FixedPoint::new(shift).unwrap();
            let table = TopologyTable::canonical();
            let id = NodeId(10 + index as u16);
            let cell = table.coord(id).unwrap();
            let anchor = table.anchor(id, &fx).unwrap();
            prop_assert_eq!(anchor[0].raw(), (cell.col * 30) << shift);
            prop_assert_eq!(anchor[1].raw(), (cell.row * 30) << shift);
            prop_assert_eq!(anchor[2].raw(), 0);
        }
    }
}
