//! Grid coordinates of anchors.

use cycinc_fixed::{Estimate, FixedPoint, Scaled};

/// A cell on the deployment grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridCoord {
    /// Row, counted up from the bottom edge
    pub row: i64,
    /// Column, counted right from the left edge
    pub col: i64,
}

impl GridCoord {
    /// Create a new coordinate.
    pub const fn new(row: i64, col: i64) -> Self {
        Self { row, col }
    }

    /// Physical position as an estimate: `(col, row, 0) * spacing * 2^S`.
    ///
    /// Height is fixed at zero: anchors lie on the floor plane.
    pub fn anchor(&self, spacing: i64, fx: &FixedPoint) -> Estimate {
        Estimate([
            fx.from_int(self.col * spacing),
            fx.from_int(self.row * spacing),
            Scaled::ZERO,
        ])
    }
}

impl std::fmt::Display for GridCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(r{}, c{})", self.row, self.col)
    }
}

/// Inclusive row and column extent of a set of grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridBounds {
    pub min_row: i64,
    pub max_row: i64,
    pub min_col: i64,
    pub max_col: i64,
}

impl GridBounds {
    /// Smallest bounds covering every coordinate, or `None` if empty.
    pub fn covering<'a>(coords: impl IntoIterator<Item = &'a GridCoord>) -> Option<Self> {
        let mut iter = coords.into_iter();
        let first = iter.next()?;
        let init = Self {
            min_row: first.row,
            max_row: first.row,
            min_col: first.col,
            max_col: first.col,
        };
        Some(iter.fold(init, |b, c| Self {
            min_row: b.min_row.min(c.row),
            max_row: b.max_row.max(c.row),
            min_col: b.min_col.min(c.col),
            max_col: b.max_col.max(c.col),
        }))
    }
}
