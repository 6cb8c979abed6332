//! Toroidal world grid and the read-only accessor queries over it
//!
//! The grid wraps in both axes: every coordinate is valid after
//! normalization, so all queries here are total. The controller never
//! mutates the grid; the mutable accessors exist for the host-side
//! simulator that maintains it between ticks.

use serde::{Deserialize, Serialize};

use crate::core::types::{Pos, UnitId};

/// What, if anything, stands on a cell this tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Occupant {
    #[default]
    None,
    /// One of our own units
    Own(UnitId),
    /// Any opposing fleet's unit
    Opponent,
}

/// One grid cell as observed this tick
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Cell {
    /// Harvestable resource remaining on the cell
    pub resource: u32,
    pub occupant: Occupant,
    /// True if a storage node (ours or an opponent's) stands here
    pub structure: bool,
}

/// 2D toroidal grid with row-major flat storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldGrid {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
}

impl WorldGrid {
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0 && height > 0, "grid dimensions must be positive");
        Self {
            width,
            height,
            cells: vec![Cell::default(); (width * height) as usize],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Wrap a position into grid bounds
    #[inline]
    pub fn normalize(&self, pos: Pos) -> Pos {
        Pos {
            x: pos.x.rem_euclid(self.width),
            y: pos.y.rem_euclid(self.height),
        }
    }

    #[inline]
    fn index(&self, pos: Pos) -> usize {
        let p = self.normalize(pos);
        (p.y * self.width + p.x) as usize
    }

    #[inline]
    pub fn cell(&self, pos: Pos) -> &Cell {
        &self.cells[self.index(pos)]
    }

    #[inline]
    pub fn cell_mut(&mut self, pos: Pos) -> &mut Cell {
        let idx = self.index(pos);
        &mut self.cells[idx]
    }

    #[inline]
    pub fn resource_at(&self, pos: Pos) -> u32 {
        self.cell(pos).resource
    }

    #[inline]
    pub fn occupant(&self, pos: Pos) -> Occupant {
        self.cell(pos).occupant
    }

    #[inline]
    pub fn has_structure(&self, pos: Pos) -> bool {
        self.cell(pos).structure
    }

    /// Toroidal Manhattan distance between two positions
    pub fn distance(&self, a: Pos, b: Pos) -> i32 {
        let a = self.normalize(a);
        let b = self.normalize(b);
        let dx = (a.x - b.x).abs();
        let dy = (a.y - b.y).abs();
        dx.min(self.width - dx) + dy.min(self.height - dy)
    }

    /// Shortest wrapped delta from `from` to `to`, each component in
    /// `(-dim/2, dim/2]`
    pub fn wrapped_delta(&self, from: Pos, to: Pos) -> (i32, i32) {
        let wrap = |d: i32, dim: i32| {
            let d = d.rem_euclid(dim);
            if d > dim / 2 {
                d - dim
            } else {
                d
            }
        };
        (wrap(to.x - from.x, self.width), wrap(to.y - from.y, self.height))
    }

    /// The four cardinal neighbors, normalized
    pub fn neighbors(&self, pos: Pos) -> [Pos; 4] {
        [
            self.normalize(pos.offset(0, -1)),
            self.normalize(pos.offset(0, 1)),
            self.normalize(pos.offset(1, 0)),
            self.normalize(pos.offset(-1, 0)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_wraps_both_axes() {
        let grid = WorldGrid::new(8, 8);
        assert_eq!(grid.normalize(Pos::new(-1, -1)), Pos::new(7, 7));
        assert_eq!(grid.normalize(Pos::new(8, 9)), Pos::new(0, 1));
        assert_eq!(grid.normalize(Pos::new(3, 4)), Pos::new(3, 4));
    }

    #[test]
    fn test_distance_takes_wrap_shortcut() {
        let grid = WorldGrid::new(10, 10);
        // 0 -> 9 is one step across the seam, not nine
        assert_eq!(grid.distance(Pos::new(0, 0), Pos::new(9, 0)), 1);
        assert_eq!(grid.distance(Pos::new(0, 0), Pos::new(5, 5)), 10);
        assert_eq!(grid.distance(Pos::new(2, 3), Pos::new(2, 3)), 0);
    }

    #[test]
    fn test_wrapped_delta_prefers_short_way() {
        let grid = WorldGrid::new(10, 10);
        assert_eq!(grid.wrapped_delta(Pos::new(0, 0), Pos::new(9, 0)), (-1, 0));
        assert_eq!(grid.wrapped_delta(Pos::new(9, 0), Pos::new(0, 0)), (1, 0));
        assert_eq!(grid.wrapped_delta(Pos::new(0, 0), Pos::new(3, 2)), (3, 2));
    }

    #[test]
    fn test_neighbors_are_normalized() {
        let grid = WorldGrid::new(4, 4);
        let n = grid.neighbors(Pos::new(0, 0));
        assert!(n.contains(&Pos::new(0, 3)));
        assert!(n.contains(&Pos::new(0, 1)));
        assert!(n.contains(&Pos::new(1, 0)));
        assert!(n.contains(&Pos::new(3, 0)));
    }

    #[test]
    fn test_cell_mutation_roundtrip() {
        let mut grid = WorldGrid::new(4, 4);
        grid.cell_mut(Pos::new(2, 2)).resource = 500;
        grid.cell_mut(Pos::new(2, 2)).occupant = Occupant::Opponent;
        assert_eq!(grid.resource_at(Pos::new(2, 2)), 500);
        assert_eq!(grid.occupant(Pos::new(2, 2)), Occupant::Opponent);
        // Same cell through a wrapped coordinate
        assert_eq!(grid.resource_at(Pos::new(-2, -2)), 500);
    }
}
