//! Per-tick exclusive cell claims
//!
//! Every committed command claims its destination cell here, so a cell
//! can be the destination of at most one own unit per tick. The table
//! is cleared at every tick start; first claim wins, which makes unit
//! processing order an intentional movement priority.

use ahash::AHashMap;

use crate::core::types::{Pos, UnitId};
use crate::world::grid::WorldGrid;

#[derive(Debug, Default)]
pub struct ReservationTable {
    claims: AHashMap<Pos, UnitId>,
}

impl ReservationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all claims; called once at tick start
    pub fn clear(&mut self) {
        self.claims.clear();
    }

    /// Claim a cell for a unit. Returns false (and leaves the existing
    /// claim intact) if another unit got there first.
    pub fn claim(&mut self, grid: &WorldGrid, pos: Pos, unit: UnitId) -> bool {
        let pos = grid.normalize(pos);
        match self.claims.get(&pos) {
            Some(&holder) => holder == unit,
            None => {
                self.claims.insert(pos, unit);
                true
            }
        }
    }

    pub fn is_claimed(&self, grid: &WorldGrid, pos: Pos) -> bool {
        self.claims.contains_key(&grid.normalize(pos))
    }

    pub fn claimant(&self, grid: &WorldGrid, pos: Pos) -> Option<UnitId> {
        self.claims.get(&grid.normalize(pos)).copied()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}
