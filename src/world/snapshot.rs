//! Per-tick observed world state handed to the controller
//!
//! A snapshot is everything the host reveals each tick: the grid, our
//! units and storage nodes, the bank, and the clock. It carries no
//! controller state; anything the controller needs across ticks lives
//! in the controller itself and is re-keyed against these observations.

use serde::{Deserialize, Serialize};

use crate::core::types::{NodeId, Pos, Tick, UnitId};
use crate::world::grid::WorldGrid;

/// Host-fixed game parameters, constant for the whole game
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GameRules {
    /// Banked resource spent to produce one unit
    pub unit_cost: u64,
    /// Banked resource spent to construct a storage node
    pub node_cost: u64,
    /// Cargo capacity of every unit
    pub unit_capacity: u32,
    /// Resource a freshly generated cell may hold, used for threshold scaling
    pub max_cell_resource: u32,
    /// Total players in the game, ourselves included
    pub players: u32,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            unit_cost: 1000,
            node_cost: 4000,
            unit_capacity: 1000,
            max_cell_resource: 1000,
            players: 2,
        }
    }
}

/// One of our units as observed this tick
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub pos: Pos,
    pub cargo: u32,
    pub capacity: u32,
}

impl Unit {
    pub fn is_full(&self) -> bool {
        self.cargo >= self.capacity
    }
}

/// One of our storage nodes. Node 0 is the home base; the rest were
/// built by converted units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StorageNode {
    pub id: NodeId,
    pub pos: Pos,
}

/// Full observed state for one tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: Tick,
    pub max_tick: Tick,
    /// Our banked resource, before this tick's spending
    pub bank: u64,
    pub units: Vec<Unit>,
    pub nodes: Vec<StorageNode>,
    pub rules: GameRules,
    pub grid: WorldGrid,
}

impl Snapshot {
    /// Our nearest storage node to `pos`, by toroidal distance.
    /// The home base always exists, so this is total.
    pub fn nearest_node(&self, pos: Pos) -> StorageNode {
        self.nodes
            .iter()
            .copied()
            .min_by_key(|node| self.grid.distance(pos, node.pos))
            .expect("fleet always has a home base")
    }

    /// Position of the home base
    pub fn home(&self) -> Pos {
        self.nodes
            .iter()
            .find(|n| n.id == NodeId::HOME)
            .map(|n| n.pos)
            .expect("fleet always has a home base")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with_nodes(nodes: Vec<StorageNode>) -> Snapshot {
        Snapshot {
            tick: 0,
            max_tick: 400,
            bank: 5000,
            units: Vec::new(),
            nodes,
            rules: GameRules::default(),
            grid: WorldGrid::new(16, 16),
        }
    }

    #[test]
    fn test_nearest_node_uses_toroidal_distance() {
        let snap = snapshot_with_nodes(vec![
            StorageNode { id: NodeId(0), pos: Pos::new(8, 8) },
            StorageNode { id: NodeId(1), pos: Pos::new(15, 15) },
        ]);
        // (1, 1) is 4 steps from (15, 15) across the seam, 14 from center
        let nearest = snap.nearest_node(Pos::new(1, 1));
        assert_eq!(nearest.id, NodeId(1));
    }

    #[test]
    fn test_home_is_node_zero() {
        let snap = snapshot_with_nodes(vec![
            StorageNode { id: NodeId(1), pos: Pos::new(2, 2) },
            StorageNode { id: NodeId(0), pos: Pos::new(9, 9) },
        ]);
        assert_eq!(snap.home(), Pos::new(9, 9));
    }
}
