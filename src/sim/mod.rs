//! Minimal local world simulator
//!
//! Applies a command batch to a world the way the host engine would:
//! moves, harvesting, deposits, construction, production. Used by the
//! skirmish harness and the integration tests to drive the controller
//! through whole games without a real host. Opposing fleets are not
//! simulated; fixed opponent markers can be placed for contested-cell
//! scenarios.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::core::types::{Command, NodeId, Pos, Tick, UnitId};
use crate::world::grid::{Occupant, WorldGrid};
use crate::world::snapshot::{GameRules, Snapshot, StorageNode, Unit};

/// Fraction of a cell harvested per stay: resource / 4, rounded up
const EXTRACT_DENOMINATOR: u32 = 4;

#[derive(Debug, Clone)]
struct SimUnit {
    id: UnitId,
    pos: Pos,
    cargo: u32,
}

/// A driveable world. Owns the authoritative grid; snapshots are
/// decorated copies with occupancy and structures stamped in.
#[derive(Debug)]
pub struct Simulation {
    grid: WorldGrid,
    units: Vec<SimUnit>,
    nodes: Vec<StorageNode>,
    opponents: Vec<Pos>,
    bank: u64,
    tick: Tick,
    max_tick: Tick,
    rules: GameRules,
    next_unit_id: u32,
    next_node_id: u32,
}

impl Simulation {
    /// Empty world with a home base and a starting bank
    pub fn new(grid: WorldGrid, home: Pos, rules: GameRules, max_tick: Tick, bank: u64) -> Self {
        let home = grid.normalize(home);
        Self {
            grid,
            units: Vec::new(),
            nodes: vec![StorageNode { id: NodeId::HOME, pos: home }],
            opponents: Vec::new(),
            bank,
            tick: 0,
            max_tick,
            rules,
            next_unit_id: 0,
            next_node_id: 1,
        }
    }

    /// Random map with resource clumps, home at the center
    pub fn generate(width: i32, height: i32, seed: u64, rules: GameRules, max_tick: Tick) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut grid = WorldGrid::new(width, height);
        for y in 0..height {
            for x in 0..width {
                // Squared draw skews toward sparse cells with rich outliers
                let draw: f64 = rng.gen::<f64>();
                let amount = (draw * draw * f64::from(rules.max_cell_resource)) as u32;
                grid.cell_mut(Pos::new(x, y)).resource = amount;
            }
        }
        let home = Pos::new(width / 2, height / 2);
        grid.cell_mut(home).resource = 0;
        Self::new(grid, home, rules, max_tick, 5000)
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn bank(&self) -> u64 {
        self.bank
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_over(&self) -> bool {
        self.tick >= self.max_tick
    }

    pub fn grid_mut(&mut self) -> &mut WorldGrid {
        &mut self.grid
    }

    /// Place one of our units directly (test setup)
    pub fn add_unit(&mut self, pos: Pos, cargo: u32) -> UnitId {
        let id = UnitId(self.next_unit_id);
        self.next_unit_id += 1;
        let pos = self.grid.normalize(pos);
        self.units.push(SimUnit { id, pos, cargo });
        id
    }

    /// Place a static opposing unit (test setup)
    pub fn add_opponent(&mut self, pos: Pos) {
        self.opponents.push(self.grid.normalize(pos));
    }

    /// Add a storage node directly (test setup)
    pub fn add_node(&mut self, pos: Pos) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        self.nodes.push(StorageNode { id, pos: self.grid.normalize(pos) });
        id
    }

    /// Observed state for this tick
    pub fn snapshot(&self) -> Snapshot {
        let mut grid = self.grid.clone();
        for node in &self.nodes {
            grid.cell_mut(node.pos).structure = true;
        }
        for pos in &self.opponents {
            grid.cell_mut(*pos).occupant = Occupant::Opponent;
        }
        for unit in &self.units {
            grid.cell_mut(unit.pos).occupant = Occupant::Own(unit.id);
        }
        Snapshot {
            tick: self.tick,
            max_tick: self.max_tick,
            bank: self.bank,
            units: self
                .units
                .iter()
                .map(|u| Unit {
                    id: u.id,
                    pos: u.pos,
                    cargo: u.cargo,
                    capacity: self.rules.unit_capacity,
                })
                .collect(),
            nodes: self.nodes.clone(),
            rules: self.rules,
            grid,
        }
    }

    /// Advance one tick under the given command batch
    pub fn apply(&mut self, commands: &[Command]) {
        for command in commands {
            match *command {
                Command::Stay { unit } => {
                    if let Some(u) = self.units.iter_mut().find(|u| u.id == unit) {
                        let cell = self.grid.cell_mut(u.pos);
                        if cell.resource > 0 {
                            let pull = cell.resource.div_ceil(EXTRACT_DENOMINATOR);
                            let gain = pull.min(self.rules.unit_capacity - u.cargo);
                            cell.resource -= gain;
                            u.cargo += gain;
                        }
                    }
                }
                Command::Move { unit, dir } => {
                    if let Some(u) = self.units.iter_mut().find(|u| u.id == unit) {
                        let (dx, dy) = dir.delta();
                        u.pos = self.grid.normalize(u.pos.offset(dx, dy));
                    }
                }
                Command::Construct { unit } => {
                    if let Some(idx) = self.units.iter().position(|u| u.id == unit) {
                        let u = self.units.remove(idx);
                        // Cargo is credited back against the build cost
                        self.bank = self
                            .bank
                            .saturating_add(u64::from(u.cargo))
                            .saturating_sub(self.rules.node_cost);
                        let id = NodeId(self.next_node_id);
                        self.next_node_id += 1;
                        debug!(?id, pos = ?u.pos, "node constructed");
                        self.nodes.push(StorageNode { id, pos: u.pos });
                    }
                }
                Command::Spawn => {
                    if self.bank >= self.rules.unit_cost {
                        self.bank -= self.rules.unit_cost;
                        let home = self.nodes[0].pos;
                        let id = UnitId(self.next_unit_id);
                        self.next_unit_id += 1;
                        self.units.push(SimUnit { id, pos: home, cargo: 0 });
                    }
                }
            }
        }

        // Deliveries happen after movement
        for u in &mut self.units {
            if self.nodes.iter().any(|n| n.pos == u.pos) && u.cargo > 0 {
                self.bank += u64::from(u.cargo);
                u.cargo = 0;
            }
        }

        self.tick += 1;
    }
}
