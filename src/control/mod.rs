//! The per-tick fleet controller
//!
//! `FleetController` owns every piece of cross-tick state (unit
//! records, planned expansions, dispersal cursors, spawn history) and
//! turns one `Snapshot` into one command batch. The tick runs as fixed
//! passes in a fixed unit order:
//!
//! pre-pass (registration, stall detection, end-game check) ->
//! decision pass (state transitions and goal assignment) ->
//! rendezvous pass (storage-node swaps and contested captures) ->
//! sweep pass (route everything still uncommitted) ->
//! production.
//!
//! The reservation table and the per-node rendezvous slots are the only
//! cross-unit shared state inside a tick; both reset at tick start, so
//! earlier units simply have movement priority over later ones.

pub mod expansion;
pub mod navigation;
pub mod production;
pub mod reservation;
pub mod sites;
pub mod unit;

use ahash::{AHashMap, AHashSet};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::control::expansion::{ExpansionContext, ExpansionPlanner};
use crate::control::production::ProductionController;
use crate::control::reservation::ReservationTable;
use crate::control::unit::{UnitRecord, UnitState};
use crate::core::config::FleetConfig;
use crate::core::error::Result;
use crate::core::types::{Command, NodeId, Pos, UnitId};
use crate::world::grid::{Occupant, WorldGrid};
use crate::world::snapshot::{Snapshot, StorageNode, Unit};

/// Radial post-return dispersal sequence for one storage node
///
/// Cycles eight compass directions; each full cycle pushes one ring
/// further out, wrapping back to the first ring at `max_multiplier`.
/// Spreads returning units outward instead of letting them re-crowd
/// the nearest rich cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispersalCursor {
    index: usize,
    multiplier: i32,
}

impl DispersalCursor {
    const OFFSETS: [(i32, i32); 8] =
        [(0, -1), (1, -1), (1, 0), (1, 1), (0, 1), (-1, 1), (-1, 0), (-1, -1)];

    /// Next radial offset, in cells
    pub fn next_offset(&mut self, step: i32, max_multiplier: i32) -> (i32, i32) {
        let ring = (self.multiplier % max_multiplier.max(1)) + 1;
        let (dx, dy) = Self::OFFSETS[self.index];
        self.index += 1;
        if self.index == Self::OFFSETS.len() {
            self.index = 0;
            self.multiplier += 1;
        }
        (dx * ring * step, dy * ring * step)
    }
}

/// Tick-scoped rendezvous slots for one storage node
#[derive(Debug, Default, Clone, Copy)]
struct NodeSlots {
    /// Unit standing on the node cell this tick
    here: Option<UnitId>,
    /// Unit one step from the node cell this tick
    near: Option<UnitId>,
}

/// Owns all fleet state that survives across ticks and produces one
/// command batch per snapshot
#[derive(Debug)]
pub struct FleetController {
    config: FleetConfig,
    rng: ChaCha8Rng,
    units: AHashMap<UnitId, UnitRecord>,
    reservations: ReservationTable,
    expansion: ExpansionPlanner,
    production: ProductionController,
    dispersal: AHashMap<NodeId, DispersalCursor>,
}

impl FleetController {
    /// Build a controller from the first snapshot of the game. The
    /// grid is only used to sample the expansion density baseline.
    pub fn new(config: FleetConfig, seed: u64, first: &Snapshot) -> Result<Self> {
        config.validate()?;
        let expansion = ExpansionPlanner::new(&first.grid, &config);
        Ok(Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            units: AHashMap::new(),
            reservations: ReservationTable::new(),
            expansion,
            production: ProductionController::new(),
            dispersal: AHashMap::new(),
        })
    }

    /// Tracked state of a unit, for inspection
    pub fn state_of(&self, unit: UnitId) -> Option<UnitState> {
        self.units.get(&unit).map(|rec| rec.state)
    }

    /// Tracked goal of a unit, for inspection
    pub fn goal_of(&self, unit: UnitId) -> Option<Pos> {
        self.units.get(&unit).and_then(|rec| rec.goal)
    }

    /// Run one full decision tick. Returns exactly one command per
    /// owned unit plus at most one `Spawn`, with pairwise-distinct
    /// destinations.
    pub fn plan_tick(&mut self, snap: &Snapshot) -> Vec<Command> {
        let Self { config, rng, units, reservations, expansion, production, dispersal } = self;
        let grid = &snap.grid;
        let rules = &snap.rules;

        reservations.clear();

        // Fixed enumeration order: ascending unit id
        let mut observed: Vec<Unit> = snap.units.clone();
        observed.sort_by_key(|u| u.id);
        let by_id: AHashMap<UnitId, Unit> = observed.iter().map(|u| (u.id, *u)).collect();

        // Vanished identities lose all tracked state, silently
        let live: AHashSet<UnitId> = observed.iter().map(|u| u.id).collect();
        units.retain(|id, _| live.contains(id));
        expansion.retain_live(&live);

        let mut commands: Vec<Command> = Vec::with_capacity(observed.len() + 1);
        let mut slots: AHashMap<NodeId, NodeSlots> = AHashMap::new();
        let mut spent_on_construction: u64 = 0;

        // === PRE-PASS ===
        let remaining = snap.max_tick.saturating_sub(snap.tick);
        let mut returning = 0usize;
        for u in &observed {
            let rec = units.entry(u.id).or_insert_with(|| UnitRecord::new(u.pos, snap.tick));
            rec.turn_taken = false;

            // Stall detection: a unit that did not move without meaning
            // to pause has its goal broken to escape the deadlock
            let stallable =
                rec.state == UnitState::Foraging || rec.state == UnitState::Returning;
            if rec.born != snap.tick && stallable && u.pos == rec.last_pos && !rec.paused {
                if rec.state == UnitState::Returning {
                    let fresh = sites::richest_cell(grid, u.pos, config.forage_search_range);
                    warn!(unit = ?u.id, ?fresh, "returning unit stalled, retargeting");
                    rec.goal = Some(fresh);
                } else if rec.goal.is_some() {
                    warn!(unit = ?u.id, "unit stalled, clearing goal");
                    rec.goal = None;
                }
            }

            // End-game horizon: one-way transition into Homing
            if rec.state != UnitState::Homing && remaining < config.endgame_lookahead {
                let node = snap.nearest_node(u.pos);
                let dist = grid.distance(u.pos, node.pos);
                if f64::from(dist) * config.endgame_safety_factor > f64::from(remaining) {
                    info!(unit = ?u.id, node = ?node.id, dist, remaining, "homing");
                    // A plan dies with the transition, releasing its
                    // node-cost reservation
                    if rec.state == UnitState::Converting {
                        expansion.abandon(u.id);
                    }
                    rec.state = UnitState::Homing;
                    rec.goal = Some(node.pos);
                    rec.storage_id = node.id;
                }
            }

            rec.last_pos = u.pos;
            if rec.state == UnitState::Returning {
                returning += 1;
            }
        }

        // Fleet stats feeding the expansion test
        let fleet_size = observed.len();
        let returner_cap = (fleet_size / config.returner_divisor).max(1);
        let mean_forage_distance = {
            let foragers: Vec<i32> = observed
                .iter()
                .filter(|u| units.get(&u.id).map(|r| r.state) == Some(UnitState::Foraging))
                .map(|u| grid.distance(u.pos, snap.nearest_node(u.pos).pos))
                .collect();
            if foragers.is_empty() {
                0.0
            } else {
                f64::from(foragers.iter().sum::<i32>()) / foragers.len() as f64
            }
        };
        let built_nodes: Vec<Pos> = snap.nodes.iter().map(|n| n.pos).collect();
        let max_nodes = config.max_storage_nodes(grid.width(), rules.players);

        // === DECISION PASS ===
        let floor = config.extraction_floor(snap.tick, snap.max_tick, rules.max_cell_resource);
        for u in &observed {
            let Some(rec) = units.get_mut(&u.id) else { continue };
            match rec.state {
                UnitState::Homing => {
                    let goal = rec.goal.unwrap_or_else(|| snap.nearest_node(u.pos).pos);
                    commands.push(navigation::plan_direct(grid, reservations, u.id, u.pos, goal));
                    rec.turn_taken = true;
                }

                UnitState::Returning => {
                    let goal = match rec.goal {
                        Some(g) => g,
                        None => {
                            let node = snap.nearest_node(u.pos);
                            rec.storage_id = node.id;
                            rec.goal = Some(node.pos);
                            node.pos
                        }
                    };
                    let dist = grid.distance(u.pos, goal);
                    let node_here = node_at(&snap.nodes, grid, goal);

                    if dist == 0 {
                        // Arrived. At a node: register for the swap
                        // protocol and head back out on the dispersal
                        // ring. A stall-retarget goal is not a node;
                        // just resume foraging there.
                        rec.state = UnitState::Foraging;
                        rec.paused = false;
                        if let Some(node) = node_here {
                            let slot = slots.entry(node.id).or_default();
                            if slot.here.is_none() {
                                slot.here = Some(u.id);
                            }
                            rec.storage_id = node.id;
                            rec.goal = Some(next_dispersal(dispersal, grid, config, node));
                        } else {
                            rec.goal = None;
                        }
                    } else if dist == 1 && node_here.is_some() {
                        let node = node_here.expect("checked above");
                        let slot = slots.entry(node.id).or_default();
                        if slot.near.is_none() {
                            slot.near = Some(u.id);
                            // Uncommitted: the rendezvous pass or the
                            // sweep will move this unit
                        } else {
                            // Another unit already waits its turn here
                            rec.paused = true;
                            reservations.claim(grid, u.pos, u.id);
                            commands.push(Command::Stay { unit: u.id });
                            rec.turn_taken = true;
                        }
                    } else {
                        // Self-throttle: alternate move and pause while
                        // far from the node, unless this cell is too
                        // poor to be worth sitting on
                        let depleted = grid.resource_at(u.pos) < floor;
                        if rec.paused || depleted {
                            rec.paused = depleted;
                            // Goal stands; the sweep routes the move
                        } else {
                            rec.paused = true;
                            reservations.claim(grid, u.pos, u.id);
                            commands.push(Command::Stay { unit: u.id });
                            rec.turn_taken = true;
                        }
                    }
                }

                UnitState::Converting => {
                    match expansion.planned_site(u.id) {
                        None => {
                            // Plan evaporated underneath us
                            let node = snap.nearest_node(u.pos);
                            rec.state = UnitState::Returning;
                            rec.paused = true;
                            rec.goal = Some(node.pos);
                            rec.storage_id = node.id;
                        }
                        Some(site) if grid.normalize(u.pos) == grid.normalize(site) => {
                            if grid.has_structure(site) {
                                // Raced: someone built here first
                                expansion.abandon(u.id);
                                let node = snap.nearest_node(u.pos);
                                rec.state = UnitState::Returning;
                                rec.paused = true;
                                rec.goal = Some(node.pos);
                                rec.storage_id = node.id;
                            } else {
                                let reserved =
                                    expansion.reserved_cost_excluding(rules, u.id);
                                let available = snap
                                    .bank
                                    .saturating_sub(reserved)
                                    .saturating_sub(spent_on_construction);
                                if available >= rules.node_cost {
                                    info!(unit = ?u.id, ?site, "constructing storage node");
                                    expansion.complete(u.id);
                                    spent_on_construction += rules.node_cost;
                                    reservations.claim(grid, u.pos, u.id);
                                    commands.push(Command::Construct { unit: u.id });
                                    rec.turn_taken = true;
                                } else {
                                    // Bank not there yet; hold the site
                                    reservations.claim(grid, u.pos, u.id);
                                    commands.push(Command::Stay { unit: u.id });
                                    rec.turn_taken = true;
                                }
                            }
                        }
                        Some(site) => {
                            rec.goal = Some(site);
                        }
                    }
                }

                UnitState::Foraging => {
                    let threshold =
                        (config.return_fraction(snap.tick, snap.max_tick)
                            * f64::from(u.capacity)) as u32;
                    let laden = u.cargo >= threshold;

                    if (laden && returning < returner_cap) || u.is_full() {
                        let node = snap.nearest_node(u.pos);
                        debug!(unit = ?u.id, cargo = u.cargo, node = ?node.id, "returning");
                        rec.state = UnitState::Returning;
                        rec.paused = true;
                        rec.goal = Some(node.pos);
                        rec.storage_id = node.id;
                        returning += 1;
                    } else if laden {
                        // Delivery queue is full; a laden unit is the
                        // expansion candidate
                        let ctx = ExpansionContext {
                            bank: snap.bank,
                            fleet_size,
                            mean_forage_distance,
                            built_nodes: &built_nodes,
                            max_nodes,
                        };
                        if let Some(site) =
                            expansion.consider(grid, config, rules, &ctx, u.id, u.pos)
                        {
                            rec.state = UnitState::Converting;
                            rec.goal = Some(site);
                        }
                    } else if let Some(goal) = rec.goal {
                        if grid.normalize(goal) == grid.normalize(u.pos) {
                            // Reached the forage site; harvest it
                            rec.goal = None;
                            reservations.claim(grid, u.pos, u.id);
                            commands.push(Command::Stay { unit: u.id });
                            rec.turn_taken = true;
                        }
                        // Otherwise the sweep routes toward the goal
                    } else if grid.resource_at(u.pos) < floor {
                        let best =
                            sites::richest_cell(grid, u.pos, config.forage_search_range);
                        if best == grid.normalize(u.pos) {
                            // Nothing better in range; sit tight
                            reservations.claim(grid, u.pos, u.id);
                            commands.push(Command::Stay { unit: u.id });
                            rec.turn_taken = true;
                        } else {
                            rec.goal = Some(best);
                        }
                    } else {
                        // Cell is worth harvesting
                        reservations.claim(grid, u.pos, u.id);
                        commands.push(Command::Stay { unit: u.id });
                        rec.turn_taken = true;
                    }
                }
            }
        }

        // === RENDEZVOUS PASS ===
        for node in &snap.nodes {
            let Some(slot) = slots.get(&node.id).copied() else { continue };
            match (slot.here, slot.near) {
                (Some(here_id), Some(near_id)) => {
                    let (Some(here_u), Some(near_u)) =
                        (by_id.get(&here_id), by_id.get(&near_id))
                    else {
                        continue;
                    };
                    let here_free = !units.get(&here_id).map_or(true, |r| r.turn_taken);
                    let near_free = !units.get(&near_id).map_or(true, |r| r.turn_taken);
                    if !(here_free && near_free) {
                        continue;
                    }
                    if reservations.is_claimed(grid, near_u.pos)
                        || reservations.is_claimed(grid, here_u.pos)
                    {
                        continue;
                    }
                    let (Some(out_dir), Some(in_dir)) = (
                        navigation::direction_between(grid, here_u.pos, near_u.pos),
                        navigation::direction_between(grid, near_u.pos, here_u.pos),
                    ) else {
                        continue;
                    };
                    // Direct swap: the departing unit vacates exactly
                    // as the waiting one advances
                    debug!(node = ?node.id, out = ?here_id, inbound = ?near_id, "node swap");
                    reservations.claim(grid, near_u.pos, here_id);
                    reservations.claim(grid, here_u.pos, near_id);
                    commands.push(Command::Move { unit: here_id, dir: out_dir });
                    commands.push(Command::Move { unit: near_id, dir: in_dir });
                    if let Some(rec) = units.get_mut(&here_id) {
                        rec.turn_taken = true;
                    }
                    if let Some(rec) = units.get_mut(&near_id) {
                        rec.turn_taken = true;
                    }
                }
                (None, Some(near_id)) => {
                    // Contested node: an opponent sits on our doorstep.
                    // Push straight onto the node cell; this is the one
                    // sanctioned exception to own-planner caution.
                    if grid.occupant(node.pos) != Occupant::Opponent {
                        continue;
                    }
                    let Some(near_u) = by_id.get(&near_id) else { continue };
                    if units.get(&near_id).map_or(true, |r| r.turn_taken) {
                        continue;
                    }
                    if reservations.is_claimed(grid, node.pos) {
                        continue;
                    }
                    let Some(dir) = navigation::direction_between(grid, near_u.pos, node.pos)
                    else {
                        continue;
                    };
                    info!(node = ?node.id, unit = ?near_id, "contested node capture");
                    reservations.claim(grid, node.pos, near_id);
                    commands.push(Command::Move { unit: near_id, dir });
                    if let Some(rec) = units.get_mut(&near_id) {
                        rec.turn_taken = true;
                    }
                }
                _ => {}
            }
        }

        // === SWEEP PASS ===
        // Anything still uncommitted gets routed (or a stay); by the
        // end of this loop every unit has exactly one command.
        for u in &observed {
            let Some(rec) = units.get_mut(&u.id) else { continue };
            if rec.turn_taken {
                continue;
            }
            let cmd = match rec.goal {
                Some(goal) if grid.normalize(goal) != grid.normalize(u.pos) => {
                    navigation::plan_move(grid, reservations, rng, u.id, u.pos, goal)
                }
                _ => {
                    reservations.claim(grid, u.pos, u.id);
                    Command::Stay { unit: u.id }
                }
            };
            commands.push(cmd);
            rec.turn_taken = true;
        }

        // === PRODUCTION ===
        let home = snap.home();
        let home_blocked = grid.occupant(home) != Occupant::None
            || reservations.is_claimed(grid, home);
        let available = snap
            .bank
            .saturating_sub(expansion.reserved_cost(rules))
            .saturating_sub(spent_on_construction);
        let cutoff = config.production_cutoff(snap.max_tick, grid.width(), rules.players);
        if production.should_spawn(
            config,
            rules,
            snap.tick,
            cutoff,
            fleet_size,
            available,
            home_blocked,
        ) {
            info!(tick = snap.tick, fleet_size, "producing unit");
            production.record_spawn(snap.tick);
            commands.push(Command::Spawn);
        }

        commands
    }
}

/// Our storage node standing exactly on `pos`, if any
fn node_at<'a>(nodes: &'a [StorageNode], grid: &WorldGrid, pos: Pos) -> Option<&'a StorageNode> {
    let pos = grid.normalize(pos);
    nodes.iter().find(|n| grid.normalize(n.pos) == pos)
}

/// Next dispersal goal out of `node`, from that node's radial cursor
fn next_dispersal(
    dispersal: &mut AHashMap<NodeId, DispersalCursor>,
    grid: &WorldGrid,
    config: &FleetConfig,
    node: &StorageNode,
) -> Pos {
    let cursor = dispersal.entry(node.id).or_default();
    let max_multiplier =
        (grid.width().min(grid.height()) / (2 * config.dispersal_step)).max(1);
    let (dx, dy) = cursor.next_offset(config.dispersal_step, max_multiplier);
    grid.normalize(node.pos.offset(dx, dy))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispersal_cursor_covers_all_directions_before_repeat() {
        let mut cursor = DispersalCursor::default();
        let mut seen = Vec::new();
        for _ in 0..8 {
            let (dx, dy) = cursor.next_offset(4, 3);
            let dir = (dx.signum(), dy.signum());
            assert!(!seen.contains(&dir), "direction {dir:?} repeated within one ring");
            seen.push(dir);
        }
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn test_dispersal_cursor_widens_each_cycle() {
        let mut cursor = DispersalCursor::default();
        for _ in 0..8 {
            cursor.next_offset(4, 3);
        }
        // Second cycle reaches twice as far
        let (dx, dy) = cursor.next_offset(4, 3);
        assert_eq!((dx, dy), (0, -8));
    }

    #[test]
    fn test_dispersal_cursor_wraps_at_max_multiplier() {
        let mut cursor = DispersalCursor::default();
        for _ in 0..16 {
            cursor.next_offset(4, 2);
        }
        // Third cycle wraps back to ring one
        let (dx, dy) = cursor.next_offset(4, 2);
        assert_eq!((dx, dy), (0, -4));
    }
}
