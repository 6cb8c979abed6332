//! Per-unit task state tracked by the controller across ticks

use serde::{Deserialize, Serialize};

use crate::core::types::{NodeId, Pos, Tick};

/// Task state of one unit
///
/// `Homing` is terminal: once a unit is forced home at the end of the
/// game it never leaves that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitState {
    /// Searching for and harvesting resource
    Foraging,
    /// Carrying cargo toward a storage node
    Returning,
    /// En route to an approved expansion site
    Converting,
    /// Forced end-game return; never reverts
    Homing,
}

/// Controller-side bookkeeping for one unit, keyed by its id and kept
/// as long as the unit appears in snapshots
#[derive(Debug, Clone, Copy)]
pub struct UnitRecord {
    pub state: UnitState,
    /// Committed destination cell; `None` means no destination
    pub goal: Option<Pos>,
    /// Position observed at the previous tick, for stall detection
    pub last_pos: Pos,
    /// Alternation flag for the returning-throttle; a paused unit held
    /// position on purpose, so the stall detector ignores it
    pub paused: bool,
    /// Storage node this unit is currently routed to
    pub storage_id: NodeId,
    /// True once a command has been committed this tick; reset at tick start
    pub turn_taken: bool,
    /// Tick this unit first appeared, kept for diagnostics
    pub born: Tick,
}

impl UnitRecord {
    pub fn new(pos: Pos, tick: Tick) -> Self {
        Self {
            state: UnitState::Foraging,
            goal: None,
            last_pos: pos,
            paused: false,
            storage_id: NodeId::HOME,
            turn_taken: false,
            born: tick,
        }
    }
}
