//! Controller configuration with documented constants
//!
//! All tuning knobs are collected here with explanations of their purpose
//! and how they interact with each other. The defaults are the values the
//! policy converged on; none of them is a hard contract.

use serde::{Deserialize, Serialize};

use crate::core::error::{FleetError, Result};
use crate::core::types::Tick;

/// Configuration for the fleet controller
///
/// These values have been tuned empirically across many games.
/// Changing them shifts the forage/return/expand balance and the
/// production pacing, not correctness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    // === RETURN POLICY ===
    /// Cargo fraction (of capacity) that triggers a return at game start
    ///
    /// At 0.5, a unit heads for a storage node once half full. Higher
    /// values mean fewer, larger deliveries but more cargo at risk.
    pub return_fraction_start: f64,

    /// Cargo fraction that triggers a return at game end
    ///
    /// The threshold interpolates linearly from `return_fraction_start`
    /// to this value over the game, so late-game units bank partial
    /// loads rather than sitting on them.
    pub return_fraction_end: f64,

    /// Fleet-size divisor for the concurrent-returner cap
    ///
    /// At most `fleet_size / returner_divisor` (minimum 1) units may be
    /// in the Returning state at once. This staggers deliveries so
    /// storage nodes don't jam.
    pub returner_divisor: usize,

    // === FORAGING ===
    /// Divisor applied to the maximum cell resource to get the
    /// extraction floor at game start
    ///
    /// A unit keeps harvesting its cell while the cell holds at least
    /// `max_cell_resource / extraction_divisor`. At 15 this is ~6.7% of
    /// a full cell.
    pub extraction_divisor: u32,

    /// How far the site selector searches for a richer cell, in steps
    /// of breadth-first ring expansion from the unit's position
    pub forage_search_range: u32,

    /// Radial step, in cells, between successive dispersal rings
    ///
    /// After delivering, a unit is sent `dispersal_step * multiplier`
    /// cells outward along the next of eight compass directions.
    pub dispersal_step: i32,

    // === END GAME ===
    /// Remaining-tick window inside which the homing check runs
    pub endgame_lookahead: Tick,

    /// Multiplier on a unit's distance-to-node when deciding whether it
    /// must start homing
    ///
    /// At 2.0, a unit turns for home once its distance (doubled, to
    /// allow for congestion) would not fit in the remaining ticks.
    pub endgame_safety_factor: f64,

    // === EXPANSION ===
    /// Fraction of map height the fleet's mean forage distance must
    /// exceed before distance alone justifies a new storage node
    pub expansion_distance_fraction: f64,

    /// Units per storage node above which fleet size alone justifies a
    /// new storage node
    pub expansion_fleet_per_node: usize,

    /// Resource that must remain banked beyond the construction cost
    /// before an expansion is approved
    pub expansion_overhead: u64,

    /// Minimum spacing between storage nodes, as a fraction of map height
    pub min_node_spacing_fraction: f64,

    /// Cells kept clear between an expansion site and the map bounds
    pub expansion_edge_margin: i32,

    /// Sampling stride for the startup map-average density estimate
    ///
    /// Every `density_stride`-th cell in both axes is sampled once at
    /// game start; candidate sites must meet that average locally.
    pub density_stride: i32,

    /// Radius of the Manhattan disc sampled around an expansion
    /// candidate when comparing its neighborhood against that average
    pub local_density_radius: i32,

    // === PRODUCTION ===
    /// Fraction of the game after which no units are produced
    ///
    /// A late unit cannot pay for itself. Reduced further on small
    /// crowded maps (see `production_cutoff`).
    pub production_cutoff_fraction: f64,

    /// Multiplier mapping fleet size into the growth-table index
    ///
    /// The spawn threshold is `unit_cost * (1 + growth(n)/100)` where
    /// `n = fleet_size * growth_ratio` rounded. Smaller ratios delay
    /// the slowdown.
    pub growth_ratio: f64,

    /// Minimum ticks between two spawns
    pub min_spawn_spacing: Tick,

    /// Map-width divisor feeding the storage-node cap
    ///
    /// The cap is `1 + map_width / node_cap_divisor / player_count`,
    /// clamped to at least 2 so one expansion is always possible.
    pub node_cap_divisor: i32,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            // Return policy
            return_fraction_start: 0.5,
            return_fraction_end: 0.4,
            returner_divisor: 3,

            // Foraging
            extraction_divisor: 15,
            forage_search_range: 8,
            dispersal_step: 4,

            // End game
            endgame_lookahead: 100,
            endgame_safety_factor: 2.0,

            // Expansion
            expansion_distance_fraction: 0.28,
            expansion_fleet_per_node: 10,
            expansion_overhead: 1000,
            min_node_spacing_fraction: 0.25,
            expansion_edge_margin: 4,
            density_stride: 4,
            local_density_radius: 4,

            // Production
            production_cutoff_fraction: 0.8,
            growth_ratio: 0.5,
            min_spawn_spacing: 4,
            node_cap_divisor: 16,
        }
    }
}

impl FleetConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML text; missing fields keep their defaults
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: FleetConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.return_fraction_start)
            || !(0.0..=1.0).contains(&self.return_fraction_end)
        {
            return Err(FleetError::InvalidConfig(
                "return fractions must be within [0, 1]".into(),
            ));
        }
        if self.return_fraction_end > self.return_fraction_start {
            return Err(FleetError::InvalidConfig(format!(
                "return_fraction_end ({}) must not exceed return_fraction_start ({})",
                self.return_fraction_end, self.return_fraction_start
            )));
        }
        if self.returner_divisor == 0 {
            return Err(FleetError::InvalidConfig("returner_divisor must be positive".into()));
        }
        if self.extraction_divisor == 0 {
            return Err(FleetError::InvalidConfig("extraction_divisor must be positive".into()));
        }
        if self.endgame_safety_factor < 1.0 {
            return Err(FleetError::InvalidConfig(format!(
                "endgame_safety_factor ({}) below 1.0 would strand units",
                self.endgame_safety_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.production_cutoff_fraction) {
            return Err(FleetError::InvalidConfig(
                "production_cutoff_fraction must be within [0, 1]".into(),
            ));
        }
        if self.density_stride <= 0
            || self.local_density_radius <= 0
            || self.node_cap_divisor <= 0
            || self.dispersal_step <= 0
        {
            return Err(FleetError::InvalidConfig(
                "strides, radii, divisors and steps must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Cargo fraction of capacity that triggers a return at the given tick
    pub fn return_fraction(&self, tick: Tick, max_tick: Tick) -> f64 {
        let elapsed = f64::from(tick) / f64::from(max_tick.max(1));
        self.return_fraction_start
            + (self.return_fraction_end - self.return_fraction_start) * elapsed
    }

    /// Minimum cell resource worth harvesting at the given tick
    ///
    /// Rises with elapsed game time (doubling by game end) to push
    /// late-game units off the picked-over cells near storage nodes.
    pub fn extraction_floor(&self, tick: Tick, max_tick: Tick, max_cell_resource: u32) -> u32 {
        let base = f64::from(max_cell_resource / self.extraction_divisor);
        let elapsed = f64::from(tick) / f64::from(max_tick.max(1));
        (base * (1.0 + elapsed)) as u32
    }

    /// Last tick on which a spawn is allowed
    ///
    /// Crowded small maps cut production earlier: each opponent beyond
    /// the first knocks 5% off the cutoff when the map is 40 cells wide
    /// or less.
    pub fn production_cutoff(&self, max_tick: Tick, map_width: i32, players: u32) -> Tick {
        let mut fraction = self.production_cutoff_fraction;
        if map_width <= 40 && players > 2 {
            fraction -= 0.05 * f64::from(players - 2);
        }
        (f64::from(max_tick) * fraction.max(0.0)) as Tick
    }

    /// Cap on built-plus-planned storage nodes for this map
    pub fn max_storage_nodes(&self, map_width: i32, players: u32) -> usize {
        let extra = map_width / self.node_cap_divisor / players.max(1) as i32;
        (1 + extra.max(1)) as usize
    }

    /// Minimum toroidal distance between two storage nodes
    pub fn min_node_spacing(&self, map_height: i32) -> i32 {
        (f64::from(map_height) * self.min_node_spacing_fraction) as i32
    }
}
