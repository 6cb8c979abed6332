//! Unit production policy
//!
//! The spawn threshold escalates with fleet size along a Fibonacci
//! curve, so early units are cheap to justify and the build rate slows
//! naturally as the fleet grows. The curve is a pure function of a
//! small integer domain, so it is precomputed once into a table.

use tracing::debug;

use crate::core::config::FleetConfig;
use crate::core::types::Tick;
use crate::world::snapshot::GameRules;

/// Table size: index 24 already multiplies the base cost ~464x, an
/// effective hard cap on fleet growth
const GROWTH_TABLE_LEN: usize = 25;

#[derive(Debug)]
pub struct ProductionController {
    growth: Vec<u64>,
    last_spawn: Option<Tick>,
}

impl Default for ProductionController {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductionController {
    pub fn new() -> Self {
        let mut growth = Vec::with_capacity(GROWTH_TABLE_LEN);
        let (mut a, mut b) = (0u64, 1u64);
        for _ in 0..GROWTH_TABLE_LEN {
            growth.push(a);
            let next = a.saturating_add(b);
            a = b;
            b = next;
        }
        Self { growth, last_spawn: None }
    }

    fn growth_at(&self, index: usize) -> u64 {
        let clamped = index.min(self.growth.len() - 1);
        self.growth[clamped]
    }

    /// Banked resource required before producing the next unit.
    /// Non-decreasing in fleet size.
    pub fn build_threshold(&self, config: &FleetConfig, rules: &GameRules, fleet_size: usize) -> u64 {
        let index = (fleet_size as f64 * config.growth_ratio).round() as usize;
        rules.unit_cost * (100 + self.growth_at(index)) / 100
    }

    /// Whether to spend bank on a new unit this tick.
    ///
    /// `available` must already be net of construction reservations;
    /// `home_blocked` is true when a unit stands on the home cell or a
    /// committed move will land there this tick.
    pub fn should_spawn(
        &self,
        config: &FleetConfig,
        rules: &GameRules,
        tick: Tick,
        cutoff: Tick,
        fleet_size: usize,
        available: u64,
        home_blocked: bool,
    ) -> bool {
        if tick >= cutoff {
            return false;
        }
        if let Some(last) = self.last_spawn {
            if tick.saturating_sub(last) < config.min_spawn_spacing {
                return false;
            }
        }
        if home_blocked {
            return false;
        }
        let threshold = self.build_threshold(config, rules, fleet_size);
        let affordable = available >= threshold;
        if affordable {
            debug!(tick, fleet_size, threshold, available, "production approved");
        }
        affordable
    }

    pub fn record_spawn(&mut self, tick: Tick) {
        self.last_spawn = Some(tick);
    }
}
