//! Expansion planning: when a cargo-laden unit should become a new
//! storage node instead of delivering to an existing one
//!
//! Approved sites are tracked until the node is actually built, so two
//! units never claim the same expansion and the construction cost stays
//! reserved against the bank in the meantime.

use ahash::{AHashMap, AHashSet};
use tracing::{debug, info};

use crate::control::sites;
use crate::core::config::FleetConfig;
use crate::core::types::{Pos, UnitId};
use crate::world::grid::WorldGrid;
use crate::world::snapshot::GameRules;

/// Fleet-level facts the approval test needs, gathered by the
/// controller each tick
#[derive(Debug, Clone, Copy)]
pub struct ExpansionContext<'a> {
    pub bank: u64,
    pub fleet_size: usize,
    /// Mean toroidal distance from foraging units to their nearest node
    pub mean_forage_distance: f64,
    /// Positions of storage nodes already built
    pub built_nodes: &'a [Pos],
    /// Built-plus-planned cap for this map
    pub max_nodes: usize,
}

#[derive(Debug)]
pub struct ExpansionPlanner {
    /// Converting unit -> its approved site
    planned: AHashMap<UnitId, Pos>,
    /// Map-wide density bar, sampled once at game start
    baseline_density: f64,
}

impl ExpansionPlanner {
    pub fn new(grid: &WorldGrid, config: &FleetConfig) -> Self {
        let baseline_density = sites::map_average_density(grid, config.density_stride);
        debug!(baseline_density, "expansion baseline sampled");
        Self { planned: AHashMap::new(), baseline_density }
    }

    pub fn planned_site(&self, unit: UnitId) -> Option<Pos> {
        self.planned.get(&unit).copied()
    }

    pub fn planned_count(&self) -> usize {
        self.planned.len()
    }

    /// Bank resource spoken for by in-flight constructions
    pub fn reserved_cost(&self, rules: &GameRules) -> u64 {
        self.planned.len() as u64 * rules.node_cost
    }

    /// Construction reservations held by units other than `unit`
    pub fn reserved_cost_excluding(&self, rules: &GameRules, unit: UnitId) -> u64 {
        let others = self.planned.keys().filter(|&&u| u != unit).count();
        others as u64 * rules.node_cost
    }

    /// Drop plans whose units no longer exist
    pub fn retain_live(&mut self, live: &AHashSet<UnitId>) {
        self.planned.retain(|unit, _| live.contains(unit));
    }

    /// Release a plan without building (site raced, unit retargeted)
    pub fn abandon(&mut self, unit: UnitId) {
        if let Some(site) = self.planned.remove(&unit) {
            info!(?unit, ?site, "expansion abandoned");
        }
    }

    /// Mark a plan as built and release its reservation
    pub fn complete(&mut self, unit: UnitId) {
        if let Some(site) = self.planned.remove(&unit) {
            info!(?unit, ?site, "expansion built");
        }
    }

    /// Consider approving a new expansion for `unit` at its position.
    ///
    /// All conditions must hold: the fleet is stretched (by distance or
    /// by size), the bank covers cost plus overhead beyond existing
    /// reservations, the node cap has room, the local neighborhood is
    /// at least as rich as the map average, and a site exists clear of
    /// every built and planned node. On approval the site is recorded
    /// and returned.
    pub fn consider(
        &mut self,
        grid: &WorldGrid,
        config: &FleetConfig,
        rules: &GameRules,
        ctx: &ExpansionContext,
        unit: UnitId,
        unit_pos: Pos,
    ) -> Option<Pos> {
        let committed = ctx.built_nodes.len() + self.planned.len();

        let stretched = ctx.mean_forage_distance
            > config.expansion_distance_fraction * f64::from(grid.height())
            || ctx.fleet_size > config.expansion_fleet_per_node * committed.max(1);
        if !stretched {
            return None;
        }

        let reserved = self.reserved_cost(rules);
        if ctx.bank <= reserved + rules.node_cost + config.expansion_overhead {
            return None;
        }

        if committed >= ctx.max_nodes {
            return None;
        }

        let local = sites::area_density(grid, unit_pos, config.local_density_radius);
        if local < self.baseline_density {
            return None;
        }

        let site = sites::expansion_site(
            grid,
            unit_pos,
            config.forage_search_range,
            config.expansion_edge_margin,
        )?;

        let spacing = config.min_node_spacing(grid.height());
        let clear = ctx
            .built_nodes
            .iter()
            .chain(self.planned.values())
            .all(|&node| grid.distance(site, node) > spacing);
        if !clear {
            return None;
        }

        info!(?unit, ?site, committed, "expansion approved");
        self.planned.insert(unit, site);
        Some(site)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rich_grid() -> WorldGrid {
        let mut grid = WorldGrid::new(32, 32);
        for y in 0..32 {
            for x in 0..32 {
                grid.cell_mut(Pos::new(x, y)).resource = 400;
            }
        }
        grid
    }

    fn context(built: &[Pos]) -> ExpansionContext<'_> {
        ExpansionContext {
            bank: 50_000,
            fleet_size: 30,
            mean_forage_distance: 12.0,
            built_nodes: built,
            max_nodes: 3,
        }
    }

    #[test]
    fn test_approval_records_plan_and_reserves_cost() {
        let grid = rich_grid();
        let config = FleetConfig::default();
        let rules = GameRules::default();
        let mut planner = ExpansionPlanner::new(&grid, &config);

        let built = [Pos::new(2, 2)];
        let site = planner.consider(&grid, &config, &rules, &context(&built), UnitId(1), Pos::new(20, 20));
        assert!(site.is_some());
        assert_eq!(planner.planned_count(), 1);
        assert_eq!(planner.reserved_cost(&rules), rules.node_cost);
        assert_eq!(planner.planned_site(UnitId(1)), site);
    }

    #[test]
    fn test_rejects_when_bank_too_low() {
        let grid = rich_grid();
        let config = FleetConfig::default();
        let rules = GameRules::default();
        let mut planner = ExpansionPlanner::new(&grid, &config);

        let built = [Pos::new(2, 2)];
        let mut ctx = context(&built);
        ctx.bank = rules.node_cost; // no overhead slack
        assert!(planner
            .consider(&grid, &config, &rules, &ctx, UnitId(1), Pos::new(20, 20))
            .is_none());
    }

    #[test]
    fn test_rejects_at_node_cap() {
        let grid = rich_grid();
        let config = FleetConfig::default();
        let rules = GameRules::default();
        let mut planner = ExpansionPlanner::new(&grid, &config);

        let built = [Pos::new(2, 2), Pos::new(20, 2), Pos::new(2, 20)];
        let ctx = context(&built); // max_nodes = 3, already 3 built
        assert!(planner
            .consider(&grid, &config, &rules, &ctx, UnitId(1), Pos::new(20, 20))
            .is_none());
    }

    #[test]
    fn test_rejects_site_too_close_to_existing_node() {
        let grid = rich_grid();
        let config = FleetConfig::default();
        let rules = GameRules::default();
        let mut planner = ExpansionPlanner::new(&grid, &config);

        // Candidate neighborhood sits on top of the built node
        let built = [Pos::new(20, 20)];
        assert!(planner
            .consider(&grid, &config, &rules, &context(&built), UnitId(1), Pos::new(20, 20))
            .is_none());
    }

    #[test]
    fn test_rejects_when_fleet_not_stretched() {
        let grid = rich_grid();
        let config = FleetConfig::default();
        let rules = GameRules::default();
        let mut planner = ExpansionPlanner::new(&grid, &config);

        let built = [Pos::new(2, 2)];
        let mut ctx = context(&built);
        ctx.fleet_size = 5;
        ctx.mean_forage_distance = 2.0;
        assert!(planner
            .consider(&grid, &config, &rules, &ctx, UnitId(1), Pos::new(20, 20))
            .is_none());
    }

    #[test]
    fn test_second_unit_cannot_double_claim() {
        let grid = rich_grid();
        let config = FleetConfig::default();
        let rules = GameRules::default();
        let mut planner = ExpansionPlanner::new(&grid, &config);

        let built = [Pos::new(2, 2)];
        let ctx = context(&built);
        let first = planner.consider(&grid, &config, &rules, &ctx, UnitId(1), Pos::new(20, 20));
        assert!(first.is_some());
        // Same neighborhood: spacing against the planned site rejects it
        let second = planner.consider(&grid, &config, &rules, &ctx, UnitId(2), Pos::new(21, 20));
        assert!(second.is_none());
    }

    #[test]
    fn test_retain_live_drops_dead_units() {
        let grid = rich_grid();
        let config = FleetConfig::default();
        let rules = GameRules::default();
        let mut planner = ExpansionPlanner::new(&grid, &config);

        let built = [Pos::new(2, 2)];
        planner.consider(&grid, &config, &rules, &context(&built), UnitId(1), Pos::new(20, 20));
        assert_eq!(planner.planned_count(), 1);

        let live: AHashSet<UnitId> = AHashSet::new();
        planner.retain_live(&live);
        assert_eq!(planner.planned_count(), 0);
    }
}
