//! Foraging-site and expansion-site selection
//!
//! Pure queries over the grid: an expanding-ring search for the richest
//! reachable cell, and density sampling for expansion decisions. The
//! ring search is a breadth-first frontier with an explicit range
//! budget, so its cost is bounded regardless of map size.

use std::collections::VecDeque;

use ahash::AHashSet;
use ordered_float::OrderedFloat;

use crate::core::types::Pos;
use crate::world::grid::{Occupant, WorldGrid};

/// Richest unoccupied cell within `range` steps of `origin`
///
/// Falls back to `origin` itself when nothing within range beats the
/// resource under the unit's own feet. Cells holding any unit (ours or
/// an opponent's) are skipped; a structure cell is skipped too since
/// there is nothing to harvest on it.
pub fn richest_cell(grid: &WorldGrid, origin: Pos, range: u32) -> Pos {
    let origin = grid.normalize(origin);
    let mut best = origin;
    let mut best_amount = grid.resource_at(origin);

    let mut visited: AHashSet<Pos> = AHashSet::new();
    let mut frontier: VecDeque<(Pos, u32)> = VecDeque::new();
    visited.insert(origin);
    frontier.push_back((origin, 0));

    while let Some((pos, depth)) = frontier.pop_front() {
        if depth >= range {
            continue;
        }
        for next in grid.neighbors(pos) {
            if !visited.insert(next) {
                continue;
            }
            frontier.push_back((next, depth + 1));

            let cell = grid.cell(next);
            if cell.occupant != Occupant::None || cell.structure {
                continue;
            }
            if cell.resource > best_amount {
                best = next;
                best_amount = cell.resource;
            }
        }
    }
    best
}

/// Mean resource per cell over the Manhattan disc of radius `range`
pub fn area_density(grid: &WorldGrid, origin: Pos, range: i32) -> f64 {
    let mut total: u64 = 0;
    let mut count: u64 = 0;
    for dy in -range..=range {
        let span = range - dy.abs();
        for dx in -span..=span {
            total += u64::from(grid.resource_at(origin.offset(dx, dy)));
            count += 1;
        }
    }
    total as f64 / count.max(1) as f64
}

/// Map-wide mean resource per cell, sampled on a coarse stride grid
///
/// Computed once at game start; used as the bar a candidate expansion
/// neighborhood must clear.
pub fn map_average_density(grid: &WorldGrid, stride: i32) -> f64 {
    let mut total: u64 = 0;
    let mut count: u64 = 0;
    let mut y = 0;
    while y < grid.height() {
        let mut x = 0;
        while x < grid.width() {
            total += u64::from(grid.resource_at(Pos::new(x, y)));
            count += 1;
            x += stride;
        }
        y += stride;
    }
    total as f64 / count.max(1) as f64
}

/// Best structure-free expansion cell within range, keeping
/// `edge_margin` cells clear of the map bounds
///
/// Candidates are ranked by the density of their radius-2 neighborhood,
/// with the cell's own resource as the tie-break, so a site lands in a
/// rich patch rather than on a lone spike. Returns `None` when no cell
/// in range satisfies the margin, which the caller treats as "no site
/// this tick".
pub fn expansion_site(grid: &WorldGrid, origin: Pos, range: u32, edge_margin: i32) -> Option<Pos> {
    let origin = grid.normalize(origin);
    let in_margin = |pos: Pos| {
        pos.x >= edge_margin
            && pos.x < grid.width() - edge_margin
            && pos.y >= edge_margin
            && pos.y < grid.height() - edge_margin
    };
    let score = |pos: Pos| (OrderedFloat(area_density(grid, pos, 2)), grid.resource_at(pos));

    let mut best: Option<(Pos, (OrderedFloat<f64>, u32))> = None;
    let mut visited: AHashSet<Pos> = AHashSet::new();
    let mut frontier: VecDeque<(Pos, u32)> = VecDeque::new();
    visited.insert(origin);
    frontier.push_back((origin, 0));

    while let Some((pos, depth)) = frontier.pop_front() {
        if depth >= range {
            continue;
        }
        for next in grid.neighbors(pos) {
            if !visited.insert(next) {
                continue;
            }
            frontier.push_back((next, depth + 1));

            if grid.has_structure(next) || !in_margin(next) {
                continue;
            }
            let rank = score(next);
            if best.map_or(true, |(_, b)| rank > b) {
                best = Some((next, rank));
            }
        }
    }
    // The origin itself qualifies when in margin and unbuilt
    if in_margin(origin) && !grid.has_structure(origin) {
        let rank = score(origin);
        if best.map_or(true, |(_, b)| rank > b) {
            best = Some((origin, rank));
        }
    }
    best.map(|(pos, _)| pos)
}
